//! Engine configuration
//!
//! Tunables for each pipeline stage. Every field defaults to the reference
//! constant of its owning module, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Largest gap (days between real logs) that is filled by interpolation
pub const MAX_INTERPOLATION_DAYS: i64 = 3;

/// Weight change rate above which a log is flagged as an outlier (kg/day)
pub const MAX_WEIGHT_CHANGE_PER_DAY: f64 = 2.0;

/// Calorie z-score above which a log is flagged as an outlier
pub const MAX_CALORIE_DEVIATION: f64 = 3.0;

/// Minimum number of logs before the calorie z-score rule applies
pub const MIN_LOGS_FOR_CALORIE_OUTLIERS: usize = 7;

/// Process noise: how far TDEE may drift between steps (~50 kcal/day std dev)
pub const BASE_PROCESS_VARIANCE: f64 = 2500.0;

/// Measurement noise of a single-day TDEE observation (~600 kcal/day std dev)
pub const BASE_MEASUREMENT_VARIANCE: f64 = 360_000.0;

/// Variance assigned to a freshly seeded estimate (kcal²)
pub const INITIAL_TDEE_UNCERTAINTY: f64 = 50_000.0;

/// Energy equivalent of one kilogram of body weight (kcal/kg)
pub const CALORIES_PER_KG: f64 = 7700.0;

/// Preprocessing thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub max_interpolation_days: i64,
    pub max_weight_change_per_day: f64,
    pub max_calorie_deviation: f64,
    pub min_logs_for_calorie_outliers: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_interpolation_days: MAX_INTERPOLATION_DAYS,
            max_weight_change_per_day: MAX_WEIGHT_CHANGE_PER_DAY,
            max_calorie_deviation: MAX_CALORIE_DEVIATION,
            min_logs_for_calorie_outliers: MIN_LOGS_FOR_CALORIE_OUTLIERS,
        }
    }
}

/// Kalman filter noise model and confidence weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub base_process_variance: f64,
    pub base_measurement_variance: f64,
    pub initial_uncertainty: f64,
    /// Below this many logs the sparse-data noise model is used
    pub min_logs_for_quality_tuning: usize,
    /// Measurement variance multiplier for interpolated observations
    pub interpolated_measurement_factor: f64,
    pub calories_per_kg: f64,
    /// Variance at which the filter's own confidence is 0.5
    pub confidence_variance_scale: f64,
    /// Share of the step confidence taken from filter certainty (rest is data consistency)
    pub certainty_weight: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            base_process_variance: BASE_PROCESS_VARIANCE,
            base_measurement_variance: BASE_MEASUREMENT_VARIANCE,
            initial_uncertainty: INITIAL_TDEE_UNCERTAINTY,
            min_logs_for_quality_tuning: 7,
            interpolated_measurement_factor: 2.0,
            calories_per_kg: CALORIES_PER_KG,
            confidence_variance_scale: 10_000.0,
            certainty_weight: 0.7,
        }
    }
}

/// Goal adaptation gates and safety bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub min_logs: usize,
    /// Days that must pass between two goal changes
    pub min_adaptation_interval_days: u32,
    pub confidence_threshold: f64,
    /// TDEE moves smaller than this are reported as stable (kcal)
    pub stable_tdee_band: i32,
    /// Goal ceiling above the current TDEE estimate (kcal)
    pub max_surplus_over_tdee: f64,
    pub calories_per_kg: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_logs: 7,
            min_adaptation_interval_days: 7,
            confidence_threshold: 0.3,
            stable_tdee_band: 25,
            max_surplus_over_tdee: 1000.0,
            calories_per_kg: CALORIES_PER_KG,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub preprocess: PreprocessConfig,
    pub filter: FilterConfig,
    pub controller: ControllerConfig,
}

impl EngineConfig {
    /// Load a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Reject values that would make the filter arithmetic degenerate
    pub fn check(&self) -> Result<(), ComputeError> {
        if self.filter.base_measurement_variance <= 0.0 {
            return Err(ComputeError::ConfigError(
                "base_measurement_variance must be positive".to_string(),
            ));
        }
        if self.filter.base_process_variance < 0.0 {
            return Err(ComputeError::ConfigError(
                "base_process_variance must not be negative".to_string(),
            ));
        }
        if self.filter.confidence_variance_scale <= 0.0 {
            return Err(ComputeError::ConfigError(
                "confidence_variance_scale must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.filter.certainty_weight) {
            return Err(ComputeError::ConfigError(
                "certainty_weight must be within 0-1".to_string(),
            ));
        }
        if self.preprocess.max_interpolation_days < 1 {
            return Err(ComputeError::ConfigError(
                "max_interpolation_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
