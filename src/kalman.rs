//! Adaptive Kalman filter for TDEE
//!
//! A one-dimensional filter whose state is the user's TDEE (kcal/day).
//!
//! # State Model
//!
//! ```text
//! State:        x = TDEE
//! Transition:   x_k = x_{k-1}            (TDEE assumed constant between steps)
//! Observation:  z = calories_today − (Δweight / Δdays) × 7700
//! ```
//!
//! The noise model is not fixed: process and measurement variances are
//! re-derived from the current [`DataQualityMetrics`] before every step, and
//! interpolated observations are trusted less.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, FilterConfig};
use crate::formulas::calculate_initial_tdee;
use crate::preprocess::prepare_series;
use crate::quality::QualityAnalyzer;
use crate::types::{DataQualityMetrics, LogEntry, UserRecord};

/// Noise parameters for a single filter step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParameters {
    /// Q: expected TDEE drift variance between steps
    pub process_variance: f64,
    /// R: variance of a single-day TDEE observation
    pub measurement_variance: f64,
    /// Mean of weight and calorie consistency (0-1)
    pub consistency_factor: f64,
}

impl NoiseParameters {
    /// Derive noise parameters from data quality.
    ///
    /// With sparse data (fewer than `min_logs_for_quality_tuning` logs) the
    /// filter drifts slowly and distrusts observations. Otherwise measurement
    /// noise grows as consistency falls and process noise grows with the
    /// average gap length, capped at twice the base.
    pub fn from_quality(
        total_logs: usize,
        quality: &DataQualityMetrics,
        config: &FilterConfig,
    ) -> Self {
        let consistency_factor = quality.consistency_factor();

        if total_logs < config.min_logs_for_quality_tuning {
            return Self {
                process_variance: config.base_process_variance * 0.5,
                measurement_variance: config.base_measurement_variance * 1.5,
                consistency_factor,
            };
        }

        let gap_factor = (1.0 + quality.average_gap_days / 5.0).min(2.0);

        Self {
            process_variance: config.base_process_variance * gap_factor,
            measurement_variance: config.base_measurement_variance * (2.0 - consistency_factor),
            consistency_factor,
        }
    }

    /// Parameters for a step whose observation is partly synthetic
    pub fn for_interpolated(self, factor: f64) -> Self {
        Self {
            measurement_variance: self.measurement_variance * factor,
            ..self
        }
    }
}

/// Output of a single filter step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEstimate {
    /// Updated TDEE estimate
    pub tdee: f64,
    /// Updated variance
    pub variance: f64,
    /// Observed TDEE for this step
    pub measurement: f64,
    /// Kalman gain applied
    pub gain: f64,
    /// Step confidence (0-1)
    pub confidence: f64,
}

/// Scalar predict + update. Returns `(x_new, p_new, gain)`.
pub fn predict_and_update(
    estimate: f64,
    variance: f64,
    measurement: f64,
    process_variance: f64,
    measurement_variance: f64,
) -> (f64, f64, f64) {
    let predicted_variance = variance + process_variance;
    let gain = predicted_variance / (predicted_variance + measurement_variance);
    let updated = estimate + gain * (measurement - estimate);
    (updated, (1.0 - gain) * predicted_variance, gain)
}

/// Same-day TDEE observation from the energy balance identity.
pub fn observed_tdee(yesterday: &LogEntry, today: &LogEntry, calories_per_kg: f64) -> f64 {
    let days_diff = (today.date - yesterday.date).num_days().max(1);
    let daily_weight_change = (today.weight_kg - yesterday.weight_kg) / days_diff as f64;
    today.calories_in as f64 - daily_weight_change * calories_per_kg
}

/// Stateful TDEE filter.
#[derive(Debug, Clone)]
pub struct TdeeFilter {
    estimate: f64,
    variance: f64,
    config: FilterConfig,
}

impl TdeeFilter {
    /// Create a filter starting from the given state
    pub fn new(estimate: f64, variance: f64, config: FilterConfig) -> Self {
        Self {
            estimate,
            variance,
            config,
        }
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Fold one adjacent pair of series entries into the estimate.
    pub fn step(
        &mut self,
        yesterday: &LogEntry,
        today: &LogEntry,
        is_interpolated: bool,
        noise: NoiseParameters,
    ) -> StepEstimate {
        let noise = if is_interpolated {
            noise.for_interpolated(self.config.interpolated_measurement_factor)
        } else {
            noise
        };

        let measurement = observed_tdee(yesterday, today, self.config.calories_per_kg);
        let (estimate, variance, gain) = predict_and_update(
            self.estimate,
            self.variance,
            measurement,
            noise.process_variance,
            noise.measurement_variance,
        );
        self.estimate = estimate;
        self.variance = variance;

        let confidence = self.confidence(noise.consistency_factor);

        StepEstimate {
            tdee: estimate,
            variance,
            measurement,
            gain,
            confidence,
        }
    }

    /// Blend of filter certainty and input consistency, capped at 1.0
    fn confidence(&self, consistency_factor: f64) -> f64 {
        let base_confidence = 1.0 / (1.0 + self.variance / self.config.confidence_variance_scale);
        let weight = self.config.certainty_weight;
        (base_confidence * weight + consistency_factor * (1.0 - weight)).min(1.0)
    }
}

/// Summary of a full-history run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRunSummary {
    pub steps: usize,
    pub interpolated_steps: usize,
    pub outliers_removed: usize,
    /// State was reset from the formula estimate before this run
    pub reseeded: bool,
    /// Raw logs were used because cleaning left too few
    pub used_raw_logs: bool,
    pub quality: DataQualityMetrics,
}

/// Run preprocessing and fold the filter over the user's full log history.
///
/// Mutates the record's filter state in place. Returns `None` (leaving the
/// record untouched) when fewer than two usable logs exist.
pub fn run_filter(record: &mut UserRecord, config: &EngineConfig) -> Option<FilterRunSummary> {
    if record.logs.len() < 2 {
        return None;
    }

    let quality = QualityAnalyzer::analyze(&record.logs);
    let series = prepare_series(&record.logs, &config.preprocess);

    if series.len() < 2 {
        return None;
    }

    let reseeded = !record.filter.has_been_seeded;
    let (estimate, variance) = if reseeded {
        (
            calculate_initial_tdee(&record.profile, series.entries[0].weight_kg),
            config.filter.initial_uncertainty,
        )
    } else {
        (record.filter.tdee_estimate, record.filter.tdee_uncertainty)
    };

    let noise = NoiseParameters::from_quality(record.logs.len(), &quality, &config.filter);
    let mut filter = TdeeFilter::new(estimate, variance, config.filter.clone());
    let mut confidences: Vec<f64> = Vec::with_capacity(series.len() - 1);

    for i in 0..series.len() - 1 {
        let yesterday = &series.entries[i];
        let today = &series.entries[i + 1];
        let step = filter.step(yesterday, today, series.interpolated[i + 1], noise);

        debug!(
            "{}: z={:.0} K={:.3} tdee={:.1} var={:.1} conf={:.3}",
            today.date, step.measurement, step.gain, step.tdee, step.variance, step.confidence
        );
        confidences.push(step.confidence);
    }

    record.filter.tdee_estimate = filter.estimate();
    record.filter.tdee_uncertainty = filter.variance();
    record.filter.adaptation_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };
    record.filter.has_been_seeded = true;

    info!(
        "filter run for {}: tdee={:.0} uncertainty={:.0} confidence={:.2} ({} steps)",
        record.user_id,
        record.filter.tdee_estimate,
        record.filter.tdee_uncertainty,
        record.filter.adaptation_confidence,
        confidences.len()
    );

    Some(FilterRunSummary {
        steps: confidences.len(),
        interpolated_steps: series.interpolated.iter().skip(1).filter(|f| **f).count(),
        outliers_removed: series.outliers_removed,
        reseeded,
        used_raw_logs: series.fallback,
        quality,
    })
}
