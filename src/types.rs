//! Core types for the adaptive TDEE pipeline
//!
//! This module defines the records that flow through each stage: the user
//! profile and daily logs supplied by the caller, the filter state and audit
//! history persisted on the user record, and the derived quality and macro
//! snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Biological sex used by the BMR formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// Direction of the user's weight goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Loss,
    Maintenance,
    Gain,
}

/// Physiological and goal inputs, fixed per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Age in years
    pub age: u32,
    pub gender: Gender,
    /// Height in centimeters
    pub height_cm: f64,
    /// Activity multiplier applied to BMR (1.2 sedentary to 2.5 very active)
    pub activity_level: f64,
    /// Desired weekly weight change (kg/week, negative = loss)
    pub goal_kg_per_week: f64,
    /// Target body weight (kg)
    pub goal_weight_kg: f64,
}

/// One calendar day's observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: NaiveDate,
    /// Morning body weight (kg)
    pub weight_kg: f64,
    /// Calories consumed that day (kcal)
    pub calories_in: i32,
}

impl LogEntry {
    pub fn new(date: NaiveDate, weight_kg: f64, calories_in: i32) -> Self {
        Self {
            date,
            weight_kg,
            calories_in,
        }
    }
}

/// Persistent Kalman filter state embedded in the user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Current TDEE estimate (kcal/day)
    pub tdee_estimate: f64,
    /// Variance of the estimate (kcal²)
    pub tdee_uncertainty: f64,
    /// Mean per-step confidence of the last full run (0-1)
    pub adaptation_confidence: f64,
    /// Whether a full run has already reseeded the state from the first log
    #[serde(default)]
    pub has_been_seeded: bool,
}

impl FilterState {
    /// Create an unseeded state from a formula estimate
    pub fn new(tdee_estimate: f64, tdee_uncertainty: f64) -> Self {
        Self {
            tdee_estimate,
            tdee_uncertainty,
            adaptation_confidence: 0.0,
            has_been_seeded: false,
        }
    }
}

/// Data quality snapshot, always recomputed from the current log set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityMetrics {
    /// Longest run of day-to-day consecutive dates
    pub consecutive_days: u32,
    /// Number of logged days
    pub total_days_logged: u32,
    /// Mean missing days per non-consecutive transition
    pub average_gap_days: f64,
    /// Recent weight stability (0-1, higher = more consistent)
    pub weight_consistency_score: f64,
    /// Recent intake stability (0-1, higher = more consistent)
    pub calorie_consistency_score: f64,
}

impl Default for DataQualityMetrics {
    fn default() -> Self {
        Self {
            consecutive_days: 0,
            total_days_logged: 0,
            average_gap_days: 0.0,
            weight_consistency_score: 1.0,
            calorie_consistency_score: 1.0,
        }
    }
}

impl DataQualityMetrics {
    /// Mean of the weight and calorie consistency scores
    pub fn consistency_factor(&self) -> f64 {
        (self.weight_consistency_score + self.calorie_consistency_score) / 2.0
    }
}

/// Append-only audit entry for a calorie goal change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    pub timestamp: DateTime<Utc>,
    pub old_goal: i32,
    pub new_goal: i32,
    /// `new_goal - old_goal`
    pub change: i32,
    pub reason: String,
    /// Filter confidence when the change was made
    pub confidence: f64,
    /// 1-based position in the history
    pub sequence: u32,
    /// TDEE estimate the goal was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdee_estimate: Option<i32>,
}

/// Daily macro nutrient targets in grams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MacroTargets {
    /// Energy content of the targets (4 kcal/g protein and carbs, 9 kcal/g fat)
    pub fn total_calories(&self) -> i32 {
        (self.protein_g * 4.0 + self.carbs_g * 4.0 + self.fat_g * 9.0) as i32
    }
}

/// The user aggregate owned by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub name: String,
    pub profile: UserProfile,
    pub initial_calorie_goal: i32,
    /// Current (adapted) calorie goal
    pub calorie_goal: i32,
    pub macro_targets: MacroTargets,
    pub filter: FilterState,
    #[serde(default)]
    pub days_since_last_adaptation: u32,
    #[serde(default)]
    pub adaptation_history: Vec<AdaptationRecord>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl UserRecord {
    /// Number of recorded goal changes (including the initial goal)
    pub fn total_adaptations(&self) -> usize {
        self.adaptation_history.len()
    }

    /// Most recent `days` logs, in chronological order
    pub fn recent_logs(&self, days: usize) -> Vec<LogEntry> {
        let mut sorted = self.logs.clone();
        sorted.sort_by_key(|log| log.date);
        let start = sorted.len().saturating_sub(days);
        sorted.split_off(start)
    }

    /// Weight from the latest-dated log
    pub fn latest_weight(&self) -> Option<f64> {
        self.logs
            .iter()
            .max_by_key(|log| log.date)
            .map(|log| log.weight_kg)
    }

    /// Load a user record from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the user record to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of one pass of the goal adaptation controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationOutcome {
    pub goal_changed: bool,
    pub old_goal: i32,
    pub new_goal: i32,
    pub explanation: String,
    pub confidence: f64,
    pub macro_targets: MacroTargets,
}

/// A controller pass together with the record it was applied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationReport {
    pub user: UserRecord,
    #[serde(flatten)]
    pub outcome: AdaptationOutcome,
}
