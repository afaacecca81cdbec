//! Error types for adaptive TDEE

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur at the record boundary (parsing, storage, validation).
///
/// The numeric core never returns these: insufficient data and gate failures
/// are reported as normal outcomes with an explanation.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

/// Range and date violations rejected before data reaches the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Age must be between 13-120, got {value}")]
    AgeOutOfRange { value: u32 },

    #[error("Height must be between 100-250cm, got {value}")]
    HeightOutOfRange { value: f64 },

    #[error("Activity level must be between 1.2-2.5, got {value}")]
    ActivityOutOfRange { value: f64 },

    #[error("Weekly goal of {value} kg/week exceeds the safe limit of 1.5 kg/week")]
    UnsafeGoalRate { value: f64 },

    #[error("Goal weight must be between 30-300kg, got {value}")]
    GoalWeightOutOfRange { value: f64 },

    #[error("Weight must be between 30-300kg, got {value}")]
    WeightOutOfRange { value: f64 },

    #[error("Calories must be between 0-10000, got {value}")]
    CaloriesOutOfRange { value: i32 },

    #[error("Log date {date} is in the future (today is {today})")]
    FutureDate { date: NaiveDate, today: NaiveDate },
}
