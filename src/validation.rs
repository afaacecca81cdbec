//! Input validation at the record boundary
//!
//! Profiles and log entries are checked here before they reach the store.
//! The numeric core assumes validated input and does not repeat these checks.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{LogEntry, UserProfile};

pub const MIN_AGE: u32 = 13;
pub const MAX_AGE: u32 = 120;
pub const MIN_HEIGHT_CM: f64 = 100.0;
pub const MAX_HEIGHT_CM: f64 = 250.0;
pub const MIN_ACTIVITY_LEVEL: f64 = 1.2;
pub const MAX_ACTIVITY_LEVEL: f64 = 2.5;
/// Largest safe weekly weight change in either direction (kg/week)
pub const MAX_GOAL_RATE_KG_PER_WEEK: f64 = 1.5;
pub const MIN_WEIGHT_KG: f64 = 30.0;
pub const MAX_WEIGHT_KG: f64 = 300.0;
pub const MAX_DAILY_CALORIES: i32 = 10_000;

/// Check every profile field against its allowed range.
pub fn validate_profile(profile: &UserProfile) -> Result<(), ValidationError> {
    if !(MIN_AGE..=MAX_AGE).contains(&profile.age) {
        return Err(ValidationError::AgeOutOfRange { value: profile.age });
    }
    if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&profile.height_cm) {
        return Err(ValidationError::HeightOutOfRange {
            value: profile.height_cm,
        });
    }
    if !(MIN_ACTIVITY_LEVEL..=MAX_ACTIVITY_LEVEL).contains(&profile.activity_level) {
        return Err(ValidationError::ActivityOutOfRange {
            value: profile.activity_level,
        });
    }
    if profile.goal_kg_per_week.is_nan()
        || profile.goal_kg_per_week.abs() > MAX_GOAL_RATE_KG_PER_WEEK
    {
        return Err(ValidationError::UnsafeGoalRate {
            value: profile.goal_kg_per_week,
        });
    }
    if !(MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&profile.goal_weight_kg) {
        return Err(ValidationError::GoalWeightOutOfRange {
            value: profile.goal_weight_kg,
        });
    }
    Ok(())
}

/// Check a body weight reading (kg).
pub fn validate_weight(weight_kg: f64) -> Result<(), ValidationError> {
    if !(MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&weight_kg) {
        return Err(ValidationError::WeightOutOfRange { value: weight_kg });
    }
    Ok(())
}

/// Check a daily log against value ranges and the caller's notion of today.
pub fn validate_log(entry: &LogEntry, today: NaiveDate) -> Result<(), ValidationError> {
    if entry.date > today {
        return Err(ValidationError::FutureDate {
            date: entry.date,
            today,
        });
    }
    validate_weight(entry.weight_kg)?;
    if !(0..=MAX_DAILY_CALORIES).contains(&entry.calories_in) {
        return Err(ValidationError::CaloriesOutOfRange {
            value: entry.calories_in,
        });
    }
    Ok(())
}
