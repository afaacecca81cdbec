//! Static energy expenditure formulas.

use crate::types::{Gender, UserProfile};

/// Sex-specific constant of the Mifflin–St Jeor equation.
fn sex_offset(gender: Gender) -> f64 {
    match gender {
        Gender::Male => 5.0,
        // Female offset is used for every non-male profile
        Gender::Female | Gender::Other => -161.0,
    }
}

/// Calculates basal metabolic rate using the Mifflin–St Jeor equation.
///
/// Formula:
/// ```text
/// BMR = 10 × weight + 6.25 × height − 5 × age + s
/// ```
/// where `s` is +5 for men and −161 otherwise.
///
/// # Arguments
/// * `profile` - Age, sex and height of the user
/// * `weight_kg` - Current body weight in kilograms
///
/// # Returns
/// BMR in kcal/day
pub fn calculate_bmr(profile: &UserProfile, weight_kg: f64) -> f64 {
    10.0 * weight_kg + 6.25 * profile.height_cm - 5.0 * profile.age as f64
        + sex_offset(profile.gender)
}

/// Calculates the formula-based TDEE used to seed the filter.
///
/// `TDEE = BMR × activity_level`
pub fn calculate_initial_tdee(profile: &UserProfile, weight_kg: f64) -> f64 {
    calculate_bmr(profile, weight_kg) * profile.activity_level
}

/// Daily calorie surplus (positive) or deficit (negative) that produces the
/// requested weekly weight change.
pub fn daily_calorie_delta(goal_kg_per_week: f64, calories_per_kg: f64) -> f64 {
    goal_kg_per_week * calories_per_kg / 7.0
}
