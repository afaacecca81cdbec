//! Macro nutrient targets
//!
//! Splits a calorie goal into protein, carbohydrate and fat grams. The split
//! depends on the goal direction (and sex, for weight loss), and protein is
//! floored at a per-kilogram minimum of current body weight.

use crate::types::{Gender, GoalType, MacroTargets, UserProfile};

/// Weekly rate (kg/week) within which a goal counts as maintenance
pub const MAINTENANCE_BAND_KG_PER_WEEK: f64 = 0.1;

pub const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;
pub const KCAL_PER_GRAM_CARBS: f64 = 4.0;
pub const KCAL_PER_GRAM_FAT: f64 = 9.0;

/// Share of calories from each macro
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroSplit {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Classify the goal by the sign of the weekly rate
pub fn classify_goal(goal_kg_per_week: f64) -> GoalType {
    if goal_kg_per_week < -MAINTENANCE_BAND_KG_PER_WEEK {
        GoalType::Loss
    } else if goal_kg_per_week > MAINTENANCE_BAND_KG_PER_WEEK {
        GoalType::Gain
    } else {
        GoalType::Maintenance
    }
}

/// Percentage split for a goal type
pub fn macro_split(goal_type: GoalType, gender: Gender) -> MacroSplit {
    match (goal_type, gender) {
        (GoalType::Loss, Gender::Male) => MacroSplit {
            protein: 0.35,
            carbs: 0.40,
            fat: 0.25,
        },
        (GoalType::Loss, _) => MacroSplit {
            protein: 0.30,
            carbs: 0.40,
            fat: 0.30,
        },
        (GoalType::Maintenance, _) => MacroSplit {
            protein: 0.25,
            carbs: 0.45,
            fat: 0.30,
        },
        (GoalType::Gain, _) => MacroSplit {
            protein: 0.25,
            carbs: 0.50,
            fat: 0.25,
        },
    }
}

/// Minimum protein intake per kilogram of body weight (g/kg)
pub fn min_protein_per_kg(goal_type: GoalType) -> f64 {
    match goal_type {
        GoalType::Loss => 1.6,
        GoalType::Maintenance => 1.2,
        GoalType::Gain => 1.8,
    }
}

/// Calculates macro targets for a calorie goal.
///
/// When the protein floor exceeds the percentage-derived protein, the
/// calories left after protein are shared between carbs and fat in the
/// ratio of their split percentages.
///
/// # Arguments
/// * `calorie_goal` - Daily calorie goal (kcal)
/// * `profile` - Goal rate and sex select the split
/// * `weight_kg` - Current body weight for the protein floor
pub fn calculate_macro_targets(
    calorie_goal: i32,
    profile: &UserProfile,
    weight_kg: f64,
) -> MacroTargets {
    let calories = calorie_goal.max(0) as f64;
    let goal_type = classify_goal(profile.goal_kg_per_week);
    let split = macro_split(goal_type, profile.gender);

    let split_protein_g = calories * split.protein / KCAL_PER_GRAM_PROTEIN;
    let min_protein_g = weight_kg * min_protein_per_kg(goal_type);

    let (protein_g, carbs_g, fat_g) = if min_protein_g > split_protein_g {
        let remaining = (calories - min_protein_g * KCAL_PER_GRAM_PROTEIN).max(0.0);
        let carb_share = split.carbs / (split.carbs + split.fat);
        (
            min_protein_g,
            remaining * carb_share / KCAL_PER_GRAM_CARBS,
            remaining * (1.0 - carb_share) / KCAL_PER_GRAM_FAT,
        )
    } else {
        (
            split_protein_g,
            calories * split.carbs / KCAL_PER_GRAM_CARBS,
            calories * split.fat / KCAL_PER_GRAM_FAT,
        )
    };

    MacroTargets {
        protein_g: round_to_tenth(protein_g),
        carbs_g: round_to_tenth(carbs_g),
        fat_g: round_to_tenth(fat_g),
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
