//! Goal adaptation controller
//!
//! Decides whether the calorie goal should follow the filter's latest TDEE
//! estimate. A pass runs three gates in order (data volume, cooldown, filter
//! confidence); the first failing gate ends the pass with an explanation and
//! no state change. When all gates pass, the goal is recomputed from the TDEE
//! estimate and the weekly rate, clamped to safe bounds, and explained.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::formulas::{calculate_bmr, daily_calorie_delta};
use crate::nutrition::calculate_macro_targets;
use crate::types::{AdaptationOutcome, AdaptationRecord, UserRecord};

/// Body weight assumed for the BMR floor when no log exists (kg)
const FALLBACK_WEIGHT_KG: f64 = 70.0;

/// Reason a pass stopped before computing a new goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateFailure {
    InsufficientData { available: usize, required: usize },
    Cooldown { days_left: u32 },
    LowConfidence { confidence: f64, required: f64 },
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateFailure::InsufficientData { required, .. } => write!(
                f,
                "Insufficient data - need at least {} days of logs to adapt.",
                required
            ),
            GateFailure::Cooldown { days_left } => {
                write!(f, "Next adaptation available in {} days.", days_left)
            }
            GateFailure::LowConfidence { confidence, .. } => write!(
                f,
                "Confidence too low ({:.2}) - need more consistent data to adapt.",
                confidence
            ),
        }
    }
}

/// Which safety bound changed the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClamp {
    RaisedToBmr,
    CappedAboveTdee,
}

impl SafetyClamp {
    pub fn qualifier(&self) -> &'static str {
        match self {
            SafetyClamp::RaisedToBmr => "Goal adjusted to minimum safe level",
            SafetyClamp::CappedAboveTdee => "Goal capped at reasonable maximum",
        }
    }
}

/// Goal computed by a pass that cleared every gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProposal {
    pub goal: i32,
    pub explanation: String,
    pub clamp: Option<SafetyClamp>,
    /// TDEE estimate the goal was derived from (kcal, rounded)
    pub tdee: i32,
}

/// Run the gates in order; `None` means every gate passed.
pub fn check_gates(record: &UserRecord, config: &ControllerConfig) -> Option<GateFailure> {
    if record.logs.len() < config.min_logs {
        return Some(GateFailure::InsufficientData {
            available: record.logs.len(),
            required: config.min_logs,
        });
    }

    if record.days_since_last_adaptation < config.min_adaptation_interval_days {
        return Some(GateFailure::Cooldown {
            days_left: config.min_adaptation_interval_days - record.days_since_last_adaptation,
        });
    }

    let confidence = record.filter.adaptation_confidence;
    if confidence < config.confidence_threshold {
        return Some(GateFailure::LowConfidence {
            confidence,
            required: config.confidence_threshold,
        });
    }

    None
}

/// Clamp a goal to `[BMR, TDEE + margin]`.
///
/// The floor is applied first, so the ceiling wins in the degenerate case
/// where the two bounds cross.
pub fn clamp_goal(
    goal: i32,
    bmr: f64,
    tdee_estimate: f64,
    config: &ControllerConfig,
) -> (i32, Option<SafetyClamp>) {
    let floor = bmr.ceil() as i32;
    let ceiling = (tdee_estimate + config.max_surplus_over_tdee).floor() as i32;

    let mut clamped = goal;
    let mut clamp = None;

    if clamped < floor {
        clamped = floor;
        clamp = Some(SafetyClamp::RaisedToBmr);
    }
    if clamped > ceiling {
        clamped = ceiling;
        clamp = Some(SafetyClamp::CappedAboveTdee);
    }

    (clamped, clamp)
}

/// Qualitative label for a confidence score
pub fn confidence_label(confidence: f64) -> &'static str {
    if confidence > 0.7 {
        "high"
    } else if confidence > 0.4 {
        "moderate"
    } else {
        "low"
    }
}

/// Human-readable explanation of a goal recomputation.
pub fn explain_adaptation(
    old_tdee: i32,
    new_tdee: i32,
    confidence: f64,
    old_goal: i32,
    new_goal: i32,
    stable_band: i32,
) -> String {
    let tdee_change = new_tdee - old_tdee;

    if tdee_change.abs() < stable_band {
        return format!(
            "Your metabolism appears stable. Your goal remains at {} kcal based on the latest data.",
            new_goal
        );
    }

    let direction = if tdee_change > 0 {
        "increased"
    } else {
        "decreased"
    };

    format!(
        "Based on your recent progress, your estimated maintenance (TDEE) has {} by {} kcal \
         from {} to {} kcal. This adjustment was made with {} confidence. \
         As a result, your calorie goal has been updated from {} to {} kcal to keep you on track.",
        direction,
        tdee_change.abs(),
        old_tdee,
        new_tdee,
        confidence_label(confidence),
        old_goal,
        new_goal
    )
}

/// Compute the goal for a record that cleared every gate.
pub fn propose_goal(record: &UserRecord, config: &ControllerConfig) -> GoalProposal {
    let tdee_estimate = record.filter.tdee_estimate;
    let latest_tdee = tdee_estimate.round() as i32;
    let old_tdee = record
        .adaptation_history
        .last()
        .and_then(|entry| entry.tdee_estimate)
        .unwrap_or(latest_tdee);

    let target_daily_delta =
        daily_calorie_delta(record.profile.goal_kg_per_week, config.calories_per_kg);
    let raw_goal = (tdee_estimate + target_daily_delta).round() as i32;

    let weight = record.latest_weight().unwrap_or(FALLBACK_WEIGHT_KG);
    let bmr = calculate_bmr(&record.profile, weight);
    let (goal, clamp) = clamp_goal(raw_goal, bmr, tdee_estimate, config);

    let mut explanation = explain_adaptation(
        old_tdee,
        latest_tdee,
        record.filter.adaptation_confidence,
        record.calorie_goal,
        goal,
        config.stable_tdee_band,
    );
    if let Some(clamp) = clamp {
        explanation.push_str(&format!(" ({})", clamp.qualifier()));
    }

    GoalProposal {
        goal,
        explanation,
        clamp,
        tdee: latest_tdee,
    }
}

/// One controller pass over a user record.
///
/// On a goal change the record gains an audit entry, its cooldown counter
/// resets, and macro targets are recomputed against the current weight. On
/// any gate failure, or when the recomputed goal equals the current one, the
/// record is left untouched.
pub fn adapt_goal(
    record: &mut UserRecord,
    config: &ControllerConfig,
    now: DateTime<Utc>,
) -> AdaptationOutcome {
    let old_goal = record.calorie_goal;
    let confidence = record.filter.adaptation_confidence;

    if let Some(failure) = check_gates(record, config) {
        info!("no goal change for {}: {}", record.user_id, failure);
        return AdaptationOutcome {
            goal_changed: false,
            old_goal,
            new_goal: old_goal,
            explanation: failure.to_string(),
            confidence,
            macro_targets: record.macro_targets.clone(),
        };
    }

    let proposal = propose_goal(record, config);
    let goal_changed = proposal.goal != old_goal;

    if goal_changed {
        let sequence = record.adaptation_history.len() as u32 + 1;
        record.adaptation_history.push(AdaptationRecord {
            timestamp: now,
            old_goal,
            new_goal: proposal.goal,
            change: proposal.goal - old_goal,
            reason: proposal.explanation.clone(),
            confidence,
            sequence,
            tdee_estimate: Some(proposal.tdee),
        });
        record.calorie_goal = proposal.goal;
        record.days_since_last_adaptation = 0;

        let weight = record.latest_weight().unwrap_or(FALLBACK_WEIGHT_KG);
        record.macro_targets = calculate_macro_targets(proposal.goal, &record.profile, weight);

        info!(
            "goal adapted for {}: {} -> {} (adaptation #{})",
            record.user_id, old_goal, proposal.goal, sequence
        );
    } else {
        info!("no goal change for {}: {}", record.user_id, proposal.explanation);
    }

    AdaptationOutcome {
        goal_changed,
        old_goal,
        new_goal: proposal.goal,
        explanation: proposal.explanation,
        confidence,
        macro_targets: record.macro_targets.clone(),
    }
}
