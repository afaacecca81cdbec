//! Pipeline orchestration
//!
//! This module provides the public API for adaptive TDEE.
//! The four record operations run the stages in order:
//! formula seed → preprocessing → filter → goal controller.
//!
//! [`AdaptiveService`] layers user management on top of them: it owns a
//! [`UserStore`], validates input, and applies each operation to a record
//! loaded by id before writing it back.

use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::controller;
use crate::error::ComputeError;
use crate::formulas::{calculate_initial_tdee, daily_calorie_delta};
use crate::kalman::{run_filter, FilterRunSummary};
use crate::nutrition::calculate_macro_targets;
use crate::quality::QualityAnalyzer;
use crate::store::UserStore;
use crate::types::{
    AdaptationOutcome, AdaptationRecord, DataQualityMetrics, FilterState, LogEntry, UserProfile,
    UserRecord,
};
use crate::validation::{validate_log, validate_profile, validate_weight};

/// Reason stored on the first audit entry of every user
pub const INITIAL_GOAL_REASON: &str = "Initial goal set using standard TDEE calculation.";

/// Formula-based TDEE for a profile at a given weight.
///
/// # Example
/// ```ignore
/// let tdee = seed_estimate(&profile, 80.0);
/// ```
pub fn seed_estimate(profile: &UserProfile, weight_kg: f64) -> f64 {
    calculate_initial_tdee(profile, weight_kg)
}

/// Re-run preprocessing and the filter over the full log history.
///
/// Returns the record unchanged when fewer than two logs exist.
pub fn run_full_update(record: UserRecord) -> UserRecord {
    run_full_update_with(record, &EngineConfig::default())
}

/// [`run_full_update`] with explicit tunables
pub fn run_full_update_with(mut record: UserRecord, config: &EngineConfig) -> UserRecord {
    run_filter(&mut record, config);
    record
}

/// Data quality metrics for display; never mutates the record.
pub fn compute_quality(record: &UserRecord) -> DataQualityMetrics {
    QualityAnalyzer::analyze(&record.logs)
}

/// One goal controller pass with default tunables, stamped with the current time.
pub fn adapt_goal(record: &mut UserRecord) -> AdaptationOutcome {
    adapt_goal_with(record, &EngineConfig::default(), Utc::now())
}

/// [`adapt_goal`] with explicit tunables and audit timestamp
pub fn adapt_goal_with(
    record: &mut UserRecord,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> AdaptationOutcome {
    controller::adapt_goal(record, &config.controller, now)
}

/// User-facing service over a record store.
///
/// Use this when records live between calls; the free functions above are
/// enough when the caller already holds a record.
pub struct AdaptiveService<S: UserStore> {
    store: S,
    config: EngineConfig,
}

impl<S: UserStore> AdaptiveService<S> {
    /// Create a service with default tunables
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create a service with explicit tunables
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Register a user and set the formula-based starting goal.
    pub fn create_user(
        &mut self,
        name: &str,
        profile: UserProfile,
        start_weight_kg: f64,
        now: DateTime<Utc>,
    ) -> Result<UserRecord, ComputeError> {
        validate_profile(&profile)?;
        validate_weight(start_weight_kg)?;

        let seed = seed_estimate(&profile, start_weight_kg);
        let delta = daily_calorie_delta(
            profile.goal_kg_per_week,
            self.config.controller.calories_per_kg,
        );
        let initial_goal = (seed + delta) as i32;
        let macro_targets = calculate_macro_targets(initial_goal, &profile, start_weight_kg);

        let record = UserRecord {
            user_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            profile,
            initial_calorie_goal: initial_goal,
            calorie_goal: initial_goal,
            macro_targets,
            filter: FilterState::new(seed, self.config.filter.initial_uncertainty),
            days_since_last_adaptation: 0,
            adaptation_history: vec![AdaptationRecord {
                timestamp: now,
                old_goal: initial_goal,
                new_goal: initial_goal,
                change: 0,
                reason: INITIAL_GOAL_REASON.to_string(),
                confidence: 0.0,
                sequence: 1,
                tdee_estimate: Some(seed.round() as i32),
            }],
            logs: Vec::new(),
        };

        self.store.create(record.clone())?;
        info!(
            "created user {} with TDEE {:.0} and goal {}",
            record.user_id, seed, initial_goal
        );
        Ok(record)
    }

    /// Fetch a user record
    pub fn user(&self, user_id: &str) -> Result<UserRecord, ComputeError> {
        self.store.get(user_id)
    }

    /// Add or replace the log for `entry.date`.
    ///
    /// Every accepted log counts one day toward the adaptation cooldown.
    pub fn add_log(
        &mut self,
        user_id: &str,
        entry: LogEntry,
        today: NaiveDate,
    ) -> Result<UserRecord, ComputeError> {
        validate_log(&entry, today)?;
        let mut record = self.store.get(user_id)?;

        match record.logs.iter_mut().find(|log| log.date == entry.date) {
            Some(existing) => {
                existing.weight_kg = entry.weight_kg;
                existing.calories_in = entry.calories_in;
            }
            None => record.logs.push(entry.clone()),
        }
        record.logs.sort_by_key(|log| log.date);
        record.days_since_last_adaptation += 1;

        self.store.update(record.clone())?;
        info!("added/updated log for user {} on {}", user_id, entry.date);
        Ok(record)
    }

    /// Run the filter over the user's full history and persist the new state.
    ///
    /// `Ok(None)` means there were too few logs and nothing changed.
    pub fn run_filter(&mut self, user_id: &str) -> Result<Option<FilterRunSummary>, ComputeError> {
        let mut record = self.store.get(user_id)?;
        let summary = run_filter(&mut record, &self.config);
        if summary.is_some() {
            self.store.update(record)?;
        }
        Ok(summary)
    }

    /// Run one goal controller pass and persist any change.
    pub fn adapt(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AdaptationOutcome, ComputeError> {
        let mut record = self.store.get(user_id)?;
        let outcome = adapt_goal_with(&mut record, &self.config, now);
        if outcome.goal_changed {
            self.store.update(record)?;
        }
        Ok(outcome)
    }

    /// Data quality metrics for the user's current logs
    pub fn quality(&self, user_id: &str) -> Result<DataQualityMetrics, ComputeError> {
        Ok(compute_quality(&self.store.get(user_id)?))
    }

    /// Audit trail of goal changes, oldest first
    pub fn history(&self, user_id: &str) -> Result<Vec<AdaptationRecord>, ComputeError> {
        Ok(self.store.get(user_id)?.adaptation_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::InMemoryUserStore;
    use crate::types::Gender;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn profile() -> UserProfile {
        UserProfile {
            age: 30,
            gender: Gender::Male,
            height_cm: 180.0,
            activity_level: 1.55,
            goal_kg_per_week: -0.5,
            goal_weight_kg: 75.0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap()
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn stable_week() -> Vec<LogEntry> {
        let weights = [80.0, 80.1, 79.9, 80.0, 80.1, 80.0, 79.9];
        let calories = [2000, 2020, 1990, 2010, 1980, 2000, 2015];
        (0..7)
            .map(|i| LogEntry::new(day(i as i64), weights[i], calories[i]))
            .collect()
    }

    fn service_with_user() -> (AdaptiveService<InMemoryUserStore>, String) {
        let mut service = AdaptiveService::new(InMemoryUserStore::new());
        let user = service
            .create_user("Alex", profile(), 80.0, now() - Duration::days(7))
            .unwrap();
        (service, user.user_id)
    }

    #[test]
    fn test_seed_estimate_matches_formula() {
        assert!((seed_estimate(&profile(), 80.0) - 2759.0).abs() < 1e-9);
    }

    #[test]
    fn test_create_user_sets_initial_goal() {
        let (service, id) = service_with_user();
        let record = service.user(&id).unwrap();

        // trunc(2759 - 550)
        assert_eq!(record.initial_calorie_goal, 2209);
        assert_eq!(record.calorie_goal, 2209);
        assert_eq!(record.filter.tdee_estimate, 2759.0);
        assert_eq!(record.filter.tdee_uncertainty, 50_000.0);
        assert!(!record.filter.has_been_seeded);
        assert_eq!(
            record.macro_targets,
            calculate_macro_targets(2209, &record.profile, 80.0)
        );

        let history = service.history(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, INITIAL_GOAL_REASON);
        assert_eq!(history[0].old_goal, history[0].new_goal);
        assert_eq!(history[0].sequence, 1);
        assert_eq!(history[0].tdee_estimate, Some(2759));
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_create_user_rejects_invalid_input() {
        let mut service = AdaptiveService::new(InMemoryUserStore::new());
        let mut bad = profile();
        bad.age = 8;
        assert!(matches!(
            service.create_user("Kid", bad, 40.0, now()),
            Err(ComputeError::Validation(ValidationError::AgeOutOfRange { value: 8 }))
        ));
        assert!(matches!(
            service.create_user("Heavy", profile(), 350.0, now()),
            Err(ComputeError::Validation(ValidationError::WeightOutOfRange { .. }))
        ));
        assert!(service.store().is_empty());
    }

    #[test]
    fn test_add_log_upserts_and_sorts() {
        let (mut service, id) = service_with_user();
        service
            .add_log(&id, LogEntry::new(day(2), 80.0, 2000), day(10))
            .unwrap();
        service
            .add_log(&id, LogEntry::new(day(0), 80.4, 2100), day(10))
            .unwrap();
        let record = service
            .add_log(&id, LogEntry::new(day(2), 79.8, 1900), day(10))
            .unwrap();

        assert_eq!(
            record.logs,
            vec![
                LogEntry::new(day(0), 80.4, 2100),
                LogEntry::new(day(2), 79.8, 1900),
            ]
        );
        assert_eq!(record.days_since_last_adaptation, 3);
    }

    #[test]
    fn test_add_log_rejects_future_dates_and_unknown_users() {
        let (mut service, id) = service_with_user();
        assert!(matches!(
            service.add_log(&id, LogEntry::new(day(5), 80.0, 2000), day(4)),
            Err(ComputeError::Validation(ValidationError::FutureDate { .. }))
        ));
        assert!(matches!(
            service.add_log("missing", LogEntry::new(day(0), 80.0, 2000), day(4)),
            Err(ComputeError::UserNotFound(_))
        ));
        assert!(service.user(&id).unwrap().logs.is_empty());
    }

    #[test]
    fn test_run_filter_needs_two_logs() {
        let (mut service, id) = service_with_user();
        service
            .add_log(&id, LogEntry::new(day(0), 80.0, 2000), day(0))
            .unwrap();
        assert_eq!(service.run_filter(&id).unwrap(), None);
        assert!(!service.user(&id).unwrap().filter.has_been_seeded);
    }

    #[test]
    fn test_run_full_update_noop_with_one_log() {
        let (service, id) = service_with_user();
        let mut record = service.user(&id).unwrap();
        record.logs.push(LogEntry::new(day(0), 80.0, 2000));
        let before = record.clone();
        assert_eq!(run_full_update(record), before);
    }

    #[test]
    fn test_run_full_update_is_deterministic() {
        let (service, id) = service_with_user();
        let mut record = service.user(&id).unwrap();
        record.logs = stable_week();

        let first = run_full_update(record.clone());
        let second = run_full_update(record);

        assert_eq!(
            first.filter.tdee_estimate.to_bits(),
            second.filter.tdee_estimate.to_bits()
        );
        assert_eq!(
            first.filter.tdee_uncertainty.to_bits(),
            second.filter.tdee_uncertainty.to_bits()
        );
        assert_eq!(
            first.filter.adaptation_confidence.to_bits(),
            second.filter.adaptation_confidence.to_bits()
        );
    }

    #[test]
    fn test_compute_quality_does_not_mutate() {
        let (service, id) = service_with_user();
        let mut record = service.user(&id).unwrap();
        record.logs = stable_week();
        let before = record.clone();

        let metrics = compute_quality(&record);
        assert!(metrics.weight_consistency_score > 0.9);
        assert!(metrics.calorie_consistency_score > 0.9);
        assert_eq!(metrics.total_days_logged, 7);
        assert_eq!(record, before);
    }

    #[test]
    fn test_stable_week_adapts_on_day_seven() {
        let (mut service, id) = service_with_user();
        for entry in stable_week() {
            let today = entry.date;
            service.add_log(&id, entry, today).unwrap();
        }

        let summary = service.run_filter(&id).unwrap().unwrap();
        assert!(summary.reseeded);
        assert_eq!(summary.steps, 6);

        let record = service.user(&id).unwrap();
        assert!(record.filter.adaptation_confidence > 0.3);
        assert_eq!(record.days_since_last_adaptation, 7);

        let outcome = service.adapt(&id, now()).unwrap();
        assert!(outcome.goal_changed);
        assert_eq!(outcome.old_goal, 2209);
        assert!(outcome.explanation.contains("has decreased by"));

        let record = service.user(&id).unwrap();
        assert_eq!(record.calorie_goal, outcome.new_goal);
        assert_eq!(record.days_since_last_adaptation, 0);
        assert_eq!(record.total_adaptations(), 2);
        assert_eq!(record.macro_targets, outcome.macro_targets);

        let history = service.history(&id).unwrap();
        assert_eq!(history[1].sequence, 2);
        assert_eq!(history[1].timestamp, now());
        assert_eq!(
            history[1].tdee_estimate,
            Some(record.filter.tdee_estimate.round() as i32)
        );

        // Cooldown restarts after the change
        let again = service.adapt(&id, now()).unwrap();
        assert!(!again.goal_changed);
        assert_eq!(again.explanation, "Next adaptation available in 7 days.");
        assert_eq!(service.history(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_adapt_gate_failure_leaves_store_untouched() {
        let (mut service, id) = service_with_user();
        for entry in stable_week().into_iter().take(5) {
            let today = entry.date;
            service.add_log(&id, entry, today).unwrap();
        }
        let before = service.user(&id).unwrap();

        let outcome = service.adapt(&id, now()).unwrap();
        assert!(!outcome.goal_changed);
        assert_eq!(outcome.new_goal, before.calorie_goal);
        assert_eq!(service.user(&id).unwrap(), before);
    }

    #[test]
    fn test_custom_config_changes_gates() {
        let mut config = EngineConfig::default();
        config.controller.min_logs = 3;
        config.controller.min_adaptation_interval_days = 3;

        let mut service = AdaptiveService::with_config(InMemoryUserStore::new(), config);
        let id = service
            .create_user("Sam", profile(), 80.0, now())
            .unwrap()
            .user_id;
        for entry in stable_week().into_iter().take(3) {
            let today = entry.date;
            service.add_log(&id, entry, today).unwrap();
        }
        service.run_filter(&id).unwrap();

        let outcome = service.adapt(&id, now()).unwrap();
        assert!(!outcome.explanation.starts_with("Insufficient data"));
        assert!(!outcome.explanation.starts_with("Next adaptation"));
    }
}
