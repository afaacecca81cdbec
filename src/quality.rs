//! Data quality scoring
//!
//! This module derives a [`DataQualityMetrics`] snapshot from the raw log set:
//! - Longest consecutive-day streak and mean gap length
//! - Weight and calorie consistency over the most recent logs
//!
//! The snapshot is a pure function of the logs and carries no state between
//! calls; the filter recomputes it before every run.

use crate::types::{DataQualityMetrics, LogEntry};

/// Number of most recent logs used for consistency scoring
pub const CONSISTENCY_WINDOW: usize = 14;

/// Weight variance (kg²) at which weight consistency reaches zero
pub const WEIGHT_VARIANCE_SCALE: f64 = 10.0;

/// Calorie variance (kcal²) at which calorie consistency reaches zero
pub const CALORIE_VARIANCE_SCALE: f64 = 200_000.0;

/// Analyzer for computing data quality metrics
pub struct QualityAnalyzer;

impl QualityAnalyzer {
    /// Compute quality metrics for an unsorted log set
    pub fn analyze(logs: &[LogEntry]) -> DataQualityMetrics {
        if logs.is_empty() {
            return DataQualityMetrics::default();
        }

        let mut sorted: Vec<&LogEntry> = logs.iter().collect();
        sorted.sort_by_key(|log| log.date);

        let (consecutive_days, average_gap_days) = streak_and_gaps(&sorted);

        let recent = &sorted[sorted.len().saturating_sub(CONSISTENCY_WINDOW)..];

        let recent_weights: Vec<f64> = recent.iter().map(|log| log.weight_kg).collect();
        let weight_consistency_score = consistency_score(&recent_weights, WEIGHT_VARIANCE_SCALE);

        let recent_calories: Vec<f64> = recent
            .iter()
            .filter(|log| log.calories_in > 0)
            .map(|log| log.calories_in as f64)
            .collect();
        let calorie_consistency_score =
            consistency_score(&recent_calories, CALORIE_VARIANCE_SCALE);

        DataQualityMetrics {
            consecutive_days,
            total_days_logged: sorted.len() as u32,
            average_gap_days,
            weight_consistency_score,
            calorie_consistency_score,
        }
    }
}

/// Longest consecutive streak and mean missing-day count across breaks
fn streak_and_gaps(sorted: &[&LogEntry]) -> (u32, f64) {
    let mut gaps: Vec<i64> = Vec::new();
    let mut streak = 1u32;
    let mut longest = 1u32;

    for pair in sorted.windows(2) {
        let gap = (pair[1].date - pair[0].date).num_days();
        match gap {
            1 => {
                streak += 1;
                longest = longest.max(streak);
            }
            // Duplicate dates neither extend nor break a streak
            g if g <= 0 => {}
            g => {
                gaps.push(g - 1);
                streak = 1;
            }
        }
    }

    let average_gap = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<i64>() as f64 / gaps.len() as f64
    };

    (longest, average_gap)
}

/// `max(0, 1 - variance / scale)`, or 1.0 with fewer than two values
fn consistency_score(values: &[f64], scale: f64) -> f64 {
    match population_variance(values) {
        Some(variance) => (1.0 - variance / scale).max(0.0),
        None => 1.0,
    }
}

/// Arithmetic mean
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by n), `None` for fewer than two values
pub(crate) fn population_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn log(offset: i64, weight: f64, calories: i32) -> LogEntry {
        LogEntry::new(day(offset), weight, calories)
    }

    #[test]
    fn test_empty_logs() {
        let metrics = QualityAnalyzer::analyze(&[]);
        assert_eq!(metrics.total_days_logged, 0);
        assert_eq!(metrics.consecutive_days, 0);
        assert_eq!(metrics.weight_consistency_score, 1.0);
    }

    #[test]
    fn test_streak_and_gaps() {
        // Days 0,1,2 then 5,6 then 10: gaps of 2 and 3 missing days
        let logs: Vec<LogEntry> = [0, 1, 2, 5, 6, 10]
            .into_iter()
            .map(|d| log(d, 80.0, 2000))
            .collect();

        let metrics = QualityAnalyzer::analyze(&logs);
        assert_eq!(metrics.consecutive_days, 3);
        assert_eq!(metrics.total_days_logged, 6);
        assert!((metrics.average_gap_days - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let logs = vec![log(2, 80.0, 2000), log(0, 80.0, 2000), log(1, 80.0, 2000)];
        let metrics = QualityAnalyzer::analyze(&logs);
        assert_eq!(metrics.consecutive_days, 3);
        assert_eq!(metrics.average_gap_days, 0.0);
    }

    #[test]
    fn test_stable_week_is_highly_consistent() {
        let weights = [80.0, 80.1, 79.9, 80.0, 80.1, 80.0, 79.9];
        let calories = [2000, 2020, 1990, 2010, 1980, 2000, 2015];
        let logs: Vec<LogEntry> = (0..7)
            .map(|i| log(i as i64, weights[i], calories[i]))
            .collect();

        let metrics = QualityAnalyzer::analyze(&logs);
        assert!(metrics.weight_consistency_score > 0.9);
        assert!(metrics.calorie_consistency_score > 0.9);
        assert_eq!(metrics.consecutive_days, 7);
    }

    #[test]
    fn test_consistency_floors_at_zero() {
        let logs = vec![
            log(0, 60.0, 500),
            log(1, 90.0, 4000),
            log(2, 60.0, 500),
            log(3, 90.0, 4000),
        ];
        let metrics = QualityAnalyzer::analyze(&logs);
        assert_eq!(metrics.weight_consistency_score, 0.0);
        assert_eq!(metrics.calorie_consistency_score, 0.0);
    }

    #[test]
    fn test_zero_calorie_days_ignored_for_calorie_consistency() {
        let logs = vec![
            log(0, 80.0, 2000),
            log(1, 80.0, 0),
            log(2, 80.0, 2000),
            log(3, 80.0, 0),
        ];
        let metrics = QualityAnalyzer::analyze(&logs);
        assert_eq!(metrics.calorie_consistency_score, 1.0);
    }

    #[test]
    fn test_only_recent_window_scored() {
        // A wild first week followed by 14 stable days
        let mut logs: Vec<LogEntry> = (0..7)
            .map(|i| log(i, if i % 2 == 0 { 70.0 } else { 90.0 }, 2000))
            .collect();
        logs.extend((7..21).map(|i| log(i, 80.0, 2000)));

        let metrics = QualityAnalyzer::analyze(&logs);
        assert_eq!(metrics.weight_consistency_score, 1.0);
        assert_eq!(metrics.total_days_logged, 21);
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(population_variance(&[1.0]), None);
        let var = population_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((var - 4.0).abs() < 1e-12);
    }
}
