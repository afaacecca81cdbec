//! Log preprocessing
//!
//! This module turns a raw, unsorted log set into the series the filter folds over:
//! 1. Stable sort by date
//! 2. Outlier flagging (weight jumps and calorie z-scores)
//! 3. Removal of flagged logs
//! 4. Daily series construction with interpolation across short gaps
//!
//! Gaps longer than the interpolation limit are left open, so the filter
//! advances over them with a larger day delta instead of fabricated data.

use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::PreprocessConfig;
use crate::quality::{mean, population_variance};
use crate::types::LogEntry;

/// Series ready for sequential filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedSeries {
    /// Real and interpolated entries in date order
    pub entries: Vec<LogEntry>,
    /// Parallel to `entries`: true where the entry was synthesized
    pub interpolated: Vec<bool>,
    /// Number of logs dropped as outliers
    pub outliers_removed: usize,
    /// True when cleaning left fewer than two logs and the raw logs were passed through
    pub fallback: bool,
}

impl PreparedSeries {
    fn passthrough(logs: &[LogEntry], fallback: bool) -> Self {
        Self {
            entries: logs.to_vec(),
            interpolated: vec![false; logs.len()],
            outliers_removed: 0,
            fallback,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of synthesized entries
    pub fn interpolated_count(&self) -> usize {
        self.interpolated.iter().filter(|flag| **flag).count()
    }
}

/// Flag outliers in a date-sorted log set.
///
/// A log is flagged when its weight moved faster than the allowed rate since
/// the previous log, or (with enough logs) when its intake is an extreme
/// z-score against the whole set. Flags are per log, not per pair.
pub fn detect_outliers(sorted: &[LogEntry], config: &PreprocessConfig) -> Vec<bool> {
    let mut outliers = vec![false; sorted.len()];

    for i in 1..sorted.len() {
        let days_diff = (sorted[i].date - sorted[i - 1].date).num_days();
        if days_diff > 0 {
            let rate = (sorted[i].weight_kg - sorted[i - 1].weight_kg).abs() / days_diff as f64;
            if rate > config.max_weight_change_per_day {
                outliers[i] = true;
            }
        }
    }

    if sorted.len() >= config.min_logs_for_calorie_outliers {
        let calories: Vec<f64> = sorted.iter().map(|log| log.calories_in as f64).collect();
        if let (Some(mean_cal), Some(variance)) = (mean(&calories), population_variance(&calories))
        {
            let std_cal = variance.sqrt();
            if std_cal > 0.0 {
                for (flag, cal) in outliers.iter_mut().zip(&calories) {
                    if (cal - mean_cal).abs() / std_cal > config.max_calorie_deviation {
                        *flag = true;
                    }
                }
            }
        }
    }

    outliers
}

/// Linear interpolation of a missing day between two logs.
///
/// Weight follows the elapsed-day fraction (rounded to 2 decimals); calories
/// are the truncated mean of the two endpoints. A zero day span returns the
/// earlier log unchanged.
pub fn interpolate_entry(before: &LogEntry, after: &LogEntry, target: NaiveDate) -> LogEntry {
    let days_total = (after.date - before.date).num_days();
    if days_total == 0 {
        return before.clone();
    }

    let days_to_target = (target - before.date).num_days();
    let ratio = days_to_target as f64 / days_total as f64;
    let weight = before.weight_kg + (after.weight_kg - before.weight_kg) * ratio;
    let calories = ((before.calories_in as f64 + after.calories_in as f64) / 2.0) as i32;

    LogEntry::new(target, round_to_hundredths(weight), calories)
}

/// Build the filter series from raw logs.
pub fn prepare_series(logs: &[LogEntry], config: &PreprocessConfig) -> PreparedSeries {
    if logs.len() < 2 {
        return PreparedSeries::passthrough(logs, false);
    }

    let mut sorted = logs.to_vec();
    sorted.sort_by_key(|log| log.date);

    let outlier_flags = detect_outliers(&sorted, config);
    let clean: Vec<LogEntry> = sorted
        .into_iter()
        .zip(&outlier_flags)
        .filter(|(_, flagged)| !**flagged)
        .map(|(log, _)| log)
        .collect();
    let outliers_removed = logs.len() - clean.len();

    if clean.len() < 2 {
        warn!(
            "only {} of {} logs survived outlier removal, using raw logs",
            clean.len(),
            logs.len()
        );
        return PreparedSeries::passthrough(logs, true);
    }

    let (entries, interpolated) = build_daily_series(&clean, config.max_interpolation_days);

    debug!(
        "prepared series: {} entries ({} interpolated) from {} logs, {} outliers removed",
        entries.len(),
        interpolated.iter().filter(|flag| **flag).count(),
        logs.len(),
        outliers_removed
    );

    PreparedSeries {
        entries,
        interpolated,
        outliers_removed,
        fallback: false,
    }
}

/// Walk every calendar day of the clean range, emitting real logs verbatim and
/// interpolating days whose gap to the next real log is short enough.
fn build_daily_series(clean: &[LogEntry], max_gap_days: i64) -> (Vec<LogEntry>, Vec<bool>) {
    let mut entries: Vec<LogEntry> = Vec::with_capacity(clean.len());
    let mut interpolated: Vec<bool> = Vec::with_capacity(clean.len());

    let start = clean[0].date;
    let end = clean[clean.len() - 1].date;
    let mut next = 0;
    let mut target = start;

    while target <= end {
        // Keep the first of any same-day duplicates
        while next < clean.len() && clean[next].date < target {
            next += 1;
        }

        if next < clean.len() && clean[next].date == target {
            entries.push(clean[next].clone());
            interpolated.push(false);
            next += 1;
        } else {
            let synthetic = match (entries.last(), clean.get(next)) {
                (Some(last), Some(upcoming)) if (upcoming.date - last.date).num_days() <= max_gap_days => {
                    Some(interpolate_entry(last, upcoming, target))
                }
                _ => None,
            };
            if let Some(entry) = synthetic {
                entries.push(entry);
                interpolated.push(true);
            }
        }

        target = target + Duration::days(1);
    }

    (entries, interpolated)
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn log(offset: i64, weight: f64, calories: i32) -> LogEntry {
        LogEntry::new(day(offset), weight, calories)
    }

    // === Outlier Tests ===

    #[test]
    fn test_weight_jump_flagged_at_any_position() {
        let config = PreprocessConfig::default();
        for position in 1..5 {
            let logs: Vec<LogEntry> = (0..5)
                .map(|i| {
                    let weight = if i == position { 85.0 } else { 80.0 };
                    log(i, weight, 2000)
                })
                .collect();
            let flags = detect_outliers(&logs, &config);
            assert!(flags[position as usize], "jump at {} not flagged", position);
        }
    }

    #[test]
    fn test_weight_rate_uses_day_span() {
        // 4 kg over 3 days is 1.33 kg/day, below the limit
        let logs = vec![log(0, 80.0, 2000), log(3, 84.0, 2000)];
        let flags = detect_outliers(&logs, &PreprocessConfig::default());
        assert_eq!(flags, vec![false, false]);
    }

    #[test]
    fn test_calorie_outlier_requires_seven_logs() {
        let mut logs: Vec<LogEntry> = (0..6).map(|i| log(i, 80.0, 2000)).collect();
        logs.push(log(6, 80.0, 9000));
        let few = detect_outliers(&logs[1..], &PreprocessConfig::default());
        assert!(few.iter().all(|f| !f));

        // Ten stable days plus a binge day
        let mut logs: Vec<LogEntry> = (0..10).map(|i| log(i, 80.0, 2000 + (i as i32 % 3) * 10)).collect();
        logs.push(log(10, 80.0, 9000));
        let flags = detect_outliers(&logs, &PreprocessConfig::default());
        assert!(flags[10]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn test_zero_calorie_spread_skips_z_rule() {
        let logs: Vec<LogEntry> = (0..8).map(|i| log(i, 80.0, 2000)).collect();
        let flags = detect_outliers(&logs, &PreprocessConfig::default());
        assert!(flags.iter().all(|f| !f));
    }

    // === Interpolation Tests ===

    #[test]
    fn test_midpoint_is_exact_mean() {
        let before = log(0, 80.0, 2000);
        let after = log(2, 81.0, 2501);
        let mid = interpolate_entry(&before, &after, day(1));
        assert_eq!(mid.weight_kg, 80.5);
        assert_eq!(mid.calories_in, 2250);
        assert_eq!(mid.date, day(1));
    }

    #[test]
    fn test_interpolation_zero_span_returns_before() {
        let before = log(0, 80.0, 2000);
        let same_day = log(0, 82.0, 2400);
        assert_eq!(interpolate_entry(&before, &same_day, day(0)), before);
    }

    #[test]
    fn test_interpolated_weight_rounded() {
        let before = log(0, 80.0, 2000);
        let after = log(3, 81.0, 2000);
        let entry = interpolate_entry(&before, &after, day(1));
        assert_eq!(entry.weight_kg, 80.33);
    }

    // === Series Tests ===

    #[test]
    fn test_two_day_gap_filled() {
        let logs = vec![log(0, 80.0, 2000), log(2, 81.0, 2200)];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        assert_eq!(series.len(), 3);
        assert_eq!(series.interpolated, vec![false, true, false]);
        assert_eq!(series.entries[1].weight_kg, 80.5);
        assert_eq!(series.entries[1].calories_in, 2100);
    }

    #[test]
    fn test_three_day_gap_chains_from_last_emitted() {
        let logs = vec![log(0, 80.0, 2000), log(3, 80.9, 2300)];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        assert_eq!(series.interpolated, vec![false, true, true, false]);
        assert_eq!(series.entries[1].weight_kg, 80.3);
        // Second synthetic day interpolates from the first one
        assert_eq!(series.entries[2].weight_kg, 80.6);
        assert_eq!(series.entries[2].calories_in, (2150 + 2300) / 2);
    }

    #[test]
    fn test_long_gap_left_unfilled() {
        let logs = vec![
            log(0, 80.0, 2000),
            log(1, 80.1, 2000),
            log(6, 79.8, 2000),
            log(7, 79.7, 2000),
        ];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        let dates: Vec<NaiveDate> = series.entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(0), day(1), day(6), day(7)]);
        assert_eq!(series.interpolated_count(), 0);
    }

    #[test]
    fn test_unsorted_input_sorted() {
        let logs = vec![log(2, 80.2, 2000), log(0, 80.0, 2000), log(1, 80.1, 2000)];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        let dates: Vec<NaiveDate> = series.entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(0), day(1), day(2)]);
    }

    #[test]
    fn test_outlier_removed_before_interpolation() {
        let logs = vec![
            log(0, 80.0, 2000),
            log(1, 80.1, 2000),
            log(2, 86.0, 2000),
            log(3, 80.2, 2000),
        ];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        // Day 2 spike flagged; day 3 falls back by 5.8 kg and is flagged too
        assert_eq!(series.outliers_removed, 2);
        assert!(!series.fallback);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_fallback_to_raw_logs() {
        let logs = vec![log(1, 90.0, 2000), log(0, 80.0, 2000)];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        assert!(series.fallback);
        assert_eq!(series.entries, logs);
        assert_eq!(series.interpolated, vec![false, false]);
    }

    #[test]
    fn test_single_log_passthrough() {
        let logs = vec![log(0, 80.0, 2000)];
        let series = prepare_series(&logs, &PreprocessConfig::default());
        assert_eq!(series.len(), 1);
        assert!(!series.fallback);
    }
}
