//! Scoring
//!
//! Points for one exercise action: `count x points_per_unit`, doubled when the
//! action sets a new record for the exercise, then scaled by the series
//! multiplier (rounded down) while a series is active.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_RECORD_MULTIPLIER;
use crate::records::RecordTracker;
use crate::series::SeriesSnapshot;

/// Outcome of scoring one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub base_points: u32,
    pub final_points: u32,
    pub is_new_record: bool,
    /// Record factor applied (1 or the record multiplier)
    pub record_multiplier: u32,
    /// Series multiplier applied (1.0 when no series boosted the action)
    pub series_multiplier_applied: f64,
}

/// Score one action with the default record multiplier.
///
/// `series` is the series state this action is scored with; callers decide
/// whether it is taken before or after the action advances the series. A
/// zero count scores nothing and is never a record.
pub fn score_entry(
    exercise_id: &str,
    count_added: u32,
    base_points_per_unit: u32,
    records: &RecordTracker,
    series: &SeriesSnapshot,
) -> ScoreOutcome {
    score_entry_with(
        exercise_id,
        count_added,
        base_points_per_unit,
        records,
        series,
        DEFAULT_RECORD_MULTIPLIER,
    )
}

/// Score one action with an explicit record multiplier
pub fn score_entry_with(
    exercise_id: &str,
    count_added: u32,
    base_points_per_unit: u32,
    records: &RecordTracker,
    series: &SeriesSnapshot,
    record_factor: u32,
) -> ScoreOutcome {
    if count_added == 0 {
        return ScoreOutcome {
            base_points: 0,
            final_points: 0,
            is_new_record: false,
            record_multiplier: 1,
            series_multiplier_applied: 1.0,
        };
    }

    let base_points = u64::from(count_added) * u64::from(base_points_per_unit);
    let is_new_record = records.would_be_record(exercise_id, count_added);
    let record_multiplier = if is_new_record { record_factor.max(1) } else { 1 };
    let mut points = base_points * u64::from(record_multiplier);

    let mut series_multiplier_applied = 1.0;
    if series.is_active && series.multiplier_tenths > 10 {
        points = points * u64::from(series.multiplier_tenths) / 10;
        series_multiplier_applied = series.multiplier;
    }

    ScoreOutcome {
        base_points: saturate(base_points),
        final_points: saturate(points),
        is_new_record,
        record_multiplier,
        series_multiplier_applied,
    }
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesTracker;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn series_at(actions: u32) -> SeriesSnapshot {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap();
        let mut tracker = SeriesTracker::default();
        let mut snap = SeriesSnapshot::inactive();
        for i in 0..actions {
            snap = tracker.register_action(t0 + Duration::seconds(i64::from(i) * 10));
        }
        snap
    }

    fn tracker_with(exercise_id: &str, max: u32) -> RecordTracker {
        let mut records = RecordTracker::new();
        records.set_record(
            exercise_id,
            exercise_id,
            max,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        );
        records
    }

    #[test]
    fn test_new_record_doubles_points() {
        let outcome = score_entry("pullups", 5, 3, &RecordTracker::new(), &series_at(1));
        assert_eq!(outcome.base_points, 15);
        assert_eq!(outcome.final_points, 30);
        assert!(outcome.is_new_record);
        assert_eq!(outcome.record_multiplier, 2);
        assert_eq!(outcome.series_multiplier_applied, 1.0);
    }

    #[test]
    fn test_plain_action() {
        let records = tracker_with("dips", 20);
        let outcome = score_entry("dips", 10, 2, &records, &SeriesSnapshot::inactive());
        assert_eq!(outcome.final_points, 20);
        assert!(!outcome.is_new_record);
    }

    #[test]
    fn test_series_multiplier_floors() {
        let records = tracker_with("pushups", 100);
        // 7 * 1 * 1.4 = 9.8 -> 9
        let outcome = score_entry("pushups", 7, 1, &records, &series_at(3));
        assert_eq!(outcome.final_points, 9);
        assert_eq!(outcome.series_multiplier_applied, 1.4);
    }

    #[test]
    fn test_record_and_series_stack() {
        let records = tracker_with("pullups", 4);
        // 5 * 3 = 15, record -> 30, x1.2 -> 36
        let outcome = score_entry("pullups", 5, 3, &records, &series_at(2));
        assert!(outcome.is_new_record);
        assert_eq!(outcome.final_points, 36);
    }

    #[test]
    fn test_record_compares_single_action() {
        let records = tracker_with("pullups", 10);
        assert!(!score_entry("pullups", 10, 3, &records, &SeriesSnapshot::inactive()).is_new_record);
        assert!(score_entry("pullups", 11, 3, &records, &SeriesSnapshot::inactive()).is_new_record);
    }

    #[test]
    fn test_unknown_exercise_scores_zero() {
        let outcome = score_entry("burpees", 10, 0, &RecordTracker::new(), &series_at(5));
        assert_eq!(outcome.final_points, 0);
        assert!(outcome.is_new_record);
    }

    #[test]
    fn test_zero_count_is_noop() {
        let outcome = score_entry("pullups", 0, 3, &RecordTracker::new(), &series_at(5));
        assert_eq!(outcome.final_points, 0);
        assert!(!outcome.is_new_record);
    }

    #[test]
    fn test_capped_series_multiplier() {
        let records = tracker_with("pushups", 100);
        let outcome = score_entry("pushups", 10, 1, &records, &series_at(15));
        assert_eq!(outcome.series_multiplier_applied, 3.0);
        assert_eq!(outcome.final_points, 30);
    }
}
