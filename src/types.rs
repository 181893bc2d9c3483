//! Core types for Streakfit
//!
//! This module defines the persisted data model (settings, daily records,
//! history entries, exercise records), the static exercise catalog, and the
//! derived per-day statistics.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::DEFAULT_GOAL_MIN;
use crate::error::TrackerError;

/// Default days between training days (every other day)
pub const DEFAULT_TRAINING_FREQUENCY: u32 = 2;

/// Default starting goal in points
pub const DEFAULT_GOAL: u32 = 100;

/// User settings singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Days between training days (1 = every day)
    pub training_frequency: u32,
    /// Current daily point goal
    pub current_goal: u32,
    /// Anchor date of the training cadence
    pub start_date: NaiveDate,
}

impl UserSettings {
    /// Default settings anchored at `start_date`
    pub fn starting(start_date: NaiveDate) -> Self {
        Self {
            training_frequency: DEFAULT_TRAINING_FREQUENCY,
            current_goal: DEFAULT_GOAL,
            start_date,
        }
    }

    /// Reject settings the schedule cannot work with
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.training_frequency == 0 {
            return Err(TrackerError::InvalidSettings(
                "training_frequency must be at least 1".to_string(),
            ));
        }
        if self.current_goal == 0 {
            return Err(TrackerError::InvalidSettings(format!(
                "current_goal must be positive (suggested minimum {})",
                DEFAULT_GOAL_MIN
            )));
        }
        Ok(())
    }
}

/// Aggregated result of one calendar day. Unique by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    /// Units done per exercise id
    #[serde(default)]
    pub exercise_counts: BTreeMap<String, u32>,
    /// Naive per-unit total: sum of count x points_per_unit
    pub total_points: u32,
    pub goal_reached: bool,
}

impl DailyRecord {
    /// Build a record from counts, computing the naive total against `catalog`
    pub fn from_counts(
        date: NaiveDate,
        exercise_counts: BTreeMap<String, u32>,
        catalog: &[ExerciseDefinition],
        goal: u32,
    ) -> Self {
        let total_points = naive_points(&exercise_counts, catalog);
        Self {
            date,
            exercise_counts,
            total_points,
            goal_reached: total_points >= goal,
        }
    }

    pub fn count_for(&self, exercise_id: &str) -> u32 {
        self.exercise_counts.get(exercise_id).copied().unwrap_or(0)
    }
}

/// Sum of count x points_per_unit; unknown exercises contribute nothing
pub fn naive_points(counts: &BTreeMap<String, u32>, catalog: &[ExerciseDefinition]) -> u32 {
    counts
        .iter()
        .map(|(id, count)| count.saturating_mul(points_per_unit(catalog, id)))
        .fold(0, u32::saturating_add)
}

/// Static catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    pub id: String,
    pub display_name: String,
    pub points_per_unit: u32,
    /// Display color as a hex string
    pub color: String,
}

impl ExerciseDefinition {
    pub fn new(id: &str, display_name: &str, points_per_unit: u32, color: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            points_per_unit,
            color: color.to_string(),
        }
    }
}

/// Built-in exercise catalog
pub fn default_catalog() -> Vec<ExerciseDefinition> {
    vec![
        ExerciseDefinition::new("pullups", "Pull-ups", 3, "#FF6B6B"),
        ExerciseDefinition::new("dips", "Dips", 2, "#4ECDC4"),
        ExerciseDefinition::new("pushups", "Push-ups", 1, "#45B7D1"),
    ]
}

/// Catalog lookup by id
pub fn find_exercise<'a>(
    catalog: &'a [ExerciseDefinition],
    exercise_id: &str,
) -> Option<&'a ExerciseDefinition> {
    catalog.iter().find(|e| e.id == exercise_id)
}

/// Points per unit for an exercise id; zero when the id is not in the catalog
pub fn points_per_unit(catalog: &[ExerciseDefinition], exercise_id: &str) -> u32 {
    find_exercise(catalog, exercise_id)
        .map(|e| e.points_per_unit)
        .unwrap_or(0)
}

/// One discrete "add" action in the append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistoryEntry {
    pub id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub count_added: u32,
    /// Points awarded after record and series multipliers
    pub points_awarded: u32,
    pub timestamp: DateTime<Utc>,
    /// Local calendar date of `timestamp`
    pub date: NaiveDate,
    #[serde(default)]
    pub is_record: bool,
    #[serde(default = "unit_multiplier")]
    pub record_multiplier: f64,
    #[serde(default = "unit_multiplier")]
    pub series_multiplier: f64,
}

fn unit_multiplier() -> f64 {
    1.0
}

/// Best-ever single-action count for one exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub exercise_id: String,
    pub exercise_name: String,
    pub max_count: u32,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

/// Derived statistics for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub points: u32,
    /// Current goal on training days, zero otherwise
    pub goal: u32,
    pub goal_reached: bool,
    pub is_training_day: bool,
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate, TrackerError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| TrackerError::DateParse(format!("{s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_record_from_counts() {
        let catalog = default_catalog();
        let mut counts = BTreeMap::new();
        counts.insert("pullups".to_string(), 10);
        counts.insert("pushups".to_string(), 25);

        let record = DailyRecord::from_counts(date(2024, 1, 15), counts, &catalog, 50);
        assert_eq!(record.total_points, 55);
        assert!(record.goal_reached);
        assert_eq!(record.count_for("pullups"), 10);
        assert_eq!(record.count_for("dips"), 0);
    }

    #[test]
    fn test_unknown_exercise_has_no_points() {
        let catalog = default_catalog();
        assert_eq!(points_per_unit(&catalog, "burpees"), 0);

        let mut counts = BTreeMap::new();
        counts.insert("burpees".to_string(), 40);
        assert_eq!(naive_points(&counts, &catalog), 0);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = UserSettings::starting(date(2024, 1, 1));
        assert!(settings.validate().is_ok());

        settings.training_frequency = 0;
        assert!(matches!(
            settings.validate(),
            Err(TrackerError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_history_entry_defaults_multipliers() {
        let json = r#"{
            "id": "a",
            "exercise_id": "dips",
            "exercise_name": "Dips",
            "count_added": 5,
            "points_awarded": 10,
            "timestamp": "2024-01-15T10:00:00Z",
            "date": "2024-01-15"
        }"#;
        let entry: ExerciseHistoryEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.is_record);
        assert_eq!(entry.record_multiplier, 1.0);
        assert_eq!(entry.series_multiplier, 1.0);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29").unwrap(), date(2024, 2, 29));
        assert!(matches!(
            parse_date("2024-13-01"),
            Err(TrackerError::DateParse(_))
        ));
    }
}
