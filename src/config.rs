//! Tracker configuration
//!
//! Every tunable constant of the engine lives here with its default. The
//! defaults reproduce the standard rules: +10% / -5% goal adaptation bounded to
//! 50..=500, a two-minute series window growing the multiplier by 0.2 per
//! action up to 3.0, doubled points for a new record, and a 100 entry history.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Default number of history entries kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default longest statistics window, in days
pub const DEFAULT_MAX_STATS_DAYS: usize = 3660;

/// Largest `max_stats_days` a configuration may set
pub const STATS_DAYS_CEILING: usize = 36_600;

/// Default series window in seconds
pub const DEFAULT_SERIES_WINDOW_SECS: i64 = 120;

/// Multiplier growth per series action, in tenths
pub const DEFAULT_SERIES_STEP_TENTHS: u32 = 2;

/// Multiplier ceiling, in tenths (3.0x)
pub const DEFAULT_SERIES_MAX_TENTHS: u32 = 30;

/// Points factor for breaking a record
pub const DEFAULT_RECORD_MULTIPLIER: u32 = 2;

/// Lower bound for the adapted goal
pub const DEFAULT_GOAL_MIN: u32 = 50;

/// Upper bound for the adapted goal
pub const DEFAULT_GOAL_MAX: u32 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of history entries kept, oldest evicted first
    pub history_limit: usize,
    /// Series window in seconds
    pub series_window_secs: i64,
    /// Multiplier growth per series action, in tenths
    pub series_step_tenths: u32,
    /// Multiplier ceiling, in tenths
    pub series_max_tenths: u32,
    /// Points factor applied to a record-breaking action
    pub record_multiplier: u32,
    /// Goal increase after a reached training day, in percent
    pub goal_increase_pct: u32,
    /// Goal decrease after a missed training day, in percent
    pub goal_decrease_pct: u32,
    /// Lower bound for the adapted goal
    pub goal_min: u32,
    /// Upper bound for the adapted goal
    pub goal_max: u32,
    /// Offset from UTC used to derive the local calendar date of an instant
    pub utc_offset_minutes: i32,
    /// Longest statistics window served, in days
    pub max_stats_days: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            series_window_secs: DEFAULT_SERIES_WINDOW_SECS,
            series_step_tenths: DEFAULT_SERIES_STEP_TENTHS,
            series_max_tenths: DEFAULT_SERIES_MAX_TENTHS,
            record_multiplier: DEFAULT_RECORD_MULTIPLIER,
            goal_increase_pct: 10,
            goal_decrease_pct: 5,
            goal_min: DEFAULT_GOAL_MIN,
            goal_max: DEFAULT_GOAL_MAX,
            utc_offset_minutes: 0,
            max_stats_days: DEFAULT_MAX_STATS_DAYS,
        }
    }
}

impl TrackerConfig {
    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.history_limit == 0 {
            return Err(TrackerError::InvalidSettings(
                "history_limit must be at least 1".to_string(),
            ));
        }
        if self.series_window_secs <= 0 {
            return Err(TrackerError::InvalidSettings(
                "series_window_secs must be positive".to_string(),
            ));
        }
        if self.series_max_tenths < 10 {
            return Err(TrackerError::InvalidSettings(
                "series_max_tenths must be at least 10 (1.0x)".to_string(),
            ));
        }
        if self.goal_min > self.goal_max {
            return Err(TrackerError::InvalidSettings(format!(
                "goal_min {} exceeds goal_max {}",
                self.goal_min, self.goal_max
            )));
        }
        if self.max_stats_days == 0 || self.max_stats_days > STATS_DAYS_CEILING {
            return Err(TrackerError::InvalidSettings(format!(
                "max_stats_days must be between 1 and {STATS_DAYS_CEILING}"
            )));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes * 60).is_none() {
            return Err(TrackerError::InvalidSettings(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Calendar date of `now` in the configured local offset
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).date_naive(),
            None => now.date_naive(),
        }
    }
}
