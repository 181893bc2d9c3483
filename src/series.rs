//! Timed exercise series
//!
//! A series is a streak of exercise actions each arriving within a rolling
//! window (two minutes by default) of the previous one. Every action inside
//! the window bumps the multiplier by 0.2 up to 3.0 and restarts the window.
//!
//! The countdown is never decremented. It is derived from `now - started_at`
//! on every observation, so a host that was suspended for minutes still sees
//! the correct state on its next poll. Series state is session-only and is not
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;

/// Series window, multiplier step and ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRules {
    pub window_secs: i64,
    pub step_tenths: u32,
    pub max_tenths: u32,
}

impl Default for SeriesRules {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl SeriesRules {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            window_secs: config.series_window_secs,
            step_tenths: config.series_step_tenths,
            max_tenths: config.series_max_tenths,
        }
    }

    /// Multiplier in tenths for the `n`-th action of a series (n >= 1)
    pub fn multiplier_tenths(&self, n: u32) -> u32 {
        let steps = n.saturating_sub(1);
        10u32
            .saturating_add(steps.saturating_mul(self.step_tenths))
            .min(self.max_tenths)
    }
}

/// Multiplier for the `n`-th action under the default rules:
/// `min(1.0 + (n - 1) * 0.2, 3.0)`
pub fn series_multiplier(n: u32) -> f64 {
    f64::from(SeriesRules::default().multiplier_tenths(n)) / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SeriesState {
    Inactive,
    Active {
        multiplier_tenths: u32,
        exercise_count: u32,
        started_at: DateTime<Utc>,
    },
}

/// Point-in-time view of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub is_active: bool,
    pub multiplier: f64,
    pub multiplier_tenths: u32,
    pub remaining_time_seconds: i64,
    pub exercise_count: u32,
    pub start_time: Option<DateTime<Utc>>,
}

impl SeriesSnapshot {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            multiplier: 1.0,
            multiplier_tenths: 10,
            remaining_time_seconds: 0,
            exercise_count: 0,
            start_time: None,
        }
    }
}

/// Result of polling the series clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeriesTick {
    /// No series running
    Idle,
    Running {
        remaining_time_seconds: i64,
        multiplier: f64,
        exercise_count: u32,
    },
    /// The window ran out since the last observation; reported once
    Expired {
        multiplier: f64,
        exercise_count: u32,
    },
}

/// Series state machine
#[derive(Debug, Clone)]
pub struct SeriesTracker {
    rules: SeriesRules,
    state: SeriesState,
}

impl Default for SeriesTracker {
    fn default() -> Self {
        Self::new(SeriesRules::default())
    }
}

impl SeriesTracker {
    pub fn new(rules: SeriesRules) -> Self {
        Self {
            rules,
            state: SeriesState::Inactive,
        }
    }

    pub fn state(&self) -> SeriesState {
        self.state
    }

    pub fn rules(&self) -> &SeriesRules {
        &self.rules
    }

    /// Seconds left in the window at `now`, zero when inactive or elapsed.
    ///
    /// Whole elapsed seconds are subtracted, so the value reads 120 right
    /// after an action and reaches 0 exactly when the window closes.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.state {
            SeriesState::Inactive => 0,
            SeriesState::Active { started_at, .. } => {
                let elapsed_secs = elapsed_millis(started_at, now).div_euclid(1000);
                (self.rules.window_secs - elapsed_secs).clamp(0, self.rules.window_secs)
            }
        }
    }

    fn within_window(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        elapsed_millis(started_at, now) < self.rules.window_secs.saturating_mul(1000)
    }

    /// Current view without changing state. An elapsed series reads inactive.
    pub fn snapshot(&self, now: DateTime<Utc>) -> SeriesSnapshot {
        match self.state {
            SeriesState::Active {
                multiplier_tenths,
                exercise_count,
                started_at,
            } if self.within_window(started_at, now) => SeriesSnapshot {
                is_active: true,
                multiplier: f64::from(multiplier_tenths) / 10.0,
                multiplier_tenths,
                remaining_time_seconds: self.remaining_seconds(now),
                exercise_count,
                start_time: Some(started_at),
            },
            _ => SeriesSnapshot::inactive(),
        }
    }

    /// Register an exercise action at `now` and return the resulting state.
    ///
    /// Continues the series when the previous action is inside the window,
    /// otherwise discards any stale series and starts a fresh one.
    pub fn register_action(&mut self, now: DateTime<Utc>) -> SeriesSnapshot {
        let exercise_count = match self.state {
            SeriesState::Active {
                exercise_count,
                started_at,
                ..
            } if self.within_window(started_at, now) => exercise_count.saturating_add(1),
            _ => 1,
        };

        let multiplier_tenths = self.rules.multiplier_tenths(exercise_count);
        self.state = SeriesState::Active {
            multiplier_tenths,
            exercise_count,
            started_at: now,
        };

        if exercise_count == 1 {
            tracing::debug!(%now, "series started");
        } else {
            tracing::debug!(exercise_count, multiplier_tenths, "series extended");
        }

        self.snapshot(now)
    }

    /// Observe the clock. Moves an elapsed series to inactive and reports
    /// `Expired` for that one observation.
    pub fn poll(&mut self, now: DateTime<Utc>) -> SeriesTick {
        match self.state {
            SeriesState::Inactive => SeriesTick::Idle,
            SeriesState::Active {
                multiplier_tenths,
                exercise_count,
                started_at,
            } => {
                let multiplier = f64::from(multiplier_tenths) / 10.0;
                if self.within_window(started_at, now) {
                    SeriesTick::Running {
                        remaining_time_seconds: self.remaining_seconds(now),
                        multiplier,
                        exercise_count,
                    }
                } else {
                    self.state = SeriesState::Inactive;
                    tracing::info!(exercise_count, multiplier, "series expired");
                    SeriesTick::Expired {
                        multiplier,
                        exercise_count,
                    }
                }
            }
        }
    }

    /// End the series immediately. Returns whether one was running.
    pub fn end(&mut self) -> bool {
        let was_active = matches!(self.state, SeriesState::Active { .. });
        self.state = SeriesState::Inactive;
        was_active
    }
}

/// Milliseconds from `start` to `now`; a clock stepping backwards counts as zero
fn elapsed_millis(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_milliseconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_multiplier_function() {
        assert_eq!(series_multiplier(1), 1.0);
        assert_eq!(series_multiplier(2), 1.2);
        assert_eq!(series_multiplier(3), 1.4);
        assert_eq!(series_multiplier(10), 2.8);
        assert_eq!(series_multiplier(11), 3.0);
        assert_eq!(series_multiplier(50), 3.0);
    }

    #[test]
    fn test_quick_actions_escalate_then_gap_resets() {
        let mut series = SeriesTracker::default();
        let a = series.register_action(t0());
        let b = series.register_action(t0() + Duration::seconds(60));
        let c = series.register_action(t0() + Duration::seconds(150));

        assert_eq!(
            vec![a.multiplier, b.multiplier, c.multiplier],
            vec![1.0, 1.2, 1.4]
        );
        assert_eq!(c.exercise_count, 3);

        // 130 seconds after the third action
        let d = series.register_action(t0() + Duration::seconds(280));
        assert_eq!(d.multiplier, 1.0);
        assert_eq!(d.exercise_count, 1);
    }

    #[test]
    fn test_each_action_resets_window() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());
        series.register_action(t0() + Duration::seconds(100));

        // 190s after start but only 90s after the last action
        let snap = series.snapshot(t0() + Duration::seconds(190));
        assert!(snap.is_active);
        assert_eq!(snap.remaining_time_seconds, 30);
    }

    #[test]
    fn test_remaining_time_from_wall_clock() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());

        assert_eq!(series.remaining_seconds(t0()), 120);
        assert_eq!(series.remaining_seconds(t0() + Duration::milliseconds(1500)), 119);
        assert_eq!(series.remaining_seconds(t0() + Duration::seconds(45)), 75);
        assert_eq!(series.remaining_seconds(t0() + Duration::seconds(500)), 0);
    }

    #[test]
    fn test_poll_reports_expiry_once_after_suspension() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());
        series.register_action(t0() + Duration::seconds(10));

        assert!(matches!(
            series.poll(t0() + Duration::seconds(20)),
            SeriesTick::Running {
                remaining_time_seconds: 110,
                exercise_count: 2,
                ..
            }
        ));

        // host suspended for ten minutes
        let tick = series.poll(t0() + Duration::minutes(10));
        assert_eq!(
            tick,
            SeriesTick::Expired {
                multiplier: 1.2,
                exercise_count: 2
            }
        );
        assert_eq!(series.poll(t0() + Duration::minutes(11)), SeriesTick::Idle);
        assert_eq!(series.state(), SeriesState::Inactive);
    }

    #[test]
    fn test_window_boundary() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());

        let almost = t0() + Duration::milliseconds(119_999);
        assert!(series.snapshot(almost).is_active);

        let exactly = t0() + Duration::seconds(120);
        assert!(!series.snapshot(exactly).is_active);
        let snap = series.register_action(exactly);
        assert_eq!(snap.exercise_count, 1);
    }

    #[test]
    fn test_end_is_immediate() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());
        assert!(series.end());
        assert!(!series.snapshot(t0()).is_active);
        assert!(!series.end());

        let snap = series.register_action(t0() + Duration::seconds(5));
        assert_eq!(snap.exercise_count, 1);
    }

    #[test]
    fn test_backwards_clock_keeps_series() {
        let mut series = SeriesTracker::default();
        series.register_action(t0());
        let snap = series.snapshot(t0() - Duration::seconds(30));
        assert!(snap.is_active);
        assert_eq!(snap.remaining_time_seconds, 120);
    }

    #[test]
    fn test_custom_rules() {
        let rules = SeriesRules {
            window_secs: 30,
            step_tenths: 5,
            max_tenths: 20,
        };
        let mut series = SeriesTracker::new(rules);
        series.register_action(t0());
        let snap = series.register_action(t0() + Duration::seconds(20));
        assert_eq!(snap.multiplier, 1.5);
        let snap = series.register_action(t0() + Duration::seconds(40));
        assert_eq!(snap.multiplier, 2.0);
        let snap = series.register_action(t0() + Duration::seconds(80));
        assert_eq!(snap.exercise_count, 1);
    }
}
