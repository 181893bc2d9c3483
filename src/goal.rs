//! Goal adaptation
//!
//! After each training day the point goal moves up by 10% when it was reached
//! and down by 5% when it was missed, bounded to 50..=500. Rounding is
//! half-up and computed in integer arithmetic so results are exact.
//!
//! The adjustment is applied once per day transition. A flag keyed by the
//! previous training day's date is persisted so repeated evaluation of the same
//! transition leaves the goal untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::schedule::{is_training_day, last_training_day};
use crate::store::{goal_adjusted_key, load_json, save_json, KeyValueStore, SETTINGS_KEY};
use crate::types::{DailyRecord, UserSettings};

/// Goal adaptation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalPolicy {
    pub increase_pct: u32,
    pub decrease_pct: u32,
    pub min_goal: u32,
    pub max_goal: u32,
}

impl Default for GoalPolicy {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl GoalPolicy {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            increase_pct: config.goal_increase_pct,
            decrease_pct: config.goal_decrease_pct,
            min_goal: config.goal_min,
            max_goal: config.goal_max,
        }
    }

    /// Goal for the next training day given today's goal and its outcome
    pub fn next_goal(&self, current_goal: u32, goal_reached: bool) -> u32 {
        let goal = u64::from(current_goal);
        if goal_reached {
            let scaled = scale_half_up(goal, 100 + u64::from(self.increase_pct));
            scaled.min(u64::from(self.max_goal)) as u32
        } else {
            let factor = 100u64.saturating_sub(u64::from(self.decrease_pct));
            let scaled = scale_half_up(goal, factor);
            scaled.max(u64::from(self.min_goal)).min(u64::from(u32::MAX)) as u32
        }
    }
}

/// `round(value * pct / 100)` with halves rounded up
fn scale_half_up(value: u64, pct: u64) -> u64 {
    (value * pct + 50) / 100
}

/// Next goal under the default policy.
///
/// `calculate_new_goal(100, true) == 110`, `calculate_new_goal(100, false) == 95`.
pub fn calculate_new_goal(current_goal: u32, goal_reached: bool) -> u32 {
    GoalPolicy::default().next_goal(current_goal, goal_reached)
}

/// An applied goal change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalAdjustment {
    /// Training day whose outcome drove the change
    pub training_date: NaiveDate,
    pub goal_reached: bool,
    pub previous_goal: u32,
    pub new_goal: u32,
}

/// Apply the once-per-transition goal adjustment.
///
/// Runs only when `today` is a training day and a previous training day has a
/// record. On success the new settings and the idempotency flag are both
/// persisted and `settings` is updated in place. Returns `None` when nothing
/// was applied, including when the transition was already handled.
pub fn apply_goal_transition<S>(
    store: &mut S,
    policy: &GoalPolicy,
    settings: &mut UserSettings,
    records: &[DailyRecord],
    today: NaiveDate,
) -> Result<Option<GoalAdjustment>, TrackerError>
where
    S: KeyValueStore + ?Sized,
{
    if !is_training_day(today, settings) {
        return Ok(None);
    }

    let Some(training_date) = last_training_day(records, settings, today) else {
        return Ok(None);
    };
    let Some(last_record) = records.iter().find(|r| r.date == training_date) else {
        return Ok(None);
    };

    let flag_key = goal_adjusted_key(training_date);
    if load_json::<bool, _>(store, &flag_key)?.unwrap_or(false) {
        tracing::debug!(%training_date, "goal already adjusted for this transition");
        return Ok(None);
    }

    let previous_goal = settings.current_goal;
    let new_goal = policy.next_goal(previous_goal, last_record.goal_reached);

    if new_goal != previous_goal {
        settings.current_goal = new_goal;
        save_json(store, SETTINGS_KEY, settings)?;
    }
    save_json(store, &flag_key, &true)?;

    tracing::info!(
        %training_date,
        goal_reached = last_record.goal_reached,
        previous_goal,
        new_goal,
        "goal adjusted"
    );

    Ok(Some(GoalAdjustment {
        training_date,
        goal_reached: last_record.goal_reached,
        previous_goal,
        new_goal,
    }))
}

/// Goal expected at the next training day, for display.
///
/// On a training day with the goal already reached the increase is
/// anticipated. On a rest day the last training day's outcome decides.
/// Otherwise the goal stays as it is.
pub fn preview_next_goal(
    policy: &GoalPolicy,
    settings: &UserSettings,
    today_is_training_day: bool,
    today_goal_reached: bool,
    last_training_result: Option<bool>,
) -> u32 {
    if today_is_training_day {
        if today_goal_reached {
            return policy.next_goal(settings.current_goal, true);
        }
        return settings.current_goal;
    }

    match last_training_result {
        Some(reached) => policy.next_goal(settings.current_goal, reached),
        None => settings.current_goal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, reached: bool) -> DailyRecord {
        DailyRecord {
            date: d,
            exercise_counts: BTreeMap::new(),
            total_points: if reached { 120 } else { 40 },
            goal_reached: reached,
        }
    }

    fn settings() -> UserSettings {
        UserSettings {
            training_frequency: 2,
            current_goal: 100,
            start_date: date(2024, 1, 1),
        }
    }

    #[test]
    fn test_calculate_new_goal_reference_values() {
        assert_eq!(calculate_new_goal(100, true), 110);
        assert_eq!(calculate_new_goal(100, false), 95);
        assert_eq!(calculate_new_goal(480, true), 500);
        assert_eq!(calculate_new_goal(52, false), 50);
    }

    #[test]
    fn test_rounding_is_half_up() {
        // 110 * 0.95 = 104.5
        assert_eq!(calculate_new_goal(110, false), 105);
        // 105 * 1.1 = 115.5
        assert_eq!(calculate_new_goal(105, true), 116);
        // 121 * 1.1 = 133.1
        assert_eq!(calculate_new_goal(121, true), 133);
    }

    #[test]
    fn test_bounds_hold_at_extremes() {
        assert_eq!(calculate_new_goal(500, true), 500);
        assert_eq!(calculate_new_goal(50, false), 50);
        assert_eq!(calculate_new_goal(1, false), 50);
    }

    #[test]
    fn test_custom_policy() {
        let policy = GoalPolicy {
            increase_pct: 20,
            decrease_pct: 10,
            min_goal: 10,
            max_goal: 1000,
        };
        assert_eq!(policy.next_goal(100, true), 120);
        assert_eq!(policy.next_goal(100, false), 90);
    }

    #[test]
    fn test_transition_applies_once() {
        let mut store = MemoryStore::new();
        let policy = GoalPolicy::default();
        let mut s = settings();
        let records = vec![record(date(2024, 1, 3), true)];
        let today = date(2024, 1, 5);

        let first = apply_goal_transition(&mut store, &policy, &mut s, &records, today)
            .unwrap()
            .unwrap();
        assert_eq!(first.training_date, date(2024, 1, 3));
        assert_eq!(first.new_goal, 110);
        assert_eq!(s.current_goal, 110);

        let second = apply_goal_transition(&mut store, &policy, &mut s, &records, today).unwrap();
        assert!(second.is_none());
        assert_eq!(s.current_goal, 110);

        let stored: UserSettings = load_json(&store, SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(stored.current_goal, 110);
        assert_eq!(
            load_json::<bool, _>(&store, "goal_adjusted_2024-01-03").unwrap(),
            Some(true)
        );
    }

    #[test]
    fn test_transition_skipped_on_rest_day() {
        let mut store = MemoryStore::new();
        let mut s = settings();
        let records = vec![record(date(2024, 1, 3), false)];

        let result = apply_goal_transition(
            &mut store,
            &GoalPolicy::default(),
            &mut s,
            &records,
            date(2024, 1, 4),
        )
        .unwrap();
        assert!(result.is_none());
        assert_eq!(s.current_goal, 100);
        assert!(store.is_empty());
    }

    #[test]
    fn test_transition_without_previous_record() {
        let mut store = MemoryStore::new();
        let mut s = settings();
        let result = apply_goal_transition(
            &mut store,
            &GoalPolicy::default(),
            &mut s,
            &[],
            date(2024, 1, 5),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_missed_goal_lowers_target() {
        let mut store = MemoryStore::new();
        let mut s = settings();
        let records = vec![record(date(2024, 1, 3), false)];

        let adj = apply_goal_transition(
            &mut store,
            &GoalPolicy::default(),
            &mut s,
            &records,
            date(2024, 1, 5),
        )
        .unwrap()
        .unwrap();
        assert!(!adj.goal_reached);
        assert_eq!(adj.new_goal, 95);
    }

    #[test]
    fn test_preview_next_goal() {
        let policy = GoalPolicy::default();
        let s = settings();

        assert_eq!(preview_next_goal(&policy, &s, true, true, None), 110);
        assert_eq!(preview_next_goal(&policy, &s, true, false, Some(true)), 100);
        assert_eq!(preview_next_goal(&policy, &s, false, false, Some(false)), 95);
        assert_eq!(preview_next_goal(&policy, &s, false, false, None), 100);
    }
}
