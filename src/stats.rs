//! Statistics
//!
//! Builds a fixed-length per-day series ending today from the sparse daily
//! records, plus pure reductions over that series (goal streak, success rate,
//! period summary, per-exercise totals).

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schedule::is_training_day;
use crate::types::{DailyRecord, DayStats, ExerciseDefinition, UserSettings};

/// Days covered by the short-window views (streak, exercise totals)
pub const RECENT_WINDOW_DAYS: usize = 7;

/// One entry per day for the `days` dates ending at `today`, oldest first.
///
/// Dates without a record have zero points and an unreached goal. The goal is
/// the current goal on training days and zero on rest days.
pub fn stats_for_period(
    records: &[DailyRecord],
    settings: &UserSettings,
    days: usize,
    today: NaiveDate,
) -> Vec<DayStats> {
    let by_date: HashMap<NaiveDate, &DailyRecord> = records.iter().map(|r| (r.date, r)).collect();

    (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset as u64)))
        .map(|date| {
            let record = by_date.get(&date);
            let is_training = is_training_day(date, settings);
            DayStats {
                date,
                points: record.map_or(0, |r| r.total_points),
                goal: if is_training { settings.current_goal } else { 0 },
                goal_reached: record.map_or(false, |r| r.goal_reached),
                is_training_day: is_training,
            }
        })
        .collect()
}

/// Last `n` entries of a series
fn tail(stats: &[DayStats], n: usize) -> &[DayStats] {
    &stats[stats.len().saturating_sub(n)..]
}

/// Consecutive reached training days, counting back from the newest day of
/// the last seven. Rest days are skipped; the first missed training day stops
/// the count.
pub fn goal_streak(stats: &[DayStats]) -> u32 {
    let mut streak = 0;
    for day in tail(stats, RECENT_WINDOW_DAYS).iter().rev() {
        if !day.is_training_day {
            continue;
        }
        if !day.goal_reached {
            break;
        }
        streak += 1;
    }
    streak
}

/// Percentage of training days with the goal reached, rounded; zero when the
/// series has no training days
pub fn success_rate(stats: &[DayStats]) -> u32 {
    let training_days = stats.iter().filter(|s| s.is_training_day).count();
    let reached = stats
        .iter()
        .filter(|s| s.is_training_day && s.goal_reached)
        .count();
    percent(reached, training_days)
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Streak card figures over the last seven days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub success_rate: u32,
}

pub fn streak_summary(stats: &[DayStats]) -> StreakSummary {
    let recent = tail(stats, RECENT_WINDOW_DAYS);
    StreakSummary {
        current_streak: goal_streak(recent),
        success_rate: success_rate(recent),
    }
}

/// Totals over a whole series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub days: usize,
    pub training_days: usize,
    pub goals_reached: usize,
    pub total_points: u32,
    /// Total points divided by training days, rounded
    pub average_points: u32,
    pub success_rate: u32,
}

pub fn period_summary(stats: &[DayStats]) -> PeriodSummary {
    let training_days = stats.iter().filter(|s| s.is_training_day).count();
    let goals_reached = stats
        .iter()
        .filter(|s| s.is_training_day && s.goal_reached)
        .count();
    let total_points = stats
        .iter()
        .map(|s| s.points)
        .fold(0, u32::saturating_add);
    let average_points = if training_days == 0 {
        0
    } else {
        let training = training_days as u64;
        ((u64::from(total_points) * 2 + training) / (training * 2)) as u32
    };

    PeriodSummary {
        days: stats.len(),
        training_days,
        goals_reached,
        total_points,
        average_points,
        success_rate: percent(goals_reached, training_days),
    }
}

/// Units and naive points for one exercise over a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseTotal {
    pub exercise_id: String,
    pub display_name: String,
    pub total_count: u32,
    pub total_points: u32,
}

/// Per-exercise totals over the training days of the last seven days.
///
/// Follows catalog order and omits exercises with nothing logged.
pub fn exercise_totals(
    stats: &[DayStats],
    records: &[DailyRecord],
    catalog: &[ExerciseDefinition],
) -> Vec<ExerciseTotal> {
    let recent = tail(stats, RECENT_WINDOW_DAYS);
    let by_date: HashMap<NaiveDate, &DailyRecord> = records.iter().map(|r| (r.date, r)).collect();

    catalog
        .iter()
        .map(|exercise| {
            let total_count = recent
                .iter()
                .filter(|day| day.is_training_day)
                .filter_map(|day| by_date.get(&day.date))
                .map(|r| r.count_for(&exercise.id))
                .fold(0, u32::saturating_add);
            ExerciseTotal {
                exercise_id: exercise.id.clone(),
                display_name: exercise.display_name.clone(),
                total_count,
                total_points: total_count.saturating_mul(exercise.points_per_unit),
            }
        })
        .filter(|t| t.total_count > 0)
        .collect()
}
