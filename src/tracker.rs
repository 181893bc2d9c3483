//! Workout tracker
//!
//! Stateful front door of the engine. Holds the in-memory state loaded from a
//! [`KeyValueStore`], applies user actions through the scoring, record, series
//! and goal components, and writes every change back through the store.
//!
//! Action flow for adding exercise units:
//! 1. SeriesTracker - advance the series, yielding this action's multiplier
//! 2. score_entry - base points, record bonus, series bonus
//! 3. RecordTracker - store the new maximum when a record fell
//! 4. ExerciseHistory - append the entry
//! 5. DailyRecord - upsert today's counts and naive total

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::goal::{apply_goal_transition, preview_next_goal, GoalAdjustment, GoalPolicy};
use crate::history::ExerciseHistory;
use crate::records::RecordTracker;
use crate::schedule::{is_training_day, last_training_day, next_training_day};
use crate::scoring::{score_entry_with, ScoreOutcome};
use crate::series::{SeriesRules, SeriesSnapshot, SeriesTick, SeriesTracker};
use crate::stats::stats_for_period;
use crate::store::{
    load_json, save_json, KeyValueStore, DAILY_RECORDS_KEY, EXERCISE_RECORDS_KEY, HISTORY_KEY,
    SETTINGS_KEY,
};
use crate::types::{
    default_catalog, find_exercise, naive_points, DailyRecord, DayStats, ExerciseDefinition,
    ExerciseHistoryEntry, ExerciseRecord, UserSettings,
};

/// Result of one add action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub entry: ExerciseHistoryEntry,
    pub score: ScoreOutcome,
    /// Series state after this action
    pub series: SeriesSnapshot,
    /// Today's record after the action, absent while today has no points
    pub daily_record: Option<DailyRecord>,
    /// True when this action moved today's total across the goal
    pub goal_just_reached: bool,
}

/// Next training day and the goal expected for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTraining {
    pub date: NaiveDate,
    pub goal: u32,
}

/// Today at a glance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStatus {
    pub date: NaiveDate,
    pub is_training_day: bool,
    pub goal: u32,
    pub points: u32,
    pub goal_reached: bool,
    pub exercise_counts: BTreeMap<String, u32>,
    pub series: SeriesSnapshot,
}

pub struct WorkoutTracker<S: KeyValueStore> {
    store: S,
    config: TrackerConfig,
    goal_policy: GoalPolicy,
    catalog: Vec<ExerciseDefinition>,
    settings: UserSettings,
    daily_records: Vec<DailyRecord>,
    history: ExerciseHistory,
    records: RecordTracker,
    series: SeriesTracker,
}

impl<S: KeyValueStore> WorkoutTracker<S> {
    /// Load state from `store` with the default configuration.
    ///
    /// `today` anchors default settings on first run.
    pub fn open(store: S, today: NaiveDate) -> Result<Self, TrackerError> {
        Self::with_config(store, TrackerConfig::default(), today)
    }

    /// Load state from `store` with a specific configuration
    pub fn with_config(
        mut store: S,
        config: TrackerConfig,
        today: NaiveDate,
    ) -> Result<Self, TrackerError> {
        config.validate()?;

        let settings = match load_json::<UserSettings, _>(&store, SETTINGS_KEY)? {
            Some(settings) if settings.validate().is_ok() => settings,
            Some(settings) => {
                tracing::warn!(?settings, "stored settings are invalid, using defaults");
                UserSettings::starting(today)
            }
            None => {
                let settings = UserSettings::starting(today);
                save_json(&mut store, SETTINGS_KEY, &settings)?;
                tracing::info!(%today, "first run, default settings stored");
                settings
            }
        };

        let mut daily_records: Vec<DailyRecord> =
            load_json(&store, DAILY_RECORDS_KEY)?.unwrap_or_default();
        normalize_daily_records(&mut daily_records);

        let history = ExerciseHistory::from_entries(
            load_json(&store, HISTORY_KEY)?.unwrap_or_default(),
            config.history_limit,
        );

        let records = RecordTracker::from_records(
            load_json::<Vec<ExerciseRecord>, _>(&store, EXERCISE_RECORDS_KEY)?.unwrap_or_default(),
        );

        tracing::debug!(
            daily_records = daily_records.len(),
            history = history.len(),
            exercise_records = records.records().len(),
            "tracker state loaded"
        );

        Ok(Self {
            store,
            goal_policy: GoalPolicy::from_config(&config),
            series: SeriesTracker::new(SeriesRules::from_config(&config)),
            config,
            catalog: default_catalog(),
            settings,
            daily_records,
            history,
            records,
        })
    }

    /// Replace the exercise catalog
    pub fn with_catalog(mut self, catalog: Vec<ExerciseDefinition>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &[ExerciseDefinition] {
        &self.catalog
    }

    /// Daily records, date ascending
    pub fn daily_records(&self) -> &[DailyRecord] {
        &self.daily_records
    }

    pub fn history(&self) -> &ExerciseHistory {
        &self.history
    }

    pub fn exercise_records(&self) -> &RecordTracker {
        &self.records
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Local calendar date of `now`
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.config.local_date(now)
    }

    pub fn record_for(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.daily_records.iter().find(|r| r.date == date)
    }

    /// Whether adding `count` units now would set a new record
    pub fn would_be_record(&self, exercise_id: &str, count: u32) -> bool {
        self.records.would_be_record(exercise_id, count)
    }

    /// Add `count` units of `exercise_id` at `now`.
    ///
    /// A zero count is ignored and returns `None`. Unknown exercise ids are
    /// logged with zero points.
    pub fn add_exercise(
        &mut self,
        exercise_id: &str,
        count: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<AddOutcome>, TrackerError> {
        if count == 0 {
            return Ok(None);
        }

        let today = self.today(now);
        let (exercise_name, points_per_unit) = match find_exercise(&self.catalog, exercise_id) {
            Some(def) => (def.display_name.clone(), def.points_per_unit),
            None => {
                tracing::warn!(exercise_id, "exercise not in catalog, scoring zero points");
                (exercise_id.to_string(), 0)
            }
        };

        let series = self.series.register_action(now);
        let score = score_entry_with(
            exercise_id,
            count,
            points_per_unit,
            &self.records,
            &series,
            self.config.record_multiplier,
        );

        if score.is_new_record {
            tracing::info!(exercise_id, count, "new exercise record");
            self.records
                .set_record(exercise_id, &exercise_name, count, today, now);
        }

        let entry = ExerciseHistoryEntry {
            id: Uuid::new_v4().to_string(),
            exercise_id: exercise_id.to_string(),
            exercise_name,
            count_added: count,
            points_awarded: score.final_points,
            timestamp: now,
            date: today,
            is_record: score.is_new_record,
            record_multiplier: f64::from(score.record_multiplier),
            series_multiplier: score.series_multiplier_applied,
        };
        if let Some(evicted) = self.history.push(entry.clone()) {
            tracing::debug!(entry_id = %evicted.id, "history limit reached, oldest entry evicted");
        }

        let was_reached = self.record_for(today).map_or(false, |r| r.goal_reached);
        let mut counts = self.counts_for(today);
        let total = counts.entry(exercise_id.to_string()).or_insert(0);
        *total = total.saturating_add(count);
        let daily_record = self.write_day(today, counts);
        let goal_just_reached =
            daily_record.as_ref().map_or(false, |r| r.goal_reached) && !was_reached;

        self.persist_history()?;
        self.persist_exercise_records()?;
        self.persist_daily_records()?;

        tracing::debug!(
            exercise_id,
            count,
            points = score.final_points,
            multiplier = series.multiplier,
            "exercise added"
        );

        Ok(Some(AddOutcome {
            entry,
            score,
            series,
            daily_record,
            goal_just_reached,
        }))
    }

    /// Set today's count for `exercise_id` directly.
    ///
    /// An increase is logged and scored as an add of the difference. A
    /// decrease only rewrites today's record.
    pub fn set_exercise_count(
        &mut self,
        exercise_id: &str,
        count: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<AddOutcome>, TrackerError> {
        let today = self.today(now);
        let previous = self.counts_for(today).get(exercise_id).copied().unwrap_or(0);

        if count > previous {
            return self.add_exercise(exercise_id, count - previous, now);
        }
        if count < previous {
            let mut counts = self.counts_for(today);
            counts.insert(exercise_id.to_string(), count);
            self.write_day(today, counts);
            self.persist_daily_records()?;
        }
        Ok(None)
    }

    /// Delete a history entry dated today.
    ///
    /// Today's count for the exercise drops by the entry's count and the
    /// exercise record is recomputed from what remains in history.
    pub fn remove_history_entry(
        &mut self,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ExerciseHistoryEntry, TrackerError> {
        let today = self.today(now);
        let entry = self
            .history
            .get(entry_id)
            .ok_or_else(|| TrackerError::EntryNotFound(entry_id.to_string()))?;

        if entry.date != today {
            return Err(TrackerError::DeleteNotAllowed(format!(
                "entry {entry_id} is dated {}, only entries from {today} can be removed",
                entry.date
            )));
        }

        let removed = self
            .history
            .remove(entry_id)
            .ok_or_else(|| TrackerError::EntryNotFound(entry_id.to_string()))?;

        let mut counts = self.counts_for(today);
        if let Some(current) = counts.get_mut(&removed.exercise_id) {
            *current = current.saturating_sub(removed.count_added);
        }
        self.write_day(today, counts);

        // history is capped; only an entry at the record count can have set it
        let held_record = self
            .records
            .get_record(&removed.exercise_id)
            .map_or(false, |max| removed.count_added >= max);
        if held_record {
            self.records.recalculate(
                &removed.exercise_id,
                &removed.exercise_name,
                self.history.entries(),
            );
        }

        self.persist_history()?;
        self.persist_exercise_records()?;
        self.persist_daily_records()?;

        tracing::info!(
            entry_id,
            exercise_id = %removed.exercise_id,
            count = removed.count_added,
            "history entry removed"
        );
        Ok(removed)
    }

    /// Replace the settings after validating them
    pub fn update_settings(&mut self, settings: UserSettings) -> Result<(), TrackerError> {
        settings.validate()?;
        save_json(&mut self.store, SETTINGS_KEY, &settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Apply the goal adjustment for the latest day transition, at most once
    pub fn check_goal_adjustment(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<GoalAdjustment>, TrackerError> {
        let today = self.today(now);
        apply_goal_transition(
            &mut self.store,
            &self.goal_policy,
            &mut self.settings,
            &self.daily_records,
            today,
        )
    }

    /// Per-day statistics for the `days` dates ending today.
    ///
    /// Windows longer than `max_stats_days` are cut to that length.
    pub fn stats(&self, days: usize, now: DateTime<Utc>) -> Vec<DayStats> {
        let max_days = self.config.max_stats_days;
        if days > max_days {
            tracing::debug!(days, max_days, "stats window capped");
        }
        stats_for_period(
            &self.daily_records,
            &self.settings,
            days.min(max_days),
            self.today(now),
        )
    }

    /// Goal result of the most recent training day before today
    pub fn last_training_result(&self, now: DateTime<Utc>) -> Option<bool> {
        let today = self.today(now);
        let date = last_training_day(&self.daily_records, &self.settings, today)?;
        self.record_for(date).map(|r| r.goal_reached)
    }

    /// Next training day after today and its expected goal
    pub fn next_training(&self, now: DateTime<Utc>) -> NextTraining {
        let today = self.today(now);
        let today_is_training = is_training_day(today, &self.settings);
        let today_reached = self.record_for(today).map_or(false, |r| r.goal_reached);

        NextTraining {
            date: next_training_day(today, &self.settings),
            goal: preview_next_goal(
                &self.goal_policy,
                &self.settings,
                today_is_training,
                today_reached,
                self.last_training_result(now),
            ),
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> TodayStatus {
        let today = self.today(now);
        let record = self.record_for(today);
        TodayStatus {
            date: today,
            is_training_day: is_training_day(today, &self.settings),
            goal: self.settings.current_goal,
            points: record.map_or(0, |r| r.total_points),
            goal_reached: record.map_or(false, |r| r.goal_reached),
            exercise_counts: record.map(|r| r.exercise_counts.clone()).unwrap_or_default(),
            series: self.series.snapshot(now),
        }
    }

    pub fn series_snapshot(&self, now: DateTime<Utc>) -> SeriesSnapshot {
        self.series.snapshot(now)
    }

    /// Observe the series clock; reports expiry once
    pub fn poll_series(&mut self, now: DateTime<Utc>) -> SeriesTick {
        self.series.poll(now)
    }

    /// End the running series immediately
    pub fn end_series(&mut self) -> bool {
        self.series.end()
    }

    fn counts_for(&self, date: NaiveDate) -> BTreeMap<String, u32> {
        self.record_for(date)
            .map(|r| r.exercise_counts.clone())
            .unwrap_or_default()
    }

    /// Upsert the record for `date`, or drop it when the counts earn no points
    fn write_day(
        &mut self,
        date: NaiveDate,
        mut counts: BTreeMap<String, u32>,
    ) -> Option<DailyRecord> {
        counts.retain(|_, count| *count > 0);

        if naive_points(&counts, &self.catalog) == 0 {
            self.daily_records.retain(|r| r.date != date);
            return None;
        }

        let record =
            DailyRecord::from_counts(date, counts, &self.catalog, self.settings.current_goal);
        upsert_daily_record(&mut self.daily_records, record.clone());
        Some(record)
    }

    fn persist_history(&mut self) -> Result<(), TrackerError> {
        save_json(&mut self.store, HISTORY_KEY, self.history.entries())
    }

    fn persist_exercise_records(&mut self) -> Result<(), TrackerError> {
        save_json(&mut self.store, EXERCISE_RECORDS_KEY, &self.records)
    }

    fn persist_daily_records(&mut self) -> Result<(), TrackerError> {
        save_json(&mut self.store, DAILY_RECORDS_KEY, &self.daily_records)
    }
}

/// Replace the record with the same date (or insert), keeping date order
pub fn upsert_daily_record(records: &mut Vec<DailyRecord>, record: DailyRecord) {
    records.retain(|r| r.date != record.date);
    records.push(record);
    records.sort_by_key(|r| r.date);
}

/// Sort by date and keep the last stored record for any duplicated date
fn normalize_daily_records(records: &mut Vec<DailyRecord>) {
    let mut by_date: BTreeMap<NaiveDate, DailyRecord> = BTreeMap::new();
    for record in records.drain(..) {
        by_date.insert(record.date, record);
    }
    records.extend(by_date.into_values());
}
