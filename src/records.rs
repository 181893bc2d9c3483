//! Per-exercise records
//!
//! Tracks the best single-action count ever logged for each exercise. Records
//! are compared against the count added by one action, never the daily sum.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExerciseHistoryEntry, ExerciseRecord};

/// At most one record per exercise id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTracker {
    records: Vec<ExerciseRecord>,
}

impl RecordTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored list, keeping the highest entry per exercise
    pub fn from_records(records: Vec<ExerciseRecord>) -> Self {
        let mut tracker = Self::new();
        for record in records {
            if tracker
                .get_record(&record.exercise_id)
                .map_or(true, |max| record.max_count > max)
            {
                tracker.put(record);
            }
        }
        tracker
    }

    /// Best single-action count for `exercise_id`
    pub fn get_record(&self, exercise_id: &str) -> Option<u32> {
        self.get(exercise_id).map(|r| r.max_count)
    }

    pub fn get(&self, exercise_id: &str) -> Option<&ExerciseRecord> {
        self.records.iter().find(|r| r.exercise_id == exercise_id)
    }

    pub fn records(&self) -> &[ExerciseRecord] {
        &self.records
    }

    /// Whether adding `count` in one action would set a new record
    pub fn would_be_record(&self, exercise_id: &str, count: u32) -> bool {
        if count == 0 {
            return false;
        }
        match self.get_record(exercise_id) {
            None => true,
            Some(max) => count > max,
        }
    }

    /// Replace the record for `exercise_id` unconditionally.
    ///
    /// Callers only invoke this once a new maximum is confirmed.
    pub fn set_record(
        &mut self,
        exercise_id: &str,
        exercise_name: &str,
        count: u32,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) {
        self.put(ExerciseRecord {
            exercise_id: exercise_id.to_string(),
            exercise_name: exercise_name.to_string(),
            max_count: count,
            date,
            timestamp,
        });
    }

    /// Recompute the record for `exercise_id` from the remaining history.
    ///
    /// The record is removed when no entry for the exercise remains. Among
    /// entries with the same maximum the earliest one holds the record.
    pub fn recalculate(
        &mut self,
        exercise_id: &str,
        exercise_name: &str,
        history: &[ExerciseHistoryEntry],
    ) {
        let best = history
            .iter()
            .filter(|e| e.exercise_id == exercise_id && e.count_added > 0)
            .fold(None::<&ExerciseHistoryEntry>, |best, e| match best {
                Some(b)
                    if b.count_added > e.count_added
                        || (b.count_added == e.count_added && b.timestamp <= e.timestamp) =>
                {
                    Some(b)
                }
                _ => Some(e),
            });

        match best {
            Some(entry) => {
                self.set_record(
                    exercise_id,
                    exercise_name,
                    entry.count_added,
                    entry.date,
                    entry.timestamp,
                );
            }
            None => self.remove(exercise_id),
        }
    }

    pub fn remove(&mut self, exercise_id: &str) {
        self.records.retain(|r| r.exercise_id != exercise_id);
    }

    fn put(&mut self, record: ExerciseRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.exercise_id == record.exercise_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}
