//! Exercise history
//!
//! Append-only log of exercise actions, newest first, bounded to a fixed
//! number of entries. Inserting past the limit evicts the oldest entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::types::ExerciseHistoryEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistory {
    entries: Vec<ExerciseHistoryEntry>,
    limit: usize,
}

impl Default for ExerciseHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ExerciseHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Wrap a stored list (newest first), trimming it to `limit`
    pub fn from_entries(mut entries: Vec<ExerciseHistoryEntry>, limit: usize) -> Self {
        let limit = limit.max(1);
        entries.truncate(limit);
        Self { entries, limit }
    }

    /// Insert at the head. Returns the evicted entry, if any.
    pub fn push(&mut self, entry: ExerciseHistoryEntry) -> Option<ExerciseHistoryEntry> {
        self.entries.insert(0, entry);
        if self.entries.len() > self.limit {
            self.entries.pop()
        } else {
            None
        }
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<ExerciseHistoryEntry> {
        let index = self.entries.iter().position(|e| e.id == entry_id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, entry_id: &str) -> Option<&ExerciseHistoryEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// All entries, newest first
    pub fn entries(&self) -> &[ExerciseHistoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ExerciseHistoryEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> Vec<&ExerciseHistoryEntry> {
        self.entries.iter().filter(|e| e.date == date).collect()
    }

    /// Multiplier-boosted points logged on `date`
    pub fn points_for_date(&self, date: NaiveDate) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.date == date)
            .map(|e| e.points_awarded)
            .fold(0, u32::saturating_add)
    }

    /// Entries grouped by date, newest date first
    pub fn grouped_by_date(&self) -> Vec<(NaiveDate, Vec<&ExerciseHistoryEntry>)> {
        let mut dates: Vec<NaiveDate> = self.entries.iter().map(|e| e.date).collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();

        dates
            .into_iter()
            .map(|d| (d, self.entries_for_date(d)))
            .collect()
    }
}
