//! Training schedule
//!
//! A date is a training day when its distance in days from the settings'
//! start date is a multiple of the training frequency. Floor modulo is used so
//! dates before the start date keep the same cadence.

use chrono::{Days, NaiveDate};

use crate::types::{DailyRecord, UserSettings};

/// Whether `date` is a training day under `settings`.
///
/// A frequency of zero is treated as one (every day).
pub fn is_training_day(date: NaiveDate, settings: &UserSettings) -> bool {
    let frequency = i64::from(settings.training_frequency.max(1));
    let days_since_start = (date - settings.start_date).num_days();
    days_since_start.rem_euclid(frequency) == 0
}

/// First training day strictly after `date`
pub fn next_training_day(date: NaiveDate, settings: &UserSettings) -> NaiveDate {
    let mut next = date;
    loop {
        next = match next.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => return next,
        };
        if is_training_day(next, settings) {
            return next;
        }
    }
}

/// Most recent recorded training day other than `today`.
///
/// Only dates that have a daily record are considered; rest days and days
/// without any activity are skipped.
pub fn last_training_day(
    records: &[DailyRecord],
    settings: &UserSettings,
    today: NaiveDate,
) -> Option<NaiveDate> {
    records
        .iter()
        .map(|r| r.date)
        .filter(|&d| d != today && is_training_day(d, settings))
        .max()
}
