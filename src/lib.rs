//! Streakfit - Goal-adapting workout scoring engine
//!
//! Streakfit tracks daily workout points against a goal that adapts after each
//! training day, scores exercise actions with record and timed-series bonuses,
//! and derives rolling statistics from a sparse log of daily records.
//!
//! ## Modules
//!
//! - **Engine**: schedule, goal adaptation, scoring, records, series, stats
//! - **State**: history log, daily records, and the key-value store boundary
//! - **Tracker**: the stateful front door applying user actions over a store

pub mod config;
pub mod error;
pub mod goal;
pub mod history;
pub mod records;
pub mod schedule;
pub mod scoring;
pub mod series;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use goal::{calculate_new_goal, GoalAdjustment, GoalPolicy};
pub use history::ExerciseHistory;
pub use records::RecordTracker;
pub use schedule::{is_training_day, next_training_day};
pub use scoring::{score_entry, ScoreOutcome};
pub use series::{series_multiplier, SeriesSnapshot, SeriesTick, SeriesTracker};
pub use stats::stats_for_period;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::{AddOutcome, WorkoutTracker};
pub use types::{
    DailyRecord, DayStats, ExerciseDefinition, ExerciseHistoryEntry, ExerciseRecord, UserSettings,
};

/// Streakfit version
pub const STREAKFIT_VERSION: &str = env!("CARGO_PKG_VERSION");
