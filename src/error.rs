//! Error types for Streakfit

use thiserror::Error;

/// Errors surfaced by the tracker and its storage boundary.
///
/// Scoring, scheduling and statistics never fail; invalid input there degrades
/// to a zero or default value. Only storage problems and explicit caller
/// mistakes end up here.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History entry not found: {0}")]
    EntryNotFound(String),

    #[error("Deletion not allowed: {0}")]
    DeleteNotAllowed(String),

    #[error("Date parse error: {0}")]
    DateParse(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
