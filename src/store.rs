//! Persistence boundary
//!
//! The engine keeps its state in an external key-value store holding JSON
//! strings. This module defines the store contract, the keys the engine uses,
//! typed JSON helpers, and two implementations: an in-memory map (tests, FFI
//! hosts that persist the exported snapshot themselves) and a directory of JSON
//! files (CLI).

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TrackerError;

/// Key of the settings singleton
pub const SETTINGS_KEY: &str = "workout_settings";

/// Key of the daily records list
pub const DAILY_RECORDS_KEY: &str = "workout_records";

/// Key of the exercise history list
pub const HISTORY_KEY: &str = "exercise_history";

/// Key of the per-exercise records list
pub const EXERCISE_RECORDS_KEY: &str = "exercise_records";

/// Prefix of the goal adjustment idempotency flags
pub const GOAL_ADJUSTED_PREFIX: &str = "goal_adjusted_";

/// Idempotency flag key for the transition out of `training_date`
pub fn goal_adjusted_key(training_date: NaiveDate) -> String {
    format!("{GOAL_ADJUSTED_PREFIX}{}", training_date.format("%Y-%m-%d"))
}

/// Key-value store holding JSON-serialized values
pub trait KeyValueStore {
    /// Load the raw value stored under `key`, `None` when absent
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError>;

    /// Store `value` under `key`, replacing any previous value
    fn save(&mut self, key: &str, value: &str) -> Result<(), TrackerError>;
}

/// Load and deserialize the value under `key`.
///
/// A value that fails to parse is treated as absent so a corrupted entry
/// degrades to the default state instead of blocking the engine.
pub fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, TrackerError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.load(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding unreadable stored value");
            Ok(None)
        }
    }
}

/// Serialize `value` and store it under `key`
pub fn save_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), TrackerError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_string(value)?;
    store.save(key, &json)
}

/// In-memory store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from its JSON snapshot
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Snapshot the whole store as JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), TrackerError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, TrackerError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TrackerError::Storage(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), TrackerError> {
        let path = self.path_for(key)?;
        // replace atomically
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        value: u32,
    }

    #[test]
    fn test_goal_adjusted_key_format() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(goal_adjusted_key(d), "goal_adjusted_2024-03-05");
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert!(load_json::<Sample, _>(&store, "sample").unwrap().is_none());

        let sample = Sample {
            name: "x".to_string(),
            value: 7,
        };
        save_json(&mut store, "sample", &sample).unwrap();
        assert_eq!(load_json::<Sample, _>(&store, "sample").unwrap(), Some(sample));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_corrupted_value_degrades_to_absent() {
        let mut store = MemoryStore::new();
        store.save("sample", "{not json").unwrap();
        assert!(load_json::<Sample, _>(&store, "sample").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_snapshot() {
        let mut store = MemoryStore::new();
        store.save("a", "1").unwrap();
        store.save("b", "[2]").unwrap();

        let restored = MemoryStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_file_store_missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.load(SETTINGS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_file_store_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.save(HISTORY_KEY, "[]").unwrap();
            store.save(HISTORY_KEY, "[1]").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.load(HISTORY_KEY).unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.save("../escape", "1"),
            Err(TrackerError::Storage(_))
        ));
    }
}
