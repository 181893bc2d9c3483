//! FFI bindings for Streakfit
//!
//! C-compatible functions for driving a tracker from a host UI. The tracker
//! runs over an in-memory store; the host persists the JSON returned by
//! `streakfit_tracker_export` and passes it back to `streakfit_tracker_new`.
//! Instants are Unix epoch milliseconds.
//!
//! Returned strings are allocated here and must be freed with
//! `streakfit_free_string`.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::TrackerConfig;
use crate::store::MemoryStore;
use crate::types::UserSettings;
use crate::tracker::WorkoutTracker;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn json_to_cstr<T: Serialize + ?Sized>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

fn instant_from_millis(now_ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(now_ms).single()
}

/// Opaque tracker handle
pub struct TrackerHandle {
    tracker: WorkoutTracker<MemoryStore>,
}

/// Borrow the tracker behind `handle`, recording an error for NULL
unsafe fn tracker_mut<'a>(
    handle: *mut TrackerHandle,
) -> Option<&'a mut WorkoutTracker<MemoryStore>> {
    if handle.is_null() {
        set_last_error("Null tracker pointer");
        return None;
    }
    Some(&mut (*handle).tracker)
}

fn parse_instant(now_ms: i64) -> Option<DateTime<Utc>> {
    let now = instant_from_millis(now_ms);
    if now.is_none() {
        set_last_error("Timestamp out of range");
    }
    now
}

// ============================================================================
// Tracker lifecycle
// ============================================================================

/// Parse an optional JSON argument, `None` for NULL
unsafe fn parse_json_arg<T: serde::de::DeserializeOwned>(
    ptr: *const c_char,
    what: &str,
) -> Result<Option<T>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    let Some(json) = cstr_to_string(ptr) else {
        set_last_error(&format!("Invalid {what} string pointer"));
        return Err(());
    };
    serde_json::from_str(&json).map(Some).map_err(|e| {
        set_last_error(&format!("Invalid {what}: {e}"));
    })
}

fn open_tracker(
    store: MemoryStore,
    config: TrackerConfig,
    now: DateTime<Utc>,
) -> *mut TrackerHandle {
    let today = config.local_date(now);
    match WorkoutTracker::with_config(store, config, today) {
        Ok(tracker) => Box::into_raw(Box::new(TrackerHandle { tracker })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Create a tracker from an exported state snapshot.
///
/// # Safety
/// - `state_json` must be NULL (fresh state) or a valid null-terminated C string
///   holding JSON previously returned by `streakfit_tracker_export`.
/// - Returns a pointer that must be freed with `streakfit_tracker_free`.
/// - Returns NULL on error; call `streakfit_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_new(
    state_json: *const c_char,
    now_ms: i64,
) -> *mut TrackerHandle {
    streakfit_tracker_new_with_config(state_json, ptr::null(), now_ms)
}

/// Create a tracker with an engine configuration.
///
/// # Safety
/// - `state_json` follows `streakfit_tracker_new`.
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string
///   holding a JSON `TrackerConfig`; missing fields take their defaults.
/// - Returns a pointer that must be freed with `streakfit_tracker_free`.
/// - Returns NULL on error; call `streakfit_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_new_with_config(
    state_json: *const c_char,
    config_json: *const c_char,
    now_ms: i64,
) -> *mut TrackerHandle {
    clear_last_error();

    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };
    let Ok(store) = parse_json_arg::<MemoryStore>(state_json, "state") else {
        return ptr::null_mut();
    };
    let Ok(config) = parse_json_arg::<TrackerConfig>(config_json, "config") else {
        return ptr::null_mut();
    };

    open_tracker(
        store.unwrap_or_default(),
        config.unwrap_or_default(),
        now,
    )
}

/// Free a tracker.
///
/// # Safety
/// - `handle` must be NULL or a pointer returned by `streakfit_tracker_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_free(handle: *mut TrackerHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Export the tracker's persisted state as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_export(handle: *mut TrackerHandle) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };

    match tracker.store().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Add exercise units. Returns the add outcome as JSON, or `null` JSON when the
/// count is zero.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - `exercise_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
/// - Returns NULL on error; call `streakfit_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_add_exercise(
    handle: *mut TrackerHandle,
    exercise_id: *const c_char,
    count: u32,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(exercise_id) = cstr_to_string(exercise_id) else {
        set_last_error("Invalid exercise id pointer");
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    match tracker.add_exercise(&exercise_id, count, now) {
        Ok(outcome) => json_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Remove a history entry dated today. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - `entry_id` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_remove_entry(
    handle: *mut TrackerHandle,
    entry_id: *const c_char,
    now_ms: i64,
) -> i32 {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return -1;
    };
    let Some(entry_id) = cstr_to_string(entry_id) else {
        set_last_error("Invalid entry id pointer");
        return -1;
    };
    let Some(now) = parse_instant(now_ms) else {
        return -1;
    };

    match tracker.remove_history_entry(&entry_id, now) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Apply the pending goal adjustment. Returns the adjustment as JSON, or
/// `null` JSON when nothing changed.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_check_goal(
    handle: *mut TrackerHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    match tracker.check_goal_adjustment(now) {
        Ok(adjustment) => json_to_cstr(&adjustment),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Set today's count for an exercise. Returns the add outcome as JSON when
/// the count went up, `null` JSON otherwise.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - `exercise_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
/// - Returns NULL on error; call `streakfit_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_set_exercise_count(
    handle: *mut TrackerHandle,
    exercise_id: *const c_char,
    count: u32,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(exercise_id) = cstr_to_string(exercise_id) else {
        set_last_error("Invalid exercise id pointer");
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    match tracker.set_exercise_count(&exercise_id, count, now) {
        Ok(outcome) => json_to_cstr(&outcome),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Replace the user settings. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - `settings_json` must be a valid null-terminated C string holding JSON
///   `UserSettings`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_update_settings(
    handle: *mut TrackerHandle,
    settings_json: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return -1;
    };
    let settings = match parse_json_arg::<UserSettings>(settings_json, "settings") {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            set_last_error("Null settings pointer");
            return -1;
        }
        Err(()) => return -1,
    };

    match tracker.update_settings(settings) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Views
// ============================================================================

/// Per-day statistics for the `days` dates ending today, as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_stats(
    handle: *mut TrackerHandle,
    days: i32,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    let days = usize::try_from(days).unwrap_or(0);
    json_to_cstr(&tracker.stats(days, now))
}

/// Today's progress as JSON `TodayStatus`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_status(
    handle: *mut TrackerHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    json_to_cstr(&tracker.status(now))
}

/// Next training day and its expected goal as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_next_training(
    handle: *mut TrackerHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    json_to_cstr(&tracker.next_training(now))
}

/// Observe the series clock. Returns a JSON `SeriesTick`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
/// - Returns a newly allocated string that must be freed with `streakfit_free_string`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_poll_series(
    handle: *mut TrackerHandle,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();
    let Some(tracker) = tracker_mut(handle) else {
        return ptr::null_mut();
    };
    let Some(now) = parse_instant(now_ms) else {
        return ptr::null_mut();
    };

    json_to_cstr(&tracker.poll_series(now))
}

/// End the running series. Returns 1 if one was running, 0 if not, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `streakfit_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn streakfit_tracker_end_series(handle: *mut TrackerHandle) -> i32 {
    clear_last_error();
    match tracker_mut(handle) {
        Some(tracker) => i32::from(tracker.end_series()),
        None => -1,
    }
}

/// Free a string returned by Streakfit functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Streakfit function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn streakfit_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Streakfit call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn streakfit_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn streakfit_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-15T09:00:00Z
    const T0_MS: i64 = 1_705_309_200_000;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        streakfit_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_tracker_lifecycle() {
        unsafe {
            let tracker = streakfit_tracker_new(ptr::null(), T0_MS);
            assert!(!tracker.is_null());

            let exercise = CString::new("pullups").unwrap();
            let outcome = take_string(streakfit_tracker_add_exercise(
                tracker,
                exercise.as_ptr(),
                5,
                T0_MS,
            ));
            let outcome: serde_json::Value = serde_json::from_str(&outcome).unwrap();
            assert_eq!(outcome["entry"]["points_awarded"], 30);
            assert_eq!(outcome["score"]["is_new_record"], true);

            let stats = take_string(streakfit_tracker_stats(tracker, 7, T0_MS));
            let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
            assert_eq!(stats.as_array().unwrap().len(), 7);
            assert_eq!(stats[6]["points"], 15);

            let tick = take_string(streakfit_tracker_poll_series(tracker, T0_MS + 10_000));
            assert!(tick.contains("running"));
            assert_eq!(streakfit_tracker_end_series(tracker), 1);
            assert_eq!(streakfit_tracker_end_series(tracker), 0);

            // export and restore
            let state = CString::new(take_string(streakfit_tracker_export(tracker))).unwrap();
            let restored = streakfit_tracker_new(state.as_ptr(), T0_MS);
            assert!(!restored.is_null());
            let stats = take_string(streakfit_tracker_stats(restored, 1, T0_MS));
            assert!(stats.contains("\"points\":15"));

            streakfit_tracker_free(tracker);
            streakfit_tracker_free(restored);
        }
    }

    #[test]
    fn test_ffi_remove_entry_errors() {
        unsafe {
            let tracker = streakfit_tracker_new(ptr::null(), T0_MS);
            let missing = CString::new("nope").unwrap();

            assert_eq!(
                streakfit_tracker_remove_entry(tracker, missing.as_ptr(), T0_MS),
                -1
            );
            let error = CStr::from_ptr(streakfit_last_error()).to_str().unwrap();
            assert!(error.contains("nope"));

            streakfit_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_invalid_state() {
        unsafe {
            let state = CString::new("not json").unwrap();
            let tracker = streakfit_tracker_new(state.as_ptr(), T0_MS);
            assert!(tracker.is_null());
            assert!(!streakfit_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_null_handle() {
        unsafe {
            assert!(streakfit_tracker_stats(ptr::null_mut(), 7, T0_MS).is_null());
            assert_eq!(streakfit_tracker_end_series(ptr::null_mut()), -1);
            let error = CStr::from_ptr(streakfit_last_error()).to_str().unwrap();
            assert_eq!(error, "Null tracker pointer");
        }
    }

    #[test]
    fn test_ffi_settings_and_views() {
        unsafe {
            let tracker = streakfit_tracker_new(ptr::null(), T0_MS);

            let settings =
                CString::new(r#"{"training_frequency":1,"current_goal":60,"start_date":"2024-01-01"}"#)
                    .unwrap();
            assert_eq!(streakfit_tracker_update_settings(tracker, settings.as_ptr()), 0);

            let bad = CString::new(
                r#"{"training_frequency":0,"current_goal":60,"start_date":"2024-01-01"}"#,
            )
            .unwrap();
            assert_eq!(streakfit_tracker_update_settings(tracker, bad.as_ptr()), -1);
            assert!(!streakfit_last_error().is_null());
            assert_eq!(streakfit_tracker_update_settings(tracker, ptr::null()), -1);

            let exercise = CString::new("dips").unwrap();
            let outcome = take_string(streakfit_tracker_set_exercise_count(
                tracker,
                exercise.as_ptr(),
                30,
                T0_MS,
            ));
            let outcome: serde_json::Value = serde_json::from_str(&outcome).unwrap();
            assert_eq!(outcome["entry"]["count_added"], 30);

            let lowered = take_string(streakfit_tracker_set_exercise_count(
                tracker,
                exercise.as_ptr(),
                20,
                T0_MS + 1_000,
            ));
            assert_eq!(lowered, "null");

            let status = take_string(streakfit_tracker_status(tracker, T0_MS + 2_000));
            let status: serde_json::Value = serde_json::from_str(&status).unwrap();
            assert_eq!(status["date"], "2024-01-15");
            assert_eq!(status["goal"], 60);
            assert_eq!(status["points"], 40);
            assert_eq!(status["goal_reached"], false);

            // every day trains; today missed so far, so the goal holds
            let next = take_string(streakfit_tracker_next_training(tracker, T0_MS + 2_000));
            let next: serde_json::Value = serde_json::from_str(&next).unwrap();
            assert_eq!(next["date"], "2024-01-16");
            assert_eq!(next["goal"], 60);

            streakfit_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_config_sets_local_date() {
        unsafe {
            // 2024-01-15T23:00:00Z is Jan 16 at UTC+2
            let late = T0_MS + 14 * 3_600_000;
            let config = CString::new(r#"{"utc_offset_minutes":120}"#).unwrap();
            let tracker = streakfit_tracker_new_with_config(ptr::null(), config.as_ptr(), late);
            assert!(!tracker.is_null());

            let state = take_string(streakfit_tracker_export(tracker));
            assert!(state.contains(r#"\"start_date\":\"2024-01-16\""#));
            let status = take_string(streakfit_tracker_status(tracker, late));
            assert!(status.contains(r#""date":"2024-01-16""#));

            streakfit_tracker_free(tracker);

            let bad = CString::new(r#"{"history_limit":0}"#).unwrap();
            assert!(streakfit_tracker_new_with_config(ptr::null(), bad.as_ptr(), late).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = streakfit_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
