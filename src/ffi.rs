//! FFI bindings for adaptive TDEE
//!
//! This module provides C-compatible functions for calling the engine from other languages.
//! Records cross the boundary as JSON in null-terminated C strings. Returned strings are
//! allocated by Rust and must be freed by the caller using `tdee_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::ComputeError;
use crate::pipeline::{adapt_goal, compute_quality, run_full_update, seed_estimate};
use crate::types::{AdaptationReport, UserProfile, UserRecord};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

/// Parse a user record argument, apply `op`, and hand back its JSON output.
unsafe fn with_record_json<F>(record_json: *const c_char, op: F) -> *mut c_char
where
    F: FnOnce(UserRecord) -> Result<String, ComputeError>,
{
    clear_last_error();

    let json_str = match cstr_to_string(record_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid record JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = UserRecord::from_json(&json_str)
        .map_err(ComputeError::from)
        .and_then(op);

    match result {
        Ok(output) => string_to_cstr(&output),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Record API
// ============================================================================

/// Formula-based TDEE for a profile at the given weight.
///
/// # Safety
/// - `profile_json` must be a valid null-terminated C string holding a user profile.
/// - Returns NaN on error; call `tdee_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tdee_seed_estimate(profile_json: *const c_char, weight_kg: f64) -> f64 {
    clear_last_error();

    let json_str = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile JSON string pointer");
            return f64::NAN;
        }
    };

    match serde_json::from_str::<UserProfile>(&json_str) {
        Ok(profile) => seed_estimate(&profile, weight_kg),
        Err(e) => {
            set_last_error(&ComputeError::from(e).to_string());
            f64::NAN
        }
    }
}

/// Re-run the filter over a user record's full log history.
///
/// # Safety
/// - `record_json` must be a valid null-terminated C string.
/// - Returns the updated record as a newly allocated string that must be freed with
///   `tdee_free_string`.
/// - Returns NULL on error; call `tdee_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tdee_run_full_update(record_json: *const c_char) -> *mut c_char {
    with_record_json(record_json, |record| {
        Ok(run_full_update(record).to_json()?)
    })
}

/// Data quality metrics for a user record.
///
/// # Safety
/// - `record_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `tdee_free_string`.
/// - Returns NULL on error; call `tdee_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tdee_compute_quality(record_json: *const c_char) -> *mut c_char {
    with_record_json(record_json, |record| {
        Ok(serde_json::to_string(&compute_quality(&record))?)
    })
}

/// Run one goal controller pass.
///
/// The result is an object carrying the (possibly updated) record under `user`
/// alongside `goal_changed`, `old_goal`, `new_goal`, `explanation`, `confidence`
/// and `macro_targets`.
///
/// # Safety
/// - `record_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `tdee_free_string`.
/// - Returns NULL on error; call `tdee_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tdee_adapt_goal(record_json: *const c_char) -> *mut c_char {
    with_record_json(record_json, |mut record| {
        let outcome = adapt_goal(&mut record);
        let report = AdaptationReport {
            user: record,
            outcome,
        };
        Ok(serde_json::to_string(&report)?)
    })
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by tdee functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a tdee function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tdee_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next tdee function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn tdee_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn tdee_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataQualityMetrics;
    use std::ffi::CString;

    fn sample_profile_json() -> CString {
        CString::new(
            r#"{
                "age": 30,
                "gender": "male",
                "height_cm": 180.0,
                "activity_level": 1.55,
                "goal_kg_per_week": -0.5,
                "goal_weight_kg": 75.0
            }"#,
        )
        .unwrap()
    }

    fn sample_record_json(log_count: usize) -> CString {
        let logs: Vec<String> = (0..log_count)
            .map(|i| {
                format!(
                    r#"{{"date": "2024-01-{:02}", "weight_kg": 80.0, "calories_in": 2000}}"#,
                    i + 1
                )
            })
            .collect();
        CString::new(format!(
            r#"{{
                "user_id": "ffi-user",
                "name": "FFI",
                "profile": {{
                    "age": 30,
                    "gender": "male",
                    "height_cm": 180.0,
                    "activity_level": 1.55,
                    "goal_kg_per_week": -0.5,
                    "goal_weight_kg": 75.0
                }},
                "initial_calorie_goal": 2209,
                "calorie_goal": 2209,
                "macro_targets": {{"protein_g": 190.0, "carbs_g": 215.0, "fat_g": 62.0}},
                "filter": {{
                    "tdee_estimate": 2759.0,
                    "tdee_uncertainty": 50000.0,
                    "adaptation_confidence": 0.0
                }},
                "logs": [{}]
            }}"#,
            logs.join(",")
        ))
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        tdee_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_seed_estimate() {
        let profile = sample_profile_json();
        unsafe {
            let tdee = tdee_seed_estimate(profile.as_ptr(), 80.0);
            assert!((tdee - 2759.0).abs() < 1e-9);
            assert!(tdee_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_run_full_update() {
        let record = sample_record_json(7);
        unsafe {
            let output = take_string(tdee_run_full_update(record.as_ptr()));
            let updated = UserRecord::from_json(&output).unwrap();
            assert!(updated.filter.has_been_seeded);
            assert!(updated.filter.adaptation_confidence > 0.0);
        }
    }

    #[test]
    fn test_ffi_compute_quality() {
        let record = sample_record_json(4);
        unsafe {
            let output = take_string(tdee_compute_quality(record.as_ptr()));
            let metrics: DataQualityMetrics = serde_json::from_str(&output).unwrap();
            assert_eq!(metrics.total_days_logged, 4);
            assert_eq!(metrics.consecutive_days, 4);
        }
    }

    #[test]
    fn test_ffi_adapt_goal_reports_gate() {
        let record = sample_record_json(3);
        unsafe {
            let output = take_string(tdee_adapt_goal(record.as_ptr()));
            let report: AdaptationReport = serde_json::from_str(&output).unwrap();
            assert!(!report.outcome.goal_changed);
            assert_eq!(report.outcome.new_goal, 2209);
            assert!(report.outcome.explanation.starts_with("Insufficient data"));
            assert_eq!(report.user.calorie_goal, 2209);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = tdee_run_full_update(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = tdee_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.starts_with("Invalid JSON"));

            let tdee = tdee_seed_estimate(ptr::null(), 80.0);
            assert!(tdee.is_nan());
            assert!(!tdee_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = tdee_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::ENGINE_VERSION);
        }
    }
}
