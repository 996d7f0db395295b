//! FFI bindings for the touch analyzer
//!
//! This module provides C-compatible functions for calling the analyzer from a
//! presentation layer written in another language. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `touch_free_string`.
//!
//! Results are JSON: the serialized pipeline outcome, tagged by `state`
//! (`ready`, `no_matches`, `no_data`, `unreadable`).

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

use crate::config::Config;
use crate::filter::FilterSpec;
use crate::pipeline::{analyze_files, AnalysisSession};
use crate::types::TimeRange;

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

/// Parse a JSON array of file paths
fn parse_paths(json: &str) -> Result<Vec<PathBuf>, String> {
    serde_json::from_str::<Vec<PathBuf>>(json).map_err(|e| format!("Invalid paths JSON: {e}"))
}

/// Build a filter; a null keyword pointer means no keywords
unsafe fn filter_spec(start_ms: i64, end_ms: i64, keywords: *const c_char) -> Result<FilterSpec, String> {
    let keywords = if keywords.is_null() {
        String::new()
    } else {
        cstr_to_string(keywords).ok_or_else(|| "Invalid keywords string".to_string())?
    };
    Ok(FilterSpec::from_keyword_text(TimeRange::new(start_ms, end_ms), &keywords))
}

fn to_json<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Load the files in `paths_json` (a JSON array of paths), filter and aggregate.
///
/// Pass `i64::MIN` / `i64::MAX` as the time bounds for an unbounded range.
///
/// # Safety
/// - `paths_json` must be a valid null-terminated C string.
/// - `keywords` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `touch_free_string`.
/// - Returns NULL on error; call `touch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn touch_analyze(
    paths_json: *const c_char,
    start_ms: i64,
    end_ms: i64,
    keywords: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let paths = match cstr_to_string(paths_json) {
        Some(s) => match parse_paths(&s) {
            Ok(paths) => paths,
            Err(e) => {
                set_last_error(&e);
                return ptr::null_mut();
            }
        },
        None => {
            set_last_error("Invalid paths string pointer");
            return ptr::null_mut();
        }
    };

    let spec = match filter_spec(start_ms, end_ms, keywords) {
        Ok(spec) => spec,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    let outcome = analyze_files(&paths, &spec, &Config::default());
    to_json(&outcome)
}

// ============================================================================
// Stateful Session API
// ============================================================================

/// Opaque handle to an AnalysisSession
pub struct TouchSessionHandle {
    session: AnalysisSession,
}

/// Create a new analysis session.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL (defaults).
/// - Must be freed with `touch_session_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn touch_session_new(config_json: *const c_char) -> *mut TouchSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Config::default()
    } else {
        let parsed = cstr_to_string(config_json)
            .ok_or_else(|| "Invalid config string pointer".to_string())
            .and_then(|json| Config::from_json(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e);
                return ptr::null_mut();
            }
        }
    };

    let session = AnalysisSession::new(config).with_default_cache();
    Box::into_raw(Box::new(TouchSessionHandle { session }))
}

/// Free an analysis session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `touch_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn touch_session_free(session: *mut TouchSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Load files into a session, replacing its reference table.
///
/// Returns the load summary as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `touch_session_new`.
/// - `paths_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `touch_free_string`.
/// - Returns NULL on error; call `touch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn touch_session_load(
    session: *mut TouchSessionHandle,
    paths_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    let paths = match cstr_to_string(paths_json) {
        Some(s) => match parse_paths(&s) {
            Ok(paths) => paths,
            Err(e) => {
                set_last_error(&e);
                return ptr::null_mut();
            }
        },
        None => {
            set_last_error("Invalid paths string pointer");
            return ptr::null_mut();
        }
    };

    let summary = handle.session.load_files(&paths);
    to_json(summary)
}

/// Apply a filter to the session's reference table and return the outcome as JSON.
///
/// Flick reconstruction is reused across calls until new files are loaded.
///
/// # Safety
/// - `session` must be a valid pointer returned by `touch_session_new`.
/// - `keywords` must be a valid null-terminated C string or NULL.
/// - Returns a newly allocated string that must be freed with `touch_free_string`.
/// - Returns NULL on error; call `touch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn touch_session_apply(
    session: *mut TouchSessionHandle,
    start_ms: i64,
    end_ms: i64,
    keywords: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let handle = &mut *session;

    let spec = match filter_spec(start_ms, end_ms, keywords) {
        Ok(spec) => spec,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    let outcome = handle.session.apply(&spec);
    to_json(&outcome)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by analyzer functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an analyzer function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn touch_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next analyzer call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn touch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn touch_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
