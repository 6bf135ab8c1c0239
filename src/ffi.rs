//! FFI bindings for Synheart Sleep
//!
//! This module provides C-compatible functions for calling Synheart Sleep from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `sleep_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalysisConfig;
use crate::hypnogram::InputFormat;
use crate::pipeline::SleepProcessor;

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

// ============================================================================
// Analysis
// ============================================================================

/// Analyse a JSON hypnogram and return the report JSON.
///
/// `json` is either an array of stage labels or a document with `stages`.
/// An `epoch_length_sec` <= 0 means "use the document value or 30 s".
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `sleep_free_string`.
/// - Returns NULL on error; call `sleep_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sleep_hypnogram_to_report(
    json: *const c_char,
    epoch_length_sec: f64,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let processor = if epoch_length_sec > 0.0 {
        match AnalysisConfig::with_epoch_length(epoch_length_sec)
            .and_then(SleepProcessor::with_config)
        {
            Ok(processor) => processor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    } else {
        SleepProcessor::new()
    };

    match processor.process(&json_str, InputFormat::Json, "ffi") {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Synheart Sleep functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Synheart Sleep function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn sleep_free_string(ptr: *mut c_char) {
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
/// - Returns a pointer to a static string that is valid until the next
///   Synheart Sleep call on the same thread.
/// - Returns NULL if there was no error.
/// - Do NOT free the returned pointer.
#[no_mangle]
pub unsafe extern "C" fn sleep_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
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
pub unsafe extern "C" fn sleep_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
