//! FFI bindings for Glucose Flux
//!
//! C-compatible entry points for iOS and Android hosts. Strings cross the
//! boundary as null-terminated UTF-8; every string returned by this module is
//! heap allocated and must be released with `glucose_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalyticsConfig;
use crate::error::ComputeError;
use crate::pipeline::{glucose_to_daily_reports, GlucoseProcessor};

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

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Read a required string argument, recording an error naming it when absent
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {} string pointer", name));
    }
    value
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Join already-encoded JSON payloads into one JSON array string
fn payloads_to_json_array(payloads: Vec<String>) -> String {
    format!("[{}]", payloads.join(","))
}

fn reports_to_cstr(result: Result<Vec<String>, ComputeError>) -> *mut c_char {
    match result {
        Ok(payloads) => string_to_cstr(&payloads_to_json_array(payloads)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a JSON array of glucose.raw_event.v1 records and return a JSON
/// array of daily reports. Nothing is persisted.
///
/// # Safety
/// - `json` and `subject_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `glucose_free_string`.
/// - Returns NULL on error; call `glucose_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn glucose_analyze_json(
    json: *const c_char,
    utc_offset_minutes: i32,
    subject_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };
    let Some(subject_str) = required_arg(subject_id, "subject_id") else {
        return ptr::null_mut();
    };

    reports_to_cstr(glucose_to_daily_reports(
        json_str,
        utc_offset_minutes,
        subject_str,
    ))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a GlucoseProcessor
pub struct GlucoseProcessorHandle {
    processor: GlucoseProcessor,
}

/// Create a new GlucoseProcessor.
///
/// `config_json` may be NULL for default settings, or an `AnalyticsConfig`
/// JSON object whose missing fields take their defaults.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `glucose_processor_free`.
/// - Returns NULL when the configuration is invalid.
#[no_mangle]
pub unsafe extern "C" fn glucose_processor_new(
    config_json: *const c_char,
) -> *mut GlucoseProcessorHandle {
    clear_last_error();

    let processor = if config_json.is_null() {
        GlucoseProcessor::new()
    } else {
        let Some(json) = required_arg(config_json, "config") else {
            return ptr::null_mut();
        };
        match AnalyticsConfig::from_json(&json).and_then(GlucoseProcessor::with_config) {
            Ok(processor) => processor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(GlucoseProcessorHandle { processor }))
}

/// Free a GlucoseProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `glucose_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn glucose_processor_free(processor: *mut GlucoseProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Analyze records with a stateful processor, persisting closed days to its ledger.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `glucose_processor_new`.
/// - `json` and `subject_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `glucose_free_string`.
/// - Returns NULL on error; call `glucose_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn glucose_processor_process(
    processor: *mut GlucoseProcessorHandle,
    json: *const c_char,
    subject_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let Some(json_str) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };
    let Some(subject_str) = required_arg(subject_id, "subject_id") else {
        return ptr::null_mut();
    };

    reports_to_cstr(handle.processor.process_json(&json_str, &subject_str))
}

/// Save the processor's score ledger to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `glucose_processor_new`.
/// - Returns a newly allocated string that must be freed with `glucose_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn glucose_processor_save_ledger(
    processor: *mut GlucoseProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    match handle.processor.save_ledger() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load the processor's score ledger from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `glucose_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error (see `glucose_last_error`).
#[no_mangle]
pub unsafe extern "C" fn glucose_processor_load_ledger(
    processor: *mut GlucoseProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;

    let Some(json_str) = required_arg(json, "JSON") else {
        return -1;
    };

    match handle.processor.load_ledger(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Glucose Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Glucose Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn glucose_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Glucose Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn glucose_last_error() -> *const c_char {
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
pub unsafe extern "C" fn glucose_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
