//! C ABI for quiver.
//!
//! Every function is `extern "C"` with the `qvr_` prefix and works on
//! opaque handles:
//!
//! - [`qvr_database_t`]: one database connection plus its last error
//! - [`qvr_element_t`] / [`qvr_time_series_t`]: element builders
//! - [`qvr_result_t`]: column names plus typed rows
//! - [`qvr_string_array_t`]: owned list of strings (diffs, names)
//!
//! Values cross the boundary as [`qvr_value_t`], a tagged union
//! (`NULL=0, INT64=1, DOUBLE=2, STRING=3, ARRAY=4, BLOB=5`). Arrays own
//! their element buffers; every handle and value kind has exactly one
//! free function, and strings returned by reference stay valid until
//! their owning handle is freed.
//!
//! Errors flatten to [`qvr_error_t`] codes; the full message is
//! retrievable via [`qvr_database_error_message`] on the handle.

#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

mod database;
mod element;
mod logging;
mod result;
mod value;

pub use database::*;
pub use element::*;
pub use logging::*;
pub use result::*;
pub use value::*;

use quiver_core::ErrorKind;
use std::os::raw::c_char;

/// Error codes returned across the ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum qvr_error_t {
    QVR_OK = 0,
    QVR_ERROR_INVALID_ARGUMENT = -1,
    QVR_ERROR_DATABASE = -2,
    QVR_ERROR_QUERY = -3,
    QVR_ERROR_NO_MEMORY = -4,
    QVR_ERROR_NOT_OPEN = -5,
    QVR_ERROR_INDEX_OUT_OF_RANGE = -6,
    QVR_ERROR_MIGRATION = -7,
    QVR_ERROR_SCHEMA_VALIDATION = -8,
    QVR_ERROR_NOT_FOUND = -9,
}

/// Console log levels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum qvr_log_level_t {
    QVR_LOG_DEBUG = 0,
    QVR_LOG_INFO = 1,
    QVR_LOG_WARN = 2,
    QVR_LOG_ERROR = 3,
    QVR_LOG_OFF = 4,
}

pub(crate) fn error_code(kind: ErrorKind) -> qvr_error_t {
    match kind {
        ErrorKind::InvalidSchema => qvr_error_t::QVR_ERROR_SCHEMA_VALIDATION,
        ErrorKind::CollectionNotFound
        | ErrorKind::AttributeNotFound
        | ErrorKind::ElementNotFound => qvr_error_t::QVR_ERROR_NOT_FOUND,
        ErrorKind::NoSchemaLoaded => qvr_error_t::QVR_ERROR_NOT_OPEN,
        ErrorKind::FileNotFound
        | ErrorKind::PermissionDenied
        | ErrorKind::DiskFull
        | ErrorKind::InternalError => qvr_error_t::QVR_ERROR_DATABASE,
        _ => qvr_error_t::QVR_ERROR_QUERY,
    }
}

pub(crate) unsafe fn set_out_error(out: *mut qvr_error_t, code: qvr_error_t) {
    if !out.is_null() {
        *out = code;
    }
}

/// Borrows a C string argument; `None` on null or invalid UTF-8.
pub(crate) unsafe fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    std::ffi::CStr::from_ptr(ptr).to_str().ok()
}

/// Human-readable description of an error code.
#[no_mangle]
pub extern "C" fn qvr_error_string(error: qvr_error_t) -> *const c_char {
    let text: &'static [u8] = match error {
        qvr_error_t::QVR_OK => b"Success\0",
        qvr_error_t::QVR_ERROR_INVALID_ARGUMENT => b"Invalid argument\0",
        qvr_error_t::QVR_ERROR_DATABASE => b"Database error\0",
        qvr_error_t::QVR_ERROR_QUERY => b"Query error\0",
        qvr_error_t::QVR_ERROR_NO_MEMORY => b"Out of memory\0",
        qvr_error_t::QVR_ERROR_NOT_OPEN => b"Database not open\0",
        qvr_error_t::QVR_ERROR_INDEX_OUT_OF_RANGE => b"Index out of range\0",
        qvr_error_t::QVR_ERROR_MIGRATION => b"Migration error\0",
        qvr_error_t::QVR_ERROR_SCHEMA_VALIDATION => b"Schema validation error\0",
        qvr_error_t::QVR_ERROR_NOT_FOUND => b"Not found\0",
    };
    text.as_ptr() as *const c_char
}

/// Library version string.
#[no_mangle]
pub extern "C" fn qvr_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_strings_are_nul_terminated() {
        let ptr = qvr_error_string(qvr_error_t::QVR_ERROR_NOT_FOUND);
        let text = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert_eq!(text.to_str().unwrap(), "Not found");
    }

    #[test]
    fn version_matches_manifest() {
        let ptr = qvr_version();
        let text = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert_eq!(text.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn kind_flattening() {
        assert_eq!(
            error_code(ErrorKind::InvalidSchema),
            qvr_error_t::QVR_ERROR_SCHEMA_VALIDATION
        );
        assert_eq!(
            error_code(ErrorKind::ElementNotFound),
            qvr_error_t::QVR_ERROR_NOT_FOUND
        );
        assert_eq!(
            error_code(ErrorKind::TypeMismatch),
            qvr_error_t::QVR_ERROR_QUERY
        );
    }
}
