//! Result and string-array handles.
//!
//! A [`qvr_result_t`] owns column names plus typed rows; cells are read
//! with the `qvr_result_get_*` accessors. Strings and blobs returned by
//! reference stay valid until the handle is freed.

use std::ffi::CString;
use std::os::raw::c_char;

use quiver_core::Value;
use quiver_sqlite::QueryResult;

use crate::qvr_error_t;
use crate::value::qvr_value_tag_t;

/// Opaque query result: column names plus rows of typed cells.
pub struct qvr_result_t {
    pub(crate) inner: QueryResult,
    /// Keeps C strings handed out by the accessors alive until free.
    strings: Vec<CString>,
}

impl qvr_result_t {
    pub(crate) fn new(inner: QueryResult) -> Self {
        Self {
            inner,
            strings: Vec::new(),
        }
    }

    fn lend_string(&mut self, text: &str) -> *const c_char {
        let owned = CString::new(text).unwrap_or_default();
        self.strings.push(owned);
        self.strings.last().expect("just pushed").as_ptr()
    }

    fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.inner.rows.get(row).and_then(|r| r.get(column))
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_free(result: *mut qvr_result_t) {
    if !result.is_null() {
        drop(Box::from_raw(result));
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_row_count(result: *const qvr_result_t) -> usize {
    result.as_ref().map(|r| r.inner.row_count()).unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_column_count(result: *const qvr_result_t) -> usize {
    result.as_ref().map(|r| r.inner.column_count()).unwrap_or(0)
}

/// Name of one column; null when the index is out of range.
#[no_mangle]
pub unsafe extern "C" fn qvr_result_column_name(
    result: *mut qvr_result_t,
    column: usize,
) -> *const c_char {
    let Some(result) = result.as_mut() else {
        return std::ptr::null();
    };
    let name = match result.inner.columns.get(column) {
        Some(name) => name.clone(),
        None => return std::ptr::null(),
    };
    result.lend_string(&name)
}

/// Wire tag of one cell; NULL for out-of-range indexes.
#[no_mangle]
pub unsafe extern "C" fn qvr_result_get_type(
    result: *const qvr_result_t,
    row: usize,
    column: usize,
) -> qvr_value_tag_t {
    let cell = result.as_ref().and_then(|r| r.cell(row, column));
    match cell {
        Some(Value::Integer(_)) => qvr_value_tag_t::QVR_VALUE_INT64,
        Some(Value::Real(_)) => qvr_value_tag_t::QVR_VALUE_DOUBLE,
        Some(Value::Text(_)) => qvr_value_tag_t::QVR_VALUE_STRING,
        Some(Value::Blob(_)) => qvr_value_tag_t::QVR_VALUE_BLOB,
        Some(Value::IntVec(_)) | Some(Value::RealVec(_)) | Some(Value::TextVec(_)) => {
            qvr_value_tag_t::QVR_VALUE_ARRAY
        }
        Some(Value::Null) | None => qvr_value_tag_t::QVR_VALUE_NULL,
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_is_null(
    result: *const qvr_result_t,
    row: usize,
    column: usize,
) -> i32 {
    let cell = result.as_ref().and_then(|r| r.cell(row, column));
    i32::from(matches!(cell, Some(Value::Null) | None))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_get_int(
    result: *const qvr_result_t,
    row: usize,
    column: usize,
    value: *mut i64,
) -> qvr_error_t {
    let Some(result) = result.as_ref() else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let Some(cell) = result.cell(row, column) else {
        return qvr_error_t::QVR_ERROR_INDEX_OUT_OF_RANGE;
    };
    match (cell.as_integer(), value.as_mut()) {
        (Ok(v), Some(out)) => {
            *out = v;
            qvr_error_t::QVR_OK
        }
        (_, None) => qvr_error_t::QVR_ERROR_INVALID_ARGUMENT,
        (Err(_), _) => qvr_error_t::QVR_ERROR_QUERY,
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_result_get_double(
    result: *const qvr_result_t,
    row: usize,
    column: usize,
    value: *mut f64,
) -> qvr_error_t {
    let Some(result) = result.as_ref() else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let Some(cell) = result.cell(row, column) else {
        return qvr_error_t::QVR_ERROR_INDEX_OUT_OF_RANGE;
    };
    match (cell.as_real(), value.as_mut()) {
        (Ok(v), Some(out)) => {
            *out = v;
            qvr_error_t::QVR_OK
        }
        (_, None) => qvr_error_t::QVR_ERROR_INVALID_ARGUMENT,
        (Err(_), _) => qvr_error_t::QVR_ERROR_QUERY,
    }
}

/// Text of one cell; null for non-text cells or bad indexes. Valid until
/// the handle is freed.
#[no_mangle]
pub unsafe extern "C" fn qvr_result_get_string(
    result: *mut qvr_result_t,
    row: usize,
    column: usize,
) -> *const c_char {
    let Some(result) = result.as_mut() else {
        return std::ptr::null();
    };
    let text = match result.cell(row, column) {
        Some(Value::Text(text)) => text.clone(),
        _ => return std::ptr::null(),
    };
    result.lend_string(&text)
}

/// Bytes of one blob cell; null for non-blob cells. Valid until the
/// handle is freed.
#[no_mangle]
pub unsafe extern "C" fn qvr_result_get_blob(
    result: *const qvr_result_t,
    row: usize,
    column: usize,
    size: *mut usize,
) -> *const u8 {
    let Some(result) = result.as_ref() else {
        return std::ptr::null();
    };
    match result.cell(row, column) {
        Some(Value::Blob(bytes)) => {
            if let Some(size) = size.as_mut() {
                *size = bytes.len();
            }
            bytes.as_ptr()
        }
        _ => std::ptr::null(),
    }
}

/// Opaque owned list of strings (diff lists, collection names, …).
pub struct qvr_string_array_t {
    strings: Vec<CString>,
}

impl qvr_string_array_t {
    pub(crate) fn new(strings: Vec<String>) -> Self {
        Self {
            strings: strings
                .into_iter()
                .map(|s| CString::new(s).unwrap_or_default())
                .collect(),
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_string_array_free(array: *mut qvr_string_array_t) {
    if !array.is_null() {
        drop(Box::from_raw(array));
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_string_array_count(array: *const qvr_string_array_t) -> usize {
    array.as_ref().map(|a| a.strings.len()).unwrap_or(0)
}

/// One entry; null when the index is out of range. Valid until the array
/// is freed.
#[no_mangle]
pub unsafe extern "C" fn qvr_string_array_get(
    array: *const qvr_string_array_t,
    index: usize,
) -> *const c_char {
    array
        .as_ref()
        .and_then(|a| a.strings.get(index))
        .map(|s| s.as_ptr())
        .unwrap_or(std::ptr::null())
}
