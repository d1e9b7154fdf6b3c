//! The tagged value union crossing the ABI, and its ownership rules.
//!
//! A [`qvr_value_t`] owns whatever its payload points at: strings are
//! heap C strings, arrays own their element buffer, blobs own their
//! bytes. [`qvr_value_free`] releases one value recursively;
//! [`qvr_read_result_free`] releases a whole read result.
//!
//! Builder-only vector variants are conveyed as arrays of scalars. A
//! null real inside a vector slot travels as NaN on the wire; the core
//! itself keeps the two distinct.

use std::os::raw::c_char;

use quiver_core::Value;

use crate::qvr_error_t;

/// Discriminant of [`qvr_value_t`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum qvr_value_tag_t {
    QVR_VALUE_NULL = 0,
    QVR_VALUE_INT64 = 1,
    QVR_VALUE_DOUBLE = 2,
    QVR_VALUE_STRING = 3,
    QVR_VALUE_ARRAY = 4,
    QVR_VALUE_BLOB = 5,
}

/// Array payload: `count` elements, owned by the value.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct qvr_array_t {
    pub count: usize,
    pub elements: *mut qvr_value_t,
}

/// Blob payload: `size` bytes, owned by the value.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct qvr_blob_t {
    pub size: usize,
    pub data: *mut u8,
}

/// Untagged payload storage.
#[repr(C)]
#[derive(Clone, Copy)]
pub union qvr_value_data_t {
    pub int_value: i64,
    pub double_value: f64,
    pub string_value: *mut c_char,
    pub array_value: qvr_array_t,
    pub blob_value: qvr_blob_t,
}

/// One tagged value.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct qvr_value_t {
    pub tag: qvr_value_tag_t,
    pub data: qvr_value_data_t,
}

/// Error code plus an owned array of values, as returned by the bulk
/// read entry points.
#[repr(C)]
pub struct qvr_read_result_t {
    pub error: qvr_error_t,
    pub count: usize,
    pub values: *mut qvr_value_t,
}

pub(crate) fn null_value() -> qvr_value_t {
    qvr_value_t {
        tag: qvr_value_tag_t::QVR_VALUE_NULL,
        data: qvr_value_data_t { int_value: 0 },
    }
}

pub(crate) fn make_string(text: &str) -> qvr_value_t {
    qvr_value_t {
        tag: qvr_value_tag_t::QVR_VALUE_STRING,
        data: qvr_value_data_t {
            string_value: copy_string(text),
        },
    }
}

/// Heap-allocates a NUL-terminated copy of `text`. Interior NULs cannot
/// occur in values read from the engine.
pub(crate) fn copy_string(text: &str) -> *mut c_char {
    match std::ffi::CString::new(text) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ffi::CString::new("").expect("empty string").into_raw(),
    }
}

pub(crate) fn make_blob(bytes: &[u8]) -> qvr_value_t {
    let mut buffer = bytes.to_vec().into_boxed_slice();
    let data = buffer.as_mut_ptr();
    let size = buffer.len();
    std::mem::forget(buffer);
    qvr_value_t {
        tag: qvr_value_tag_t::QVR_VALUE_BLOB,
        data: qvr_value_data_t {
            blob_value: qvr_blob_t { size, data },
        },
    }
}

pub(crate) fn make_array(values: Vec<qvr_value_t>) -> qvr_value_t {
    let count = values.len();
    let elements = if count == 0 {
        std::ptr::null_mut()
    } else {
        let mut boxed = values.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        std::mem::forget(boxed);
        ptr
    };
    qvr_value_t {
        tag: qvr_value_tag_t::QVR_VALUE_ARRAY,
        data: qvr_value_data_t {
            array_value: qvr_array_t { count, elements },
        },
    }
}

/// Converts one core value; vector variants become arrays of scalars.
pub(crate) fn make_value(value: &Value) -> qvr_value_t {
    match value {
        Value::Null => null_value(),
        Value::Integer(v) => qvr_value_t {
            tag: qvr_value_tag_t::QVR_VALUE_INT64,
            data: qvr_value_data_t { int_value: *v },
        },
        Value::Real(v) => qvr_value_t {
            tag: qvr_value_tag_t::QVR_VALUE_DOUBLE,
            data: qvr_value_data_t { double_value: *v },
        },
        Value::Text(v) => make_string(v),
        Value::Blob(v) => make_blob(v),
        Value::IntVec(v) => make_array(
            v.iter()
                .map(|i| make_value(&Value::Integer(*i)))
                .collect(),
        ),
        Value::RealVec(v) => {
            make_array(v.iter().map(|r| make_value(&Value::Real(*r))).collect())
        }
        Value::TextVec(v) => {
            make_array(v.iter().map(|s| make_string(s)).collect())
        }
    }
}

pub(crate) fn make_value_list(values: &[Value]) -> qvr_value_t {
    make_array(values.iter().map(make_value).collect())
}

/// `[name, value]` two-element array.
pub(crate) fn make_pair(name: &str, value: &Value) -> qvr_value_t {
    make_array(vec![make_string(name), make_value(value)])
}

/// `[name, [values...]]` two-element array.
pub(crate) fn make_list_pair(name: &str, values: &[Value]) -> qvr_value_t {
    make_array(vec![make_string(name), make_value_list(values)])
}

/// `[[name, value], ...]` array of pairs for one row.
pub(crate) fn make_row(row: &[(String, Value)]) -> qvr_value_t {
    make_array(row.iter().map(|(n, v)| make_pair(n, v)).collect())
}

pub(crate) fn error_result(error: qvr_error_t) -> qvr_read_result_t {
    qvr_read_result_t {
        error,
        count: 0,
        values: std::ptr::null_mut(),
    }
}

pub(crate) fn success_result(values: Vec<qvr_value_t>) -> qvr_read_result_t {
    let count = values.len();
    let ptr = if count == 0 {
        std::ptr::null_mut()
    } else {
        let mut boxed = values.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        std::mem::forget(boxed);
        ptr
    };
    qvr_read_result_t {
        error: qvr_error_t::QVR_OK,
        count,
        values: ptr,
    }
}

unsafe fn free_payload(value: &mut qvr_value_t) {
    match value.tag {
        qvr_value_tag_t::QVR_VALUE_STRING => {
            let ptr = value.data.string_value;
            if !ptr.is_null() {
                drop(std::ffi::CString::from_raw(ptr));
            }
        }
        qvr_value_tag_t::QVR_VALUE_BLOB => {
            let blob = value.data.blob_value;
            if !blob.data.is_null() {
                drop(Box::from_raw(std::slice::from_raw_parts_mut(
                    blob.data, blob.size,
                )));
            }
        }
        qvr_value_tag_t::QVR_VALUE_ARRAY => {
            let array = value.data.array_value;
            if !array.elements.is_null() {
                let slice = std::slice::from_raw_parts_mut(array.elements, array.count);
                for element in slice.iter_mut() {
                    free_payload(element);
                }
                drop(Box::from_raw(slice as *mut [qvr_value_t]));
            }
        }
        _ => {}
    }
    value.tag = qvr_value_tag_t::QVR_VALUE_NULL;
    value.data = qvr_value_data_t { int_value: 0 };
}

/// Releases one value's payload in place. The value itself stays
/// caller-owned.
#[no_mangle]
pub unsafe extern "C" fn qvr_value_free(value: *mut qvr_value_t) {
    if let Some(value) = value.as_mut() {
        free_payload(value);
    }
}

/// Releases the array owned by a read result.
#[no_mangle]
pub unsafe extern "C" fn qvr_read_result_free(result: *mut qvr_read_result_t) {
    let Some(result) = result.as_mut() else { return };
    if !result.values.is_null() {
        let slice = std::slice::from_raw_parts_mut(result.values, result.count);
        for value in slice.iter_mut() {
            free_payload(value);
        }
        drop(Box::from_raw(slice as *mut [qvr_value_t]));
    }
    result.values = std::ptr::null_mut();
    result.count = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversion_tags() {
        assert_eq!(make_value(&Value::Null).tag, qvr_value_tag_t::QVR_VALUE_NULL);
        let v = make_value(&Value::Integer(7));
        assert_eq!(v.tag, qvr_value_tag_t::QVR_VALUE_INT64);
        assert_eq!(unsafe { v.data.int_value }, 7);
    }

    #[test]
    fn string_round_trip_and_free() {
        let mut v = make_value(&Value::Text("hello".into()));
        assert_eq!(v.tag, qvr_value_tag_t::QVR_VALUE_STRING);
        let text = unsafe { std::ffi::CStr::from_ptr(v.data.string_value) };
        assert_eq!(text.to_str().unwrap(), "hello");
        unsafe { qvr_value_free(&mut v) };
        assert_eq!(v.tag, qvr_value_tag_t::QVR_VALUE_NULL);
    }

    #[test]
    fn vector_becomes_owned_array() {
        let mut v = make_value(&Value::RealVec(vec![1.0, 2.0]));
        assert_eq!(v.tag, qvr_value_tag_t::QVR_VALUE_ARRAY);
        let array = unsafe { v.data.array_value };
        assert_eq!(array.count, 2);
        let first = unsafe { *array.elements };
        assert_eq!(first.tag, qvr_value_tag_t::QVR_VALUE_DOUBLE);
        assert_eq!(unsafe { first.data.double_value }, 1.0);
        unsafe { qvr_value_free(&mut v) };
    }

    #[test]
    fn read_result_free_is_idempotent() {
        let mut result = success_result(vec![make_value(&Value::Integer(1))]);
        unsafe {
            qvr_read_result_free(&mut result);
            qvr_read_result_free(&mut result);
        }
        assert!(result.values.is_null());
    }

    #[test]
    fn blob_payload_round_trips() {
        let mut v = make_value(&Value::Blob(vec![1, 2, 3]));
        assert_eq!(v.tag, qvr_value_tag_t::QVR_VALUE_BLOB);
        let blob = unsafe { v.data.blob_value };
        let bytes = unsafe { std::slice::from_raw_parts(blob.data, blob.size) };
        assert_eq!(bytes, [1, 2, 3]);
        unsafe { qvr_value_free(&mut v) };
    }
}
