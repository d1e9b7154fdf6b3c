//! Element and time-series builder handles.

use std::os::raw::c_char;

use quiver_core::{Element, TimeSeries, Value};

use crate::{cstr, qvr_error_t};

/// Opaque element builder.
pub struct qvr_element_t {
    pub(crate) inner: Element,
}

/// Opaque time-series block builder.
pub struct qvr_time_series_t {
    pub(crate) inner: TimeSeries,
}

#[no_mangle]
pub extern "C" fn qvr_element_create() -> *mut qvr_element_t {
    Box::into_raw(Box::new(qvr_element_t {
        inner: Element::new(),
    }))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_free(element: *mut qvr_element_t) {
    if !element.is_null() {
        drop(Box::from_raw(element));
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_clear(element: *mut qvr_element_t) {
    if let Some(element) = element.as_mut() {
        element.inner.clear();
    }
}

unsafe fn with_element(
    element: *mut qvr_element_t,
    name: *const c_char,
    f: impl FnOnce(&mut Element, &str),
) -> qvr_error_t {
    let (Some(element), Some(name)) = (element.as_mut(), cstr(name)) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    f(&mut element.inner, name);
    qvr_error_t::QVR_OK
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_null(
    element: *mut qvr_element_t,
    name: *const c_char,
) -> qvr_error_t {
    with_element(element, name, |e, n| {
        e.set_null(n);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_int(
    element: *mut qvr_element_t,
    name: *const c_char,
    value: i64,
) -> qvr_error_t {
    with_element(element, name, |e, n| {
        e.set(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_double(
    element: *mut qvr_element_t,
    name: *const c_char,
    value: f64,
) -> qvr_error_t {
    with_element(element, name, |e, n| {
        e.set(n, value);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_string(
    element: *mut qvr_element_t,
    name: *const c_char,
    value: *const c_char,
) -> qvr_error_t {
    let text = if value.is_null() {
        None
    } else {
        match cstr(value) {
            Some(text) => Some(text.to_string()),
            None => return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT,
        }
    };
    with_element(element, name, |e, n| match text {
        Some(text) => {
            e.set(n, text);
        }
        None => {
            e.set_null(n);
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_blob(
    element: *mut qvr_element_t,
    name: *const c_char,
    data: *const u8,
    size: usize,
) -> qvr_error_t {
    let bytes = if data.is_null() || size == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(data, size).to_vec()
    };
    with_element(element, name, |e, n| {
        e.set(n, bytes);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_int_array(
    element: *mut qvr_element_t,
    name: *const c_char,
    values: *const i64,
    count: usize,
) -> qvr_error_t {
    let list = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count).to_vec()
    };
    with_element(element, name, |e, n| {
        e.set(n, list);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_double_array(
    element: *mut qvr_element_t,
    name: *const c_char,
    values: *const f64,
    count: usize,
) -> qvr_error_t {
    let list = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count).to_vec()
    };
    with_element(element, name, |e, n| {
        e.set(n, list);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_set_string_array(
    element: *mut qvr_element_t,
    name: *const c_char,
    values: *const *const c_char,
    count: usize,
) -> qvr_error_t {
    let mut list = Vec::with_capacity(count);
    if !values.is_null() {
        for i in 0..count {
            let item = *values.add(i);
            list.push(cstr(item).unwrap_or("").to_string());
        }
    }
    with_element(element, name, |e, n| {
        e.set(n, list);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_has_fields(element: *mut qvr_element_t) -> i32 {
    element
        .as_ref()
        .map(|e| i32::from(!e.inner.fields().is_empty()))
        .unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn qvr_element_field_count(element: *mut qvr_element_t) -> usize {
    element.as_ref().map(|e| e.inner.fields().len()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn qvr_time_series_create() -> *mut qvr_time_series_t {
    Box::into_raw(Box::new(qvr_time_series_t {
        inner: TimeSeries::new(),
    }))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_time_series_free(series: *mut qvr_time_series_t) {
    if !series.is_null() {
        drop(Box::from_raw(series));
    }
}

unsafe fn with_series(
    series: *mut qvr_time_series_t,
    name: *const c_char,
    f: impl FnOnce(&mut TimeSeries, &str),
) -> qvr_error_t {
    let (Some(series), Some(name)) = (series.as_mut(), cstr(name)) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    f(&mut series.inner, name);
    qvr_error_t::QVR_OK
}

#[no_mangle]
pub unsafe extern "C" fn qvr_time_series_add_int_column(
    series: *mut qvr_time_series_t,
    name: *const c_char,
    values: *const i64,
    count: usize,
) -> qvr_error_t {
    let list: Vec<i64> = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count).to_vec()
    };
    with_series(series, name, |s, n| {
        s.add_column(n, list);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_time_series_add_double_column(
    series: *mut qvr_time_series_t,
    name: *const c_char,
    values: *const f64,
    count: usize,
) -> qvr_error_t {
    let list: Vec<f64> = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count).to_vec()
    };
    with_series(series, name, |s, n| {
        s.add_column(n, list);
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_time_series_add_string_column(
    series: *mut qvr_time_series_t,
    name: *const c_char,
    values: *const *const c_char,
    count: usize,
) -> qvr_error_t {
    let mut list: Vec<Value> = Vec::with_capacity(count);
    if !values.is_null() {
        for i in 0..count {
            let item = *values.add(i);
            list.push(Value::Text(cstr(item).unwrap_or("").to_string()));
        }
    }
    with_series(series, name, |s, n| {
        s.add_column(n, list);
    })
}

/// Attaches a copy of the time-series block to the element under the
/// given group. The series handle remains caller-owned.
#[no_mangle]
pub unsafe extern "C" fn qvr_element_add_time_series(
    element: *mut qvr_element_t,
    group: *const c_char,
    series: *mut qvr_time_series_t,
) -> qvr_error_t {
    let (Some(element), Some(group), Some(series)) =
        (element.as_mut(), cstr(group), series.as_ref())
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    element.inner.set_time_series(group, series.inner.clone());
    qvr_error_t::QVR_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn builder_lifecycle() {
        let element = qvr_element_create();
        let label = CString::new("label").unwrap();
        let value = CString::new("P1").unwrap();
        unsafe {
            assert_eq!(
                qvr_element_set_string(element, label.as_ptr(), value.as_ptr()),
                qvr_error_t::QVR_OK
            );
            let costs = CString::new("costs").unwrap();
            let values = [1.0f64, 2.0];
            assert_eq!(
                qvr_element_set_double_array(element, costs.as_ptr(), values.as_ptr(), 2),
                qvr_error_t::QVR_OK
            );
            assert_eq!(qvr_element_field_count(element), 2);
            assert_eq!(qvr_element_has_fields(element), 1);

            qvr_element_clear(element);
            assert_eq!(qvr_element_field_count(element), 0);
            qvr_element_free(element);
        }
    }

    #[test]
    fn null_arguments_are_rejected() {
        let label = CString::new("label").unwrap();
        unsafe {
            assert_eq!(
                qvr_element_set_int(std::ptr::null_mut(), label.as_ptr(), 1),
                qvr_error_t::QVR_ERROR_INVALID_ARGUMENT
            );
            let element = qvr_element_create();
            assert_eq!(
                qvr_element_set_int(element, std::ptr::null(), 1),
                qvr_error_t::QVR_ERROR_INVALID_ARGUMENT
            );
            qvr_element_free(element);
        }
    }

    #[test]
    fn time_series_attaches_to_element() {
        let element = qvr_element_create();
        let series = qvr_time_series_create();
        let column = CString::new("v").unwrap();
        let group = CString::new("g1").unwrap();
        let values = [1.0f64, 2.0];
        unsafe {
            qvr_time_series_add_double_column(series, column.as_ptr(), values.as_ptr(), 2);
            assert_eq!(
                qvr_element_add_time_series(element, group.as_ptr(), series),
                qvr_error_t::QVR_OK
            );
            assert_eq!((*element).inner.time_series().len(), 1);
            qvr_time_series_free(series);
            qvr_element_free(element);
        }
    }
}
