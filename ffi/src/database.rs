//! Database handle functions.
//!
//! Every function null-checks its arguments, flattens engine errors into
//! [`qvr_error_t`], and records the full message on the handle for
//! [`qvr_database_error_message`].

use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use quiver_core::{Error, Result, Value};
use quiver_sqlite::{Database, DatabaseOptions};

use crate::logging::init_logging;
use crate::result::{qvr_result_t, qvr_string_array_t};
use crate::value::{
    error_result, make_list_pair, make_pair, make_row, make_value, make_value_list,
    qvr_read_result_t, qvr_value_t, success_result,
};
use crate::{cstr, error_code, qvr_element_t, qvr_error_t, qvr_log_level_t, set_out_error};

/// Options for opening a database.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct qvr_database_options_t {
    pub read_only: c_int,
    pub console_level: qvr_log_level_t,
}

/// The default options: read-write, INFO console logging.
#[no_mangle]
pub extern "C" fn qvr_database_options_default() -> qvr_database_options_t {
    qvr_database_options_t {
        read_only: 0,
        console_level: qvr_log_level_t::QVR_LOG_INFO,
    }
}

/// Opaque database handle.
pub struct qvr_database_t {
    inner: Database,
    path: CString,
    last_error: CString,
    lent: Vec<CString>,
}

impl qvr_database_t {
    fn wrap(inner: Database) -> Box<Self> {
        let path = CString::new(inner.path().display().to_string()).unwrap_or_default();
        Box::new(Self {
            inner,
            path,
            last_error: CString::default(),
            lent: Vec::new(),
        })
    }

    fn fail(&mut self, err: Error) -> qvr_error_t {
        let code = error_code(err.kind);
        self.last_error = CString::new(err.to_string()).unwrap_or_default();
        code
    }

    fn lend(&mut self, text: &str) -> *const c_char {
        let owned = CString::new(text).unwrap_or_default();
        self.lent.push(owned);
        self.lent.last().expect("just pushed").as_ptr()
    }
}

unsafe fn options_of(options: *const qvr_database_options_t) -> (DatabaseOptions, qvr_log_level_t) {
    match options.as_ref() {
        Some(options) => (
            DatabaseOptions {
                read_only: options.read_only != 0,
            },
            options.console_level,
        ),
        None => (DatabaseOptions::default(), qvr_log_level_t::QVR_LOG_INFO),
    }
}

unsafe fn open_with(
    out_error: *mut qvr_error_t,
    failure: qvr_error_t,
    options: *const qvr_database_options_t,
    open: impl FnOnce(DatabaseOptions) -> Result<Database>,
) -> *mut qvr_database_t {
    let (options, level) = options_of(options);
    init_logging(level);
    match open(options) {
        Ok(db) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            Box::into_raw(qvr_database_t::wrap(db))
        }
        Err(err) => {
            let code = match err.kind {
                quiver_core::ErrorKind::InvalidSchema => {
                    qvr_error_t::QVR_ERROR_SCHEMA_VALIDATION
                }
                _ => failure,
            };
            set_out_error(out_error, code);
            std::ptr::null_mut()
        }
    }
}

/// Opens an existing database file.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_open(
    path: *const c_char,
    options: *const qvr_database_options_t,
    out_error: *mut qvr_error_t,
) -> *mut qvr_database_t {
    let Some(path) = cstr(path) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    open_with(out_error, qvr_error_t::QVR_ERROR_DATABASE, options, |o| {
        Database::open(path, o)
    })
}

/// Creates a database from an authored SQL schema file.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_from_schema(
    db_path: *const c_char,
    schema_path: *const c_char,
    options: *const qvr_database_options_t,
    out_error: *mut qvr_error_t,
) -> *mut qvr_database_t {
    let (Some(db_path), Some(schema_path)) = (cstr(db_path), cstr(schema_path)) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    open_with(out_error, qvr_error_t::QVR_ERROR_QUERY, options, |o| {
        Database::from_schema(db_path, schema_path, o)
    })
}

/// Creates or opens a database, applying pending migrations.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_from_migrations(
    db_path: *const c_char,
    migrations_path: *const c_char,
    options: *const qvr_database_options_t,
    out_error: *mut qvr_error_t,
) -> *mut qvr_database_t {
    let (Some(db_path), Some(migrations_path)) = (cstr(db_path), cstr(migrations_path)) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    open_with(out_error, qvr_error_t::QVR_ERROR_MIGRATION, options, |o| {
        Database::from_migrations(db_path, migrations_path, o)
    })
}

/// Closes a handle and frees everything it owns.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_close(db: *mut qvr_database_t) {
    if !db.is_null() {
        drop(Box::from_raw(db));
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_is_healthy(db: *mut qvr_database_t) -> c_int {
    db.as_ref().map(|d| c_int::from(d.inner.is_healthy())).unwrap_or(0)
}

/// Path the handle was opened with; owned by the handle.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_path(db: *mut qvr_database_t) -> *const c_char {
    db.as_ref().map(|d| d.path.as_ptr()).unwrap_or(std::ptr::null())
}

/// Message of the most recent failure on this handle.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_error_message(db: *mut qvr_database_t) -> *const c_char {
    db.as_ref()
        .map(|d| d.last_error.as_ptr())
        .unwrap_or(c"invalid database handle".as_ptr())
}

unsafe fn run_status(
    db: *mut qvr_database_t,
    f: impl FnOnce(&Database) -> Result<()>,
) -> qvr_error_t {
    let Some(db) = db.as_mut() else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    match f(&db.inner) {
        Ok(()) => qvr_error_t::QVR_OK,
        Err(err) => db.fail(err),
    }
}

unsafe fn run_read(
    db: *mut qvr_database_t,
    f: impl FnOnce(&Database) -> Result<Vec<qvr_value_t>>,
) -> qvr_read_result_t {
    let Some(db) = db.as_mut() else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    match f(&db.inner) {
        Ok(values) => success_result(values),
        Err(err) => error_result(db.fail(err)),
    }
}

unsafe fn run_strings(
    db: *mut qvr_database_t,
    out_error: *mut qvr_error_t,
    f: impl FnOnce(&Database) -> Result<Vec<String>>,
) -> *mut qvr_string_array_t {
    let Some(db) = db.as_mut() else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    match f(&db.inner) {
        Ok(strings) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            Box::into_raw(Box::new(qvr_string_array_t::new(strings)))
        }
        Err(err) => {
            set_out_error(out_error, db.fail(err));
            std::ptr::null_mut()
        }
    }
}

// --- raw SQL, transactions, versioning ---

/// Runs one SQL statement (no parameters across the ABI).
#[no_mangle]
pub unsafe extern "C" fn qvr_database_execute(
    db: *mut qvr_database_t,
    sql: *const c_char,
    out_error: *mut qvr_error_t,
) -> *mut qvr_result_t {
    let (Some(db), Some(sql)) = (db.as_mut(), cstr(sql)) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    match db.inner.execute(sql, &[]) {
        Ok(result) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            Box::into_raw(Box::new(qvr_result_t::new(result)))
        }
        Err(err) => {
            set_out_error(out_error, db.fail(err));
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_last_insert_rowid(db: *mut qvr_database_t) -> i64 {
    db.as_ref().map(|d| d.inner.last_insert_rowid()).unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_changes(db: *mut qvr_database_t) -> i64 {
    db.as_ref().map(|d| d.inner.changes() as i64).unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_begin_transaction(db: *mut qvr_database_t) -> qvr_error_t {
    run_status(db, |d| d.begin_transaction())
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_commit(db: *mut qvr_database_t) -> qvr_error_t {
    run_status(db, |d| d.commit())
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_rollback(db: *mut qvr_database_t) -> qvr_error_t {
    run_status(db, |d| d.rollback())
}

/// Stored schema version; -1 on an invalid handle.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_current_version(db: *mut qvr_database_t) -> i64 {
    let Some(db) = db.as_mut() else { return -1 };
    match db.inner.current_version() {
        Ok(version) => version,
        Err(err) => {
            db.fail(err);
            -1
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_set_version(
    db: *mut qvr_database_t,
    version: i64,
) -> qvr_error_t {
    run_status(db, |d| d.set_version(version))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_migrate_up(
    db: *mut qvr_database_t,
    migrations_path: *const c_char,
) -> qvr_error_t {
    let (Some(db), Some(path)) = (db.as_mut(), cstr(migrations_path)) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    match db.inner.migrate_up(path) {
        Ok(()) => qvr_error_t::QVR_OK,
        Err(err) => {
            db.fail(err);
            qvr_error_t::QVR_ERROR_MIGRATION
        }
    }
}

// --- element lifecycle ---

/// Creates an element from a builder; returns the new id, or 0 with an
/// error code on failure.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_create_element(
    db: *mut qvr_database_t,
    collection: *const c_char,
    element: *const qvr_element_t,
    out_error: *mut qvr_error_t,
) -> i64 {
    let (Some(db), Some(collection), Some(element)) =
        (db.as_mut(), cstr(collection), element.as_ref())
    else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return 0;
    };
    match db.inner.create_element(collection, &element.inner) {
        Ok(id) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            id
        }
        Err(err) => {
            set_out_error(out_error, db.fail(err));
            0
        }
    }
}

/// Updates scalar attributes of an element from a builder.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_element(
    db: *mut qvr_database_t,
    collection: *const c_char,
    id: i64,
    element: *const qvr_element_t,
) -> qvr_error_t {
    let (Some(collection), Some(element)) = (cstr(collection), element.as_ref()) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| d.update_element(collection, id, &element.inner))
}

/// Looks up an element id by label; 0 with an error code on failure.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_element_id(
    db: *mut qvr_database_t,
    collection: *const c_char,
    label: *const c_char,
    out_error: *mut qvr_error_t,
) -> i64 {
    let (Some(db), Some(collection), Some(label)) = (db.as_mut(), cstr(collection), cstr(label))
    else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return 0;
    };
    match db.inner.get_element_id(collection, label) {
        Ok(id) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            id
        }
        Err(err) => {
            set_out_error(out_error, db.fail(err));
            0
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_element_ids(
    db: *mut qvr_database_t,
    collection: *const c_char,
) -> qvr_read_result_t {
    let Some(collection) = cstr(collection) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.element_ids(collection)?
            .into_iter()
            .map(|id| make_value(&Value::Integer(id)))
            .collect())
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_delete_element(
    db: *mut qvr_database_t,
    collection: *const c_char,
    label: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(label)) = (cstr(collection), cstr(label)) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| d.delete_element(collection, label))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_delete_element_by_id(
    db: *mut qvr_database_t,
    collection: *const c_char,
    id: i64,
) -> qvr_error_t {
    let Some(collection) = cstr(collection) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| d.delete_element(collection, id))
}

// --- bulk reads ---

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_scalar(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute)) = (cstr(collection), cstr(attribute)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_scalar(collection, attribute)?
            .iter()
            .map(make_value)
            .collect())
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_scalar_by_label(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        let value = d.read_scalar_by_label(collection, attribute, label)?;
        Ok(vec![make_value(&value)])
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_vector(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute)) = (cstr(collection), cstr(attribute)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_vector(collection, attribute)?
            .iter()
            .map(|values| make_value_list(values))
            .collect())
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_vector_by_label(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_vector_by_label(collection, attribute, label)?
            .iter()
            .map(make_value)
            .collect())
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_set(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute)) = (cstr(collection), cstr(attribute)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_set(collection, attribute)?
            .iter()
            .map(|values| make_value_list(values))
            .collect())
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_set_by_label(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_set_by_label(collection, attribute, label)?
            .iter()
            .map(make_value)
            .collect())
    })
}

// --- per-element reads ---

/// `[[name, value], ...]` for all main-table columns of one element.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_element_scalars(
    db: *mut qvr_database_t,
    collection: *const c_char,
    element_id: i64,
) -> qvr_read_result_t {
    let Some(collection) = cstr(collection) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_element_scalar_attributes(collection, element_id)?
            .iter()
            .map(|(name, value)| make_pair(name, value))
            .collect())
    })
}

/// `[[name, [values...]], ...]` for one vector group of one element.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_element_vector_group(
    db: *mut qvr_database_t,
    collection: *const c_char,
    element_id: i64,
    group: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(group)) = (cstr(collection), cstr(group)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_element_vector_group(collection, element_id, group)?
            .iter()
            .map(|(name, values)| make_list_pair(name, values))
            .collect())
    })
}

/// One `[[name, value], ...]` entry per set row of one element.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_element_set_group(
    db: *mut qvr_database_t,
    collection: *const c_char,
    element_id: i64,
    group: *const c_char,
) -> qvr_read_result_t {
    let (Some(collection), Some(group)) = (cstr(collection), cstr(group)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    run_read(db, |d| {
        Ok(d.read_element_set_group(collection, element_id, group)?
            .iter()
            .map(|row| make_row(row))
            .collect())
    })
}

/// One `[[name, value], ...]` entry per time-series row of one element.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_element_time_series_group(
    db: *mut qvr_database_t,
    collection: *const c_char,
    element_id: i64,
    group: *const c_char,
    dimension_keys: *const *const c_char,
    dimension_count: i32,
) -> qvr_read_result_t {
    let (Some(collection), Some(group)) = (cstr(collection), cstr(group)) else {
        return error_result(qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
    };
    let mut keys = Vec::new();
    if !dimension_keys.is_null() && dimension_count > 0 {
        for i in 0..dimension_count as usize {
            if let Some(key) = cstr(*dimension_keys.add(i)) {
                keys.push(key);
            }
        }
    }
    run_read(db, |d| {
        Ok(d.read_element_time_series_group(collection, element_id, group, &keys)?
            .iter()
            .map(|row| make_row(row))
            .collect())
    })
}

// --- updates ---

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_scalar_parameter_int(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    value: i64,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| {
        d.update_scalar_parameter(collection, attribute, label, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_scalar_parameter_double(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    value: f64,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| {
        d.update_scalar_parameter(collection, attribute, label, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_scalar_parameter_string(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    value: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let value = match cstr(value) {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    };
    run_status(db, |d| {
        d.update_scalar_parameter(collection, attribute, label, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_vector_parameters_double(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    values: *const f64,
    count: usize,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let values: Vec<Value> = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count)
            .iter()
            .map(|v| Value::Real(*v))
            .collect()
    };
    run_status(db, |d| {
        d.update_vector_parameters(collection, attribute, label, &values)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_set_parameters_double(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    values: *const f64,
    count: usize,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label)) =
        (cstr(collection), cstr(attribute), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let values: Vec<Value> = if values.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(values, count)
            .iter()
            .map(|v| Value::Real(*v))
            .collect()
    };
    run_status(db, |d| {
        d.update_set_parameters(collection, attribute, label, &values)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_update_time_series_row(
    db: *mut qvr_database_t,
    collection: *const c_char,
    attribute: *const c_char,
    label: *const c_char,
    value: f64,
    date_time: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(attribute), Some(label), Some(date_time)) = (
        cstr(collection),
        cstr(attribute),
        cstr(label),
        cstr(date_time),
    ) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| {
        d.update_time_series_row(collection, attribute, label, value, date_time)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_delete_time_series(
    db: *mut qvr_database_t,
    collection: *const c_char,
    group: *const c_char,
    label: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(group), Some(label)) =
        (cstr(collection), cstr(group), cstr(label))
    else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| d.delete_time_series(collection, group, label))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_set_time_series_file(
    db: *mut qvr_database_t,
    collection: *const c_char,
    parameter: *const c_char,
    file_path: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(parameter)) = (cstr(collection), cstr(parameter)) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let file_path = cstr(file_path).unwrap_or("");
    run_status(db, |d| {
        d.set_time_series_file(collection, parameter, file_path)
    })
}

/// Stored file path; empty string when unset. Owned by the handle.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_read_time_series_file(
    db: *mut qvr_database_t,
    collection: *const c_char,
    parameter: *const c_char,
    out_error: *mut qvr_error_t,
) -> *const c_char {
    let (Some(db), Some(collection), Some(parameter)) =
        (db.as_mut(), cstr(collection), cstr(parameter))
    else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null();
    };
    match db.inner.read_time_series_file(collection, parameter) {
        Ok(path) => {
            set_out_error(out_error, qvr_error_t::QVR_OK);
            db.lend(path.as_deref().unwrap_or(""))
        }
        Err(err) => {
            set_out_error(out_error, db.fail(err));
            std::ptr::null()
        }
    }
}

// --- relations ---

#[no_mangle]
pub unsafe extern "C" fn qvr_database_set_scalar_relation(
    db: *mut qvr_database_t,
    collection: *const c_char,
    target_collection: *const c_char,
    parent_label: *const c_char,
    child_label: *const c_char,
    relation: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(target), Some(parent), Some(child), Some(relation)) = (
        cstr(collection),
        cstr(target_collection),
        cstr(parent_label),
        cstr(child_label),
        cstr(relation),
    ) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    run_status(db, |d| {
        d.set_scalar_relation(collection, target, parent, child, relation)
    })
}

unsafe fn collect_labels(
    labels: *const *const c_char,
    count: usize,
) -> Option<Vec<String>> {
    let mut collected = Vec::with_capacity(count);
    if !labels.is_null() {
        for i in 0..count {
            collected.push(cstr(*labels.add(i))?.to_string());
        }
    }
    Some(collected)
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_set_vector_relation(
    db: *mut qvr_database_t,
    collection: *const c_char,
    target_collection: *const c_char,
    parent_label: *const c_char,
    child_labels: *const *const c_char,
    count: usize,
    relation: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(target), Some(parent), Some(relation)) = (
        cstr(collection),
        cstr(target_collection),
        cstr(parent_label),
        cstr(relation),
    ) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let Some(children) = collect_labels(child_labels, count) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let children: Vec<&str> = children.iter().map(String::as_str).collect();
    run_status(db, |d| {
        d.set_vector_relation(collection, target, parent, &children, relation)
    })
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_set_set_relation(
    db: *mut qvr_database_t,
    collection: *const c_char,
    target_collection: *const c_char,
    parent_label: *const c_char,
    child_labels: *const *const c_char,
    count: usize,
    relation: *const c_char,
) -> qvr_error_t {
    let (Some(collection), Some(target), Some(parent), Some(relation)) = (
        cstr(collection),
        cstr(target_collection),
        cstr(parent_label),
        cstr(relation),
    ) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let Some(children) = collect_labels(child_labels, count) else {
        return qvr_error_t::QVR_ERROR_INVALID_ARGUMENT;
    };
    let children: Vec<&str> = children.iter().map(String::as_str).collect();
    run_status(db, |d| {
        d.set_set_relation(collection, target, parent, &children, relation)
    })
}

// --- comparison ---

macro_rules! compare_fn {
    ($name:ident, $method:ident) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            db1: *mut qvr_database_t,
            db2: *mut qvr_database_t,
            collection: *const c_char,
            out_error: *mut qvr_error_t,
        ) -> *mut qvr_string_array_t {
            let Some(collection) = cstr(collection) else {
                set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
                return std::ptr::null_mut();
            };
            if db2.is_null() {
                set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
                return std::ptr::null_mut();
            }
            if db1 == db2 {
                // Same handle on both sides; borrow it once.
                run_strings(db1, out_error, |d| d.$method(d, collection))
            } else {
                let other = &(*db2).inner;
                run_strings(db1, out_error, |d| d.$method(other, collection))
            }
        }
    };
}

compare_fn!(qvr_database_compare_scalar_parameters, compare_scalar_parameters);
compare_fn!(qvr_database_compare_vector_parameters, compare_vector_parameters);
compare_fn!(qvr_database_compare_set_parameters, compare_set_parameters);
compare_fn!(qvr_database_compare_scalar_relations, compare_scalar_relations);
compare_fn!(qvr_database_compare_vector_relations, compare_vector_relations);
compare_fn!(qvr_database_compare_set_relations, compare_set_relations);
compare_fn!(qvr_database_compare_time_series, compare_time_series);
compare_fn!(qvr_database_compare_time_series_files, compare_time_series_files);

/// All categories over the intersection of collections, merged and
/// sorted.
#[no_mangle]
pub unsafe extern "C" fn qvr_database_compare_databases(
    db1: *mut qvr_database_t,
    db2: *mut qvr_database_t,
    out_error: *mut qvr_error_t,
) -> *mut qvr_string_array_t {
    if db2.is_null() {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    }
    if db1 == db2 {
        run_strings(db1, out_error, |d| d.compare_databases(d))
    } else {
        let other = &(*db2).inner;
        run_strings(db1, out_error, |d| d.compare_databases(other))
    }
}

// --- introspection ---

#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_collections(
    db: *mut qvr_database_t,
    out_error: *mut qvr_error_t,
) -> *mut qvr_string_array_t {
    run_strings(db, out_error, |d| d.collections())
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_vector_groups(
    db: *mut qvr_database_t,
    collection: *const c_char,
    out_error: *mut qvr_error_t,
) -> *mut qvr_string_array_t {
    let Some(collection) = cstr(collection) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    run_strings(db, out_error, |d| d.vector_groups(collection))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_set_groups(
    db: *mut qvr_database_t,
    collection: *const c_char,
    out_error: *mut qvr_error_t,
) -> *mut qvr_string_array_t {
    let Some(collection) = cstr(collection) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    run_strings(db, out_error, |d| d.set_groups(collection))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_get_time_series_groups(
    db: *mut qvr_database_t,
    collection: *const c_char,
    out_error: *mut qvr_error_t,
) -> *mut qvr_string_array_t {
    let Some(collection) = cstr(collection) else {
        set_out_error(out_error, qvr_error_t::QVR_ERROR_INVALID_ARGUMENT);
        return std::ptr::null_mut();
    };
    run_strings(db, out_error, |d| d.time_series_groups(collection))
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_is_scalar_column(
    db: *mut qvr_database_t,
    collection: *const c_char,
    column: *const c_char,
) -> c_int {
    match (db.as_ref(), cstr(collection), cstr(column)) {
        (Some(db), Some(collection), Some(column)) => {
            c_int::from(db.inner.is_scalar_column(collection, column))
        }
        _ => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_is_vector_column(
    db: *mut qvr_database_t,
    collection: *const c_char,
    column: *const c_char,
) -> c_int {
    match (db.as_ref(), cstr(collection), cstr(column)) {
        (Some(db), Some(collection), Some(column)) => {
            c_int::from(db.inner.is_vector_column(collection, column))
        }
        _ => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn qvr_database_is_set_column(
    db: *mut qvr_database_t,
    collection: *const c_char,
    column: *const c_char,
) -> c_int {
    match (db.as_ref(), cstr(collection), cstr(column)) {
        (Some(db), Some(collection), Some(column)) => {
            c_int::from(db.inner.is_set_column(collection, column))
        }
        _ => 0,
    }
}
