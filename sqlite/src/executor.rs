//! Typed statement execution over a SQLite connection.
//!
//! The executor binds positional [`Value`] parameters 1:1, steps the
//! statement, and materialises a [`QueryResult`] of typed cells. Vector
//! and builder-only variants never reach this layer; callers flatten
//! them into per-row scalars first; passing one through is a programmer
//! error reported as [`ErrorKind::InternalError`].

use quiver_core::{Error, ErrorKind, Result, Value};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::map_sqlite;

/// Column names plus rows of typed values, as returned by
/// [`Database::execute`](crate::Database::execute).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in statement order.
    pub columns: Vec<String>,
    /// Rows of cells, one [`Value`] per column.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The single cell of a one-row, one-column result.
    pub fn scalar(&self) -> Option<&Value> {
        match (self.rows.len(), self.columns.len()) {
            (1, 1) => Some(&self.rows[0][0]),
            _ => None,
        }
    }
}

fn bind_value(value: &Value) -> Result<rusqlite::types::Value> {
    Ok(match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(v) => rusqlite::types::Value::Integer(*v),
        Value::Real(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Blob(v) => rusqlite::types::Value::Blob(v.clone()),
        other => {
            return Err(Error::internal(format!(
                "cannot bind {} parameter; flatten vectors before execution",
                other.type_name()
            )))
        }
    })
}

fn cell_value(cell: ValueRef<'_>) -> Result<Value> {
    Ok(match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| Error::new(ErrorKind::SqlError, format!("non-UTF-8 text cell: {e}")))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

/// Runs a statement and materialises every row.
///
/// Works for both queries and mutations; a mutation simply yields an
/// empty row set.
pub(crate) fn run(conn: &Connection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;

    if stmt.parameter_count() != params.len() {
        return Err(Error::internal(format!(
            "statement expects {} parameters, {} supplied",
            stmt.parameter_count(),
            params.len()
        )));
    }

    let bound = params.iter().map(bind_value).collect::<Result<Vec<_>>>()?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut query = stmt
        .query(rusqlite::params_from_iter(bound))
        .map_err(map_sqlite)?;

    let mut rows = Vec::new();
    while let Some(row) = query.next().map_err(map_sqlite)? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(cell_value(row.get_ref(i).map_err(map_sqlite)?)?);
        }
        rows.push(cells);
    }

    Ok(QueryResult { columns, rows })
}

/// Runs a mutation and returns the number of affected rows.
pub(crate) fn run_update(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize> {
    let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;

    if stmt.parameter_count() != params.len() {
        return Err(Error::internal(format!(
            "statement expects {} parameters, {} supplied",
            stmt.parameter_count(),
            params.len()
        )));
    }

    let bound = params.iter().map(bind_value).collect::<Result<Vec<_>>>()?;
    stmt.execute(rusqlite::params_from_iter(bound))
        .map_err(map_sqlite)
}

/// Runs a query expected to yield at most one row.
pub(crate) fn run_single(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<Option<Vec<Value>>> {
    let mut result = run(conn, sql, params)?;
    Ok(if result.rows.is_empty() {
        None
    } else {
        Some(result.rows.swap_remove(0))
    })
}
