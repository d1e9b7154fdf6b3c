//! Mapping from SQLite failures to the quiver error taxonomy.
//!
//! Constraint failures are narrowed via SQLite's extended result codes so
//! callers can branch on foreign-key vs. unique vs. not-null violations
//! without string matching.

use quiver_core::{Error, ErrorKind};
use rusqlite::ffi;

/// Converts a [`rusqlite::Error`] into a quiver [`Error`].
///
/// Lives here as a function rather than a `From` impl because both types
/// are foreign to this crate.
pub(crate) fn map_sqlite(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(code, message) => {
            let kind = match code.code {
                rusqlite::ErrorCode::ConstraintViolation => match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ErrorKind::ForeignKeyViolation,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        ErrorKind::UniqueViolation
                    }
                    ffi::SQLITE_CONSTRAINT_NOTNULL => ErrorKind::NotNullViolation,
                    _ => ErrorKind::ConstraintViolation,
                },
                rusqlite::ErrorCode::DiskFull => ErrorKind::DiskFull,
                rusqlite::ErrorCode::PermissionDenied => ErrorKind::PermissionDenied,
                rusqlite::ErrorCode::CannotOpen => ErrorKind::FileNotFound,
                rusqlite::ErrorCode::ApiMisuse => ErrorKind::InternalError,
                _ => {
                    let text = message.as_deref().unwrap_or("");
                    if text.contains("syntax error") {
                        ErrorKind::SqlSyntaxError
                    } else {
                        ErrorKind::SqlError
                    }
                }
            };
            Error::new(kind, err.to_string())
        }
        rusqlite::Error::SqlInputError { msg, .. } => {
            let kind = if msg.contains("syntax error") {
                ErrorKind::SqlSyntaxError
            } else {
                ErrorKind::SqlError
            };
            Error::new(kind, err.to_string())
        }
        rusqlite::Error::QueryReturnedNoRows => {
            Error::new(ErrorKind::ElementNotFound, "query returned no rows")
        }
        rusqlite::Error::InvalidParameterCount(got, expected) => Error::internal(format!(
            "statement expects {expected} parameters, {got} bound"
        )),
        _ => Error::new(ErrorKind::SqlError, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn failing(conn: &Connection, sql: &str) -> Error {
        map_sqlite(conn.execute(sql, []).unwrap_err())
    }

    #[test]
    fn constraint_kinds_are_narrowed() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE t (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL);
             CREATE TABLE child (id INTEGER, t_id INTEGER REFERENCES t(id));
             INSERT INTO t (label) VALUES ('a');",
        )
        .unwrap();

        let err = failing(&conn, "INSERT INTO t (label) VALUES ('a')");
        assert_eq!(err.kind, ErrorKind::UniqueViolation);

        let err = failing(&conn, "INSERT INTO t (label) VALUES (NULL)");
        assert_eq!(err.kind, ErrorKind::NotNullViolation);

        let err = failing(&conn, "INSERT INTO child (id, t_id) VALUES (1, 999)");
        assert_eq!(err.kind, ErrorKind::ForeignKeyViolation);
    }

    #[test]
    fn syntax_errors_are_flagged() {
        let conn = Connection::open_in_memory().unwrap();
        let err = map_sqlite(conn.prepare("SELEC 1").unwrap_err());
        assert_eq!(err.kind, ErrorKind::SqlSyntaxError);
    }
}
