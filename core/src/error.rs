//! Error type shared across the quiver crates.
//!
//! Every fallible operation returns [`Error`]: a machine-readable
//! [`ErrorKind`], a human-readable message, and an optional context string
//! naming the collection, attribute, or label involved. Errors cross crate
//! boundaries unmodified; only the C ABI flattens them into numeric codes.

use std::fmt;
use std::io;

use thiserror::Error;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation requires a loaded schema and none is present.
    NoSchemaLoaded,
    /// Named collection does not exist in the schema.
    CollectionNotFound,
    /// Named attribute does not exist on the collection.
    AttributeNotFound,
    /// Authored schema violates a structural rule.
    InvalidSchema,
    /// Runtime value variant does not fit the declared column type.
    TypeMismatch,
    /// Declared column type is not one the model supports.
    InvalidType,
    /// No element with the given id or label.
    ElementNotFound,
    /// An element with the same label already exists.
    DuplicateElement,
    /// Element builder carries no fields.
    EmptyElement,
    /// CHECK or other table constraint failed.
    ConstraintViolation,
    /// Foreign key constraint failed, or a label did not resolve.
    ForeignKeyViolation,
    /// UNIQUE constraint failed.
    UniqueViolation,
    /// NOT NULL constraint failed.
    NotNullViolation,
    /// SQLite reported an error not covered by a more specific kind.
    SqlError,
    /// Statement failed to parse.
    SqlSyntaxError,
    /// File or directory does not exist.
    FileNotFound,
    /// Filesystem permission denied.
    PermissionDenied,
    /// Storage exhausted.
    DiskFull,
    /// Identifier is not a valid table or column name.
    InvalidIdentifier,
    /// Value is structurally invalid (e.g. unequal vector lengths).
    InvalidValue,
    /// Programmer error inside the library.
    InternalError,
    /// Operation is recognised but not available.
    NotImplemented,
}

impl ErrorKind {
    /// Stable human-readable label for the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoSchemaLoaded => "no schema loaded",
            ErrorKind::CollectionNotFound => "collection not found",
            ErrorKind::AttributeNotFound => "attribute not found",
            ErrorKind::InvalidSchema => "invalid schema",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::InvalidType => "invalid type",
            ErrorKind::ElementNotFound => "element not found",
            ErrorKind::DuplicateElement => "duplicate element",
            ErrorKind::EmptyElement => "empty element",
            ErrorKind::ConstraintViolation => "constraint violation",
            ErrorKind::ForeignKeyViolation => "foreign key violation",
            ErrorKind::UniqueViolation => "unique violation",
            ErrorKind::NotNullViolation => "not null violation",
            ErrorKind::SqlError => "sql error",
            ErrorKind::SqlSyntaxError => "sql syntax error",
            ErrorKind::FileNotFound => "file not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::DiskFull => "disk full",
            ErrorKind::InvalidIdentifier => "invalid identifier",
            ErrorKind::InvalidValue => "invalid value",
            ErrorKind::InternalError => "internal error",
            ErrorKind::NotImplemented => "not implemented",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with kind, message, and optional context.
///
/// # Examples
///
/// ```
/// use quiver_core::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::CollectionNotFound, "no such table")
///     .with_context("Plant");
/// assert_eq!(err.kind, ErrorKind::CollectionNotFound);
/// assert_eq!(err.to_string(), "collection not found: no such table (Plant)");
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}{}", .context.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct Error {
    /// Classification used by callers to branch on the failure.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Collection, attribute, or label the failure refers to.
    pub context: Option<String>,
}

impl Error {
    /// Creates an error with no context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Attaches a context string (collection, attribute, label).
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Shorthand for an [`ErrorKind::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::StorageFull => ErrorKind::DiskFull,
            _ => ErrorKind::SqlError,
        };
        Error::new(kind, err.to_string())
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::AttributeNotFound, "no column 'x'").with_context("Plant");
        assert_eq!(err.to_string(), "attribute not found: no column 'x' (Plant)");
    }

    #[test]
    fn io_not_found_maps_to_file_not_found() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).kind, ErrorKind::FileNotFound);
    }
}
