//! Declared-type validation of runtime values.
//!
//! The coercion rules, applied before any statement is built:
//!
//! | expected | accepted |
//! |---|---|
//! | `INTEGER` | null, integer, blob, integer vector (vector context) |
//! | `REAL` | null, integer (promoted), real, blob, real vector |
//! | `TEXT` | null, text, blob, text vector |
//! | `BLOB` | null, blob |
//!
//! Blobs are opaque and accepted everywhere except where a vector is
//! required. A real is never silently truncated into an integer column,
//! and an integer vector does not promote into a real column.

use quiver_core::{ColumnType, Error, ErrorKind, Result, Schema, Value};

/// Validates values against declared column types of a schema.
pub(crate) struct TypeValidator<'a> {
    schema: &'a Schema,
}

impl<'a> TypeValidator<'a> {
    pub(crate) fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Validates a value against the declared type of `table.column`.
    pub(crate) fn validate_scalar(&self, table: &str, column: &str, value: &Value) -> Result<()> {
        let declared = self
            .schema
            .table(table)
            .and_then(|t| t.column(column))
            .map(|c| c.column_type)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("no column '{column}' on table '{table}'"),
                )
                .with_context(column)
            })?;
        validate_value(&format!("column '{column}'"), declared, value)
    }

    /// Validates a whole vector value against the element type of a
    /// vector attribute.
    pub(crate) fn validate_vector(
        &self,
        collection: &str,
        group: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        let declared = self.schema.vector_element_type(collection, group, attribute)?;
        validate_value(&format!("vector '{attribute}'"), declared, value)
    }
}

/// Applies the coercion table for one value against one declared type.
pub(crate) fn validate_value(context: &str, expected: ColumnType, value: &Value) -> Result<()> {
    let ok = match value {
        Value::Null => true,
        Value::Blob(_) => true,
        Value::Integer(_) => matches!(expected, ColumnType::Integer | ColumnType::Real),
        Value::Real(_) => expected == ColumnType::Real,
        Value::Text(_) => expected == ColumnType::Text,
        Value::IntVec(_) => expected == ColumnType::Integer,
        Value::RealVec(_) => expected == ColumnType::Real,
        Value::TextVec(_) => expected == ColumnType::Text,
    };

    if ok {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::TypeMismatch,
            format!(
                "type mismatch for {context}: expected {}, got {}",
                expected.as_sql(),
                value.type_name()
            ),
        ))
    }
}
