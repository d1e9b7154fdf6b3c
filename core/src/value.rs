//! The runtime value variant shared by every layer of quiver.
//!
//! A [`Value`] is what flows between element builders, the SQL executor,
//! and the comparison engine. Scalars map 1:1 onto SQLite storage classes;
//! the three homogeneous vector variants exist only inside in-memory
//! element builders and are flattened into per-index rows before they
//! reach a statement.

use std::fmt;

use crate::error::{Error, ErrorKind, Result};

/// A dynamically typed value.
///
/// Equality is NaN-aware: two [`Real`](Value::Real) values compare equal
/// when their bit patterns match *or* both are NaN. This keeps database
/// comparison deterministic without treating NaN as unequal to itself.
///
/// # Examples
///
/// ```
/// use quiver_core::Value;
///
/// let v = Value::from(42i64);
/// assert_eq!(v.as_integer().unwrap(), 42);
/// assert!(v.as_text().is_err());
///
/// assert_eq!(Value::Real(f64::NAN), Value::Real(f64::NAN));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Opaque byte string.
    Blob(Vec<u8>),
    /// Homogeneous integer vector (builder-only).
    IntVec(Vec<i64>),
    /// Homogeneous real vector (builder-only).
    RealVec(Vec<f64>),
    /// Homogeneous text vector (builder-only).
    TextVec(Vec<String>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for the three vector variants.
    pub fn is_vector(&self) -> bool {
        matches!(self, Value::IntVec(_) | Value::RealVec(_) | Value::TextVec(_))
    }

    /// A short name for the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
            Value::IntVec(_) => "INTEGER[]",
            Value::RealVec(_) => "REAL[]",
            Value::TextVec(_) => "TEXT[]",
        }
    }

    /// Extracts an integer.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TypeMismatch`] when the variant is not `Integer`.
    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(v) => Ok(*v),
            other => Err(mismatch("INTEGER", other)),
        }
    }

    /// Extracts a real. An `Integer` promotes losslessly.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TypeMismatch`] when the variant is neither `Real` nor
    /// `Integer`.
    pub fn as_real(&self) -> Result<f64> {
        match self {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(mismatch("REAL", other)),
        }
    }

    /// Extracts text.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("TEXT", other)),
        }
    }

    /// Extracts a blob.
    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Value::Blob(v) => Ok(v),
            other => Err(mismatch("BLOB", other)),
        }
    }

    /// Number of elements in a vector variant, `None` for scalars.
    pub fn vector_len(&self) -> Option<usize> {
        match self {
            Value::IntVec(v) => Some(v.len()),
            Value::RealVec(v) => Some(v.len()),
            Value::TextVec(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Splits a vector variant into its scalar elements.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TypeMismatch`] when called on a scalar variant.
    pub fn into_elements(self) -> Result<Vec<Value>> {
        match self {
            Value::IntVec(v) => Ok(v.into_iter().map(Value::Integer).collect()),
            Value::RealVec(v) => Ok(v.into_iter().map(Value::Real).collect()),
            Value::TextVec(v) => Ok(v.into_iter().map(Value::Text).collect()),
            other => Err(mismatch("vector", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> Error {
    Error::new(
        ErrorKind::TypeMismatch,
        format!("expected {expected}, got {}", got.type_name()),
    )
}

fn real_eq(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => real_eq(*a, *b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::IntVec(a), Value::IntVec(b)) => a == b,
            (Value::RealVec(a), Value::RealVec(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| real_eq(*x, *y))
            }
            (Value::TextVec(a), Value::TextVec(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
            Value::IntVec(v) => write_list(f, v.iter()),
            Value::RealVec(v) => write_list(f, v.iter()),
            Value::TextVec(v) => write_list(f, v.iter()),
        }
    }
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntVec(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealVec(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextVec(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::TextVec(v.into_iter().map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractors_enforce_variant() {
        assert_eq!(Value::from(7i64).as_integer().unwrap(), 7);
        assert_eq!(Value::from("x").as_text().unwrap(), "x");
        let err = Value::from("x").as_integer().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn integer_promotes_to_real() {
        assert_eq!(Value::Integer(3).as_real().unwrap(), 3.0);
    }

    #[test]
    fn nan_equals_nan() {
        assert_eq!(Value::Real(f64::NAN), Value::Real(f64::NAN));
        assert_ne!(Value::Real(f64::NAN), Value::Real(0.0));
        assert_eq!(
            Value::RealVec(vec![1.0, f64::NAN]),
            Value::RealVec(vec![1.0, f64::NAN])
        );
    }

    #[test]
    fn negative_zero_differs_from_zero() {
        // bit-for-bit comparison
        assert_ne!(Value::Real(0.0), Value::Real(-0.0));
    }

    #[test]
    fn vector_split() {
        let parts = Value::from(vec![1i64, 2]).into_elements().unwrap();
        assert_eq!(parts, vec![Value::Integer(1), Value::Integer(2)]);
        assert!(Value::Integer(1).into_elements().is_err());
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(vec![1.5, 2.0]).to_string(), "[1.5, 2]");
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_string(), "<blob 3 bytes>");
    }
}
