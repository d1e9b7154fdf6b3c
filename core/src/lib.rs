//! Core types for quiver, a collection-oriented data-modelling library
//! over SQLite.
//!
//! This crate is pure data with no SQLite dependency. It defines:
//!
//! - [`Value`]: the tagged runtime value (null, integer, real, text,
//!   blob, and homogeneous vectors of the first three).
//! - [`Element`] / [`TimeSeries`]: in-memory builders for one element's
//!   scalar, vector, set, and time-series attributes.
//! - [`Schema`]: the in-memory description of tables, columns, foreign
//!   keys, and table roles, built from an applied schema's catalog.
//! - [`Error`] / [`ErrorKind`]: the failure taxonomy shared by every
//!   quiver crate.
//!
//! The storage engine lives in `quiver-sqlite`; the C ABI in `quiver-ffi`.
//!
//! # Example
//!
//! ```
//! use quiver_core::{Element, TimeSeries, Value};
//!
//! let mut generation = TimeSeries::new();
//! generation
//!     .add_column("date_time", vec!["2024-01-01", "2024-02-01"])
//!     .add_column("mwh", vec![310.0, 295.5]);
//!
//! let mut plant = Element::new();
//! plant
//!     .set("label", "Plant 1")
//!     .set("capacity", 450.5)
//!     .set("costs", vec![1.0, 2.5, 3.0]);
//! plant.set_time_series("generation", generation);
//!
//! assert_eq!(plant.fields()[1].1, Value::Real(450.5));
//! ```

mod element;
mod error;
mod schema;
mod value;

pub use element::{Element, ElementRef, TimeSeries};
pub use error::{Error, ErrorKind, Result};
pub use schema::{
    is_valid_identifier, validate_identifier, AttributeRole, Column, ColumnType, FkAction,
    ForeignKey, Schema, Table, TableRole, IDENTITY_COLUMNS, RESERVED_CONFIGURATION,
};
pub use value::Value;
