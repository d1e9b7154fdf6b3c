//! SQLite storage engine for quiver.
//!
//! This crate turns an authored SQL schema (a constrained dialect whose
//! table names encode collection/group roles) into a typed,
//! collection-oriented API over SQLite:
//!
//! - **`loader`**: statement splitting, structural validation, DDL
//!   application, catalog introspection into the schema model
//! - **`database`**: the [`Database`] handle: constructors, raw execute,
//!   versioning, introspection
//! - **`elements`**: element create/read/update/delete with FK-by-label
//!   resolution and per-group row construction
//! - **`relations`**: scalar/vector/set foreign-key relations
//! - **`timeseries`**: time-series groups and the file-path sidecar
//! - **`compare`**: deterministic per-collection diffs of two databases
//! - **`migration`**: versioned migration directories
//! - **`transaction`**: RAII transaction and savepoint guards
//!
//! # Quick start
//!
//! ```no_run
//! use quiver_core::Element;
//! use quiver_sqlite::{Database, DatabaseOptions};
//!
//! let db = Database::from_schema("plants.db", "schema.sql", DatabaseOptions::default()).unwrap();
//!
//! let mut plant = Element::new();
//! plant
//!     .set("label", "Plant 1")
//!     .set("capacity", 450.5)
//!     .set("costs", vec![1.0, 2.5, 3.0]);
//! let id = db.create_element("Plant", &plant).unwrap();
//!
//! let costs = db.read_vector_by_label("Plant", "costs", "Plant 1").unwrap();
//! assert_eq!(costs.len(), 3);
//! assert!(id > 0);
//! ```

mod compare;
mod database;
mod elements;
mod error;
mod executor;
mod loader;
mod migration;
mod relations;
mod timeseries;
mod transaction;
mod validator;

pub use database::{Database, DatabaseOptions};
pub use executor::QueryResult;
pub use transaction::{SavepointGuard, TransactionGuard};

pub use quiver_core::{
    Element, ElementRef, Error, ErrorKind, Result, Schema, TimeSeries, Value,
};
