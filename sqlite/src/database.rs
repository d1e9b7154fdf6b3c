//! The database handle.
//!
//! A [`Database`] owns one SQLite connection plus the schema model built
//! from its catalog. Handles are single-threaded: operations are
//! synchronous, totally ordered, and a handle must not be shared across
//! threads without external serialisation.
//!
//! Construct a handle with [`Database::from_schema`] (single authored SQL
//! file), [`Database::from_migrations`] (versioned migration directory),
//! or [`Database::open`] (existing file, schema introspected).

use std::path::{Path, PathBuf};

use quiver_core::{validate_identifier, Error, ErrorKind, Result, Schema, TableRole, Value};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::error::map_sqlite;
use crate::executor::{self, QueryResult};
use crate::loader;
use crate::migration;

/// Options applied when opening a database.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseOptions {
    /// Open the file read-only; any write fails at the SQL layer.
    pub read_only: bool,
}

/// Handle to one quiver database.
///
/// # Examples
///
/// ```no_run
/// use quiver_sqlite::{Database, DatabaseOptions};
///
/// let db = Database::from_schema("plants.db", "schema.sql", DatabaseOptions::default()).unwrap();
/// for collection in db.collections().unwrap() {
///     println!("{collection}");
/// }
/// ```
pub struct Database {
    conn: Connection,
    schema: Option<Schema>,
    path: PathBuf,
}

impl Database {
    fn open_connection(path: &Path, options: DatabaseOptions) -> Result<Connection> {
        let flags = if options.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(path, flags).map_err(map_sqlite)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite)?;
        Ok(conn)
    }

    /// Opens an existing database file and introspects its schema.
    pub fn open(path: impl AsRef<Path>, options: DatabaseOptions) -> Result<Self> {
        let path = path.as_ref();
        let conn = Self::open_connection(path, options)?;
        let mut db = Self {
            conn,
            schema: None,
            path: path.to_path_buf(),
        };
        db.reload_schema()?;
        Ok(db)
    }

    /// Creates a database from an authored SQL schema file.
    ///
    /// The whole load fails on the first invalid or failing statement;
    /// the caller should discard the database file in that case.
    pub fn from_schema(
        db_path: impl AsRef<Path>,
        schema_path: impl AsRef<Path>,
        options: DatabaseOptions,
    ) -> Result<Self> {
        let sql = std::fs::read_to_string(schema_path.as_ref()).map_err(|e| {
            Error::from(e).with_context(schema_path.as_ref().display().to_string())
        })?;
        Self::from_schema_sql(db_path, &sql, options)
    }

    /// Creates a database from authored SQL held in memory.
    pub fn from_schema_sql(
        db_path: impl AsRef<Path>,
        sql: &str,
        options: DatabaseOptions,
    ) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Self::open_connection(path, options)?;
        loader::apply_sql(&conn, sql)?;
        let mut db = Self {
            conn,
            schema: None,
            path: path.to_path_buf(),
        };
        db.reload_schema()?;
        info!(path = %db.path.display(), "database created from schema");
        Ok(db)
    }

    /// Creates or opens a database and applies pending migrations from a
    /// versioned directory.
    pub fn from_migrations(
        db_path: impl AsRef<Path>,
        migrations_path: impl AsRef<Path>,
        options: DatabaseOptions,
    ) -> Result<Self> {
        let mut db = Self::open(db_path, options)?;
        db.migrate_up(migrations_path)?;
        Ok(db)
    }

    /// Applies pending migrations and rebuilds the schema model.
    pub fn migrate_up(&mut self, migrations_path: impl AsRef<Path>) -> Result<()> {
        migration::run(&self.conn, migrations_path.as_ref())?;
        self.reload_schema()
    }

    fn reload_schema(&mut self) -> Result<()> {
        let schema = loader::introspect(&self.conn)?;
        self.schema = if schema.tables().is_empty() {
            None
        } else {
            Some(schema)
        };
        Ok(())
    }

    /// Path the database was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` when the connection still answers a trivial query.
    pub fn is_healthy(&self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }

    /// The schema model, if one is loaded.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub(crate) fn require_schema(&self) -> Result<&Schema> {
        self.schema.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::NoSchemaLoaded, "no schema loaded for this database")
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Runs one SQL statement with positional [`Value`] parameters.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        executor::run(&self.conn, sql, params)
    }

    /// Rowid assigned by the most recent successful insert.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Rows affected by the most recent mutation.
    pub fn changes(&self) -> usize {
        self.conn.changes() as usize
    }

    /// Starts an explicit transaction.
    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN").map_err(map_sqlite)
    }

    /// Commits the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(map_sqlite)
    }

    /// Rolls back the open transaction.
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").map_err(map_sqlite)
    }

    pub(crate) fn savepoint(&self, name: &str) -> Result<()> {
        validate_identifier(name, "savepoint")?;
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(map_sqlite)
    }

    pub(crate) fn release_savepoint(&self, name: &str) -> Result<()> {
        validate_identifier(name, "savepoint")?;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {name}"))
            .map_err(map_sqlite)
    }

    pub(crate) fn rollback_savepoint(&self, name: &str) -> Result<()> {
        validate_identifier(name, "savepoint")?;
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .map_err(map_sqlite)
    }

    /// Runs `f` inside a named savepoint: released on success, rolled
    /// back (and released) on failure. Nests under any open transaction.
    pub(crate) fn with_savepoint<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        self.savepoint(name)?;
        match f(self) {
            Ok(value) => {
                self.release_savepoint(name)?;
                Ok(value)
            }
            Err(err) => {
                // Preserve the original failure even if cleanup fails.
                let _ = self.rollback_savepoint(name);
                let _ = self.release_savepoint(name);
                Err(err)
            }
        }
    }

    /// Stored schema version (`PRAGMA user_version`).
    pub fn current_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(map_sqlite)
    }

    /// Sets the stored schema version.
    pub fn set_version(&self, version: i64) -> Result<()> {
        self.conn
            .pragma_update(None, "user_version", version)
            .map_err(map_sqlite)
    }

    /// User-facing collections in catalog order.
    pub fn collections(&self) -> Result<Vec<String>> {
        Ok(self
            .require_schema()?
            .collections()
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Vector groups of a collection.
    pub fn vector_groups(&self, collection: &str) -> Result<Vec<String>> {
        let schema = self.require_schema()?;
        schema.main_table(collection)?;
        Ok(schema
            .vector_groups(collection)
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Set groups of a collection.
    pub fn set_groups(&self, collection: &str) -> Result<Vec<String>> {
        let schema = self.require_schema()?;
        schema.main_table(collection)?;
        Ok(schema
            .set_groups(collection)
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// Time-series groups of a collection.
    pub fn time_series_groups(&self, collection: &str) -> Result<Vec<String>> {
        let schema = self.require_schema()?;
        schema.main_table(collection)?;
        Ok(schema
            .time_series_groups(collection)
            .into_iter()
            .map(String::from)
            .collect())
    }

    /// `true` when `column` is a scalar attribute of `collection`.
    pub fn is_scalar_column(&self, collection: &str, column: &str) -> bool {
        self.attribute_is(collection, column, |role| {
            matches!(role, quiver_core::AttributeRole::Scalar)
        })
    }

    /// `true` when `column` is a vector attribute of `collection`.
    pub fn is_vector_column(&self, collection: &str, column: &str) -> bool {
        self.attribute_is(collection, column, |role| {
            matches!(role, quiver_core::AttributeRole::Vector { .. })
        })
    }

    /// `true` when `column` is a set attribute of `collection`.
    pub fn is_set_column(&self, collection: &str, column: &str) -> bool {
        self.attribute_is(collection, column, |role| {
            matches!(role, quiver_core::AttributeRole::Set { .. })
        })
    }

    fn attribute_is(
        &self,
        collection: &str,
        column: &str,
        predicate: impl Fn(&quiver_core::AttributeRole) -> bool,
    ) -> bool {
        self.schema
            .as_ref()
            .and_then(|s| s.classify_attribute(collection, column).ok())
            .map(|role| predicate(&role))
            .unwrap_or(false)
    }

    /// All element ids of a collection in insertion order.
    pub fn element_ids(&self, collection: &str) -> Result<Vec<i64>> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        let result = executor::run(
            &self.conn,
            &format!("SELECT id FROM {} ORDER BY id", main.name),
            &[],
        )?;
        result
            .rows
            .into_iter()
            .map(|row| row[0].as_integer())
            .collect()
    }

    /// Names of the tables (vector role) belonging to a collection.
    pub fn vector_tables(&self, collection: &str) -> Result<Vec<String>> {
        self.tables_with_role(collection, |r| matches!(r, TableRole::Vector { .. }))
    }

    /// Names of the tables (set role) belonging to a collection.
    pub fn set_tables(&self, collection: &str) -> Result<Vec<String>> {
        self.tables_with_role(collection, |r| matches!(r, TableRole::Set { .. }))
    }

    /// Names of the tables (time-series role) belonging to a collection.
    pub fn time_series_tables(&self, collection: &str) -> Result<Vec<String>> {
        self.tables_with_role(collection, |r| matches!(r, TableRole::TimeSeries { .. }))
    }

    fn tables_with_role(
        &self,
        collection: &str,
        filter: impl Fn(&TableRole) -> bool,
    ) -> Result<Vec<String>> {
        let schema = self.require_schema()?;
        schema.main_table(collection)?;
        Ok(schema
            .tables()
            .iter()
            .filter(|t| filter(&t.role) && t.role.collection() == collection)
            .map(|t| t.name.clone())
            .collect())
    }

    /// Columns of a table in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let schema = self.require_schema()?;
        let table = schema.table(table).ok_or_else(|| {
            Error::new(
                ErrorKind::CollectionNotFound,
                format!("no table '{table}' in schema"),
            )
        })?;
        Ok(table.columns.iter().map(|c| c.name.clone()).collect())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("schema_loaded", &self.schema.is_some())
            .finish()
    }
}
