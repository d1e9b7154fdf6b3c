//! Scoped transaction and savepoint guards.
//!
//! A guard resolves its scope on every exit path: commit only when
//! [`commit`](TransactionGuard::commit) was called, rollback otherwise,
//! including on panic unwind via `Drop`.

use quiver_core::Result;

use crate::database::Database;

/// RAII transaction over a database handle.
///
/// # Examples
///
/// ```no_run
/// use quiver_sqlite::{Database, DatabaseOptions, TransactionGuard};
///
/// let db = Database::from_schema("p.db", "schema.sql", DatabaseOptions::default()).unwrap();
/// let txn = TransactionGuard::begin(&db).unwrap();
/// db.execute("INSERT INTO Plant (label) VALUES ('P1')", &[]).unwrap();
/// txn.commit().unwrap();
/// ```
pub struct TransactionGuard<'a> {
    db: &'a Database,
    active: bool,
}

impl<'a> TransactionGuard<'a> {
    /// Begins a transaction.
    pub fn begin(db: &'a Database) -> Result<Self> {
        db.begin_transaction()?;
        Ok(Self { db, active: true })
    }

    /// Commits; the guard no longer rolls back on drop.
    pub fn commit(mut self) -> Result<()> {
        self.active = false;
        self.db.commit()
    }

    /// Rolls back explicitly.
    pub fn rollback(mut self) -> Result<()> {
        self.active = false;
        self.db.rollback()
    }

    /// `true` until the transaction is committed or rolled back.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.db.rollback();
        }
    }
}

/// Named savepoint inside a transaction.
///
/// Releasing discards the local rollback target; rolling back undoes only
/// the work since the savepoint was created. An unreleased guard rolls
/// back on drop.
pub struct SavepointGuard<'a> {
    db: &'a Database,
    name: String,
    resolved: bool,
}

impl<'a> SavepointGuard<'a> {
    /// Creates a savepoint with the given name (must be a valid
    /// identifier, unique within the transaction).
    pub fn new(db: &'a Database, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        db.savepoint(&name)?;
        Ok(Self {
            db,
            name,
            resolved: false,
        })
    }

    /// Makes the savepoint's changes permanent within the transaction.
    pub fn release(mut self) -> Result<()> {
        self.resolved = true;
        self.db.release_savepoint(&self.name)
    }

    /// Undoes all changes since the savepoint was created.
    pub fn rollback(mut self) -> Result<()> {
        self.resolved = true;
        self.db.rollback_savepoint(&self.name)?;
        self.db.release_savepoint(&self.name)
    }

    /// The savepoint name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SavepointGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            let _ = self.db.rollback_savepoint(&self.name);
            let _ = self.db.release_savepoint(&self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseOptions;
    use quiver_core::Value;

    fn db() -> Database {
        Database::from_schema_sql(
            ":memory:",
            "CREATE TABLE Item (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT UNIQUE NOT NULL);",
            DatabaseOptions::default(),
        )
        .unwrap()
    }

    fn insert(db: &Database, label: &str) {
        db.execute(
            "INSERT INTO Item (label) VALUES (?)",
            &[Value::Text(label.into())],
        )
        .unwrap();
    }

    fn count(db: &Database) -> i64 {
        db.execute("SELECT COUNT(*) FROM Item", &[])
            .unwrap()
            .scalar()
            .unwrap()
            .as_integer()
            .unwrap()
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let db = db();
        {
            let _txn = TransactionGuard::begin(&db).unwrap();
            insert(&db, "a");
            assert_eq!(count(&db), 1);
        }
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn committed_transaction_persists() {
        let db = db();
        let txn = TransactionGuard::begin(&db).unwrap();
        insert(&db, "a");
        txn.commit().unwrap();
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn savepoint_rollback_is_local() {
        let db = db();
        let txn = TransactionGuard::begin(&db).unwrap();
        insert(&db, "a");

        let sp = SavepointGuard::new(&db, "sp1").unwrap();
        insert(&db, "b");
        sp.rollback().unwrap();

        insert(&db, "c");
        txn.commit().unwrap();

        let labels = db.execute("SELECT label FROM Item ORDER BY label", &[]).unwrap();
        let labels: Vec<_> = labels
            .rows
            .iter()
            .map(|r| r[0].as_text().unwrap().to_string())
            .collect();
        assert_eq!(labels, ["a", "c"]);
    }

    #[test]
    fn invalid_savepoint_name_is_rejected() {
        let db = db();
        assert!(SavepointGuard::new(&db, "bad name; --").is_err());
    }
}
