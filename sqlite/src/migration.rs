//! Versioned migration runner.
//!
//! A migrations directory holds subdirectories named by positive decimal
//! integers; anything else is ignored. Every version above the stored
//! `user_version` is applied in ascending order: its `.sql` files run in
//! lexicographic order through the schema validator and executor, and
//! the version bump lands in the same transaction. The first failing
//! version is rolled back and halts the sequence.

use std::path::{Path, PathBuf};

use quiver_core::{Error, Result};
use rusqlite::Connection;
use tracing::info;

use crate::error::map_sqlite;
use crate::loader;

#[derive(Debug)]
struct MigrationStep {
    version: i64,
    path: PathBuf,
}

fn scan(dir: &Path) -> Result<Vec<MigrationStep>> {
    let mut steps = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::from(e).with_context(dir.display().to_string()))?;
    for entry in entries {
        let entry = entry.map_err(Error::from)?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        match name.parse::<i64>() {
            Ok(version) if version > 0 => steps.push(MigrationStep {
                version,
                path: entry.path(),
            }),
            _ => {}
        }
    }
    steps.sort_by_key(|s| s.version);
    Ok(steps)
}

fn sql_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| Error::from(e).with_context(dir.display().to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort();
    Ok(files)
}

fn apply_step(conn: &Connection, step: &MigrationStep) -> Result<()> {
    conn.execute_batch("BEGIN").map_err(map_sqlite)?;

    let result = (|| -> Result<()> {
        for file in sql_files(&step.path)? {
            let sql = std::fs::read_to_string(&file)
                .map_err(|e| Error::from(e).with_context(file.display().to_string()))?;
            loader::apply_sql(conn, &sql)?;
        }
        conn.execute_batch(&format!("PRAGMA user_version = {}", step.version))
            .map_err(map_sqlite)
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT").map_err(map_sqlite)?;
            info!(version = step.version, "applied migration");
            Ok(())
        }
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(err)
        }
    }
}

/// Applies every pending migration version in ascending order.
pub(crate) fn run(conn: &Connection, dir: &Path) -> Result<()> {
    let current: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(map_sqlite)?;

    for step in scan(dir)?.into_iter().filter(|s| s.version > current) {
        apply_step(conn, &step)?;
    }
    Ok(())
}
