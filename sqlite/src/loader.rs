//! Schema ingestion: statement splitting, structural validation,
//! application, and catalog introspection.
//!
//! The pipeline is the same for a single schema file and for each
//! migration step:
//!
//! 1. split the authored SQL into statements (quote-aware),
//! 2. validate the structural rules of the dialect,
//! 3. execute every statement,
//! 4. rebuild the in-memory [`Schema`] from the catalog.
//!
//! Validation failures are [`ErrorKind::InvalidSchema`] and name the
//! offending table or clause.

use std::sync::LazyLock;

use quiver_core::{
    Column, ColumnType, Error, ErrorKind, FkAction, ForeignKey, Result, Schema, Table, TableRole,
    RESERVED_CONFIGURATION,
};
use regex::Regex;
use rusqlite::Connection;
use tracing::debug;

use crate::error::map_sqlite;

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?["`\[]?(\w+)["`\]]?\s*\((.*)\)"#)
        .expect("static regex must compile")
});

static FOREIGN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)FOREIGN\s+KEY\s*\([^)]*\)\s*REFERENCES\s+\w+\s*\(\s*\w+\s*\)((?:\s+ON\s+(?:DELETE|UPDATE)\s+(?:CASCADE|RESTRICT|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION))*)",
    )
    .expect("static regex must compile")
});

static ON_DELETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)ON\s+DELETE\s+(CASCADE|RESTRICT|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .expect("static regex must compile")
});

static ON_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)ON\s+UPDATE\s+(CASCADE|RESTRICT|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .expect("static regex must compile")
});

static VECTOR_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvector_index\s+INTEGER\b").expect("static regex must compile")
});

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blabel\b").expect("static regex must compile"));

static UNIQUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bUNIQUE\b").expect("static regex must compile"));

/// Splits authored SQL into statements. A statement ends at `;` outside
/// any `'…'` or `"…"` literal; a backslash escapes the following quote.
pub(crate) fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut string_char = '\0';
    let mut prev = '\0';

    for c in sql.chars() {
        if (c == '\'' || c == '"') && prev != '\\' {
            if !in_string {
                in_string = true;
                string_char = c;
            } else if c == string_char {
                in_string = false;
            }
            current.push(c);
        } else if c == ';' && !in_string {
            let stmt = current.trim();
            if !stmt.is_empty() {
                statements.push(stmt.to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
        prev = c;
    }

    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }

    statements
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a table body into column/constraint definitions at top-level
/// commas (nested parentheses respected).
fn split_definitions(body: &str) -> Vec<String> {
    let mut defs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                let def = current.trim();
                if !def.is_empty() {
                    defs.push(def.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let def = current.trim();
    if !def.is_empty() {
        defs.push(def.to_string());
    }

    defs
}

const CONSTRAINT_PREFIXES: [&str; 5] =
    ["FOREIGN KEY", "PRIMARY KEY", "UNIQUE", "CHECK", "CONSTRAINT"];

fn is_table_constraint(def: &str) -> bool {
    let upper = normalize_whitespace(def).to_ascii_uppercase();
    CONSTRAINT_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// Value-column names declared in a table body, lowercased; `id`,
/// `vector_index`, and `label` are skipped.
fn attribute_columns(body: &str) -> Vec<String> {
    split_definitions(body)
        .into_iter()
        .filter(|def| !is_table_constraint(def))
        .filter_map(|def| {
            def.split_whitespace()
                .next()
                .map(|name| name.trim_matches(['"', '`', '[', ']']).to_ascii_lowercase())
        })
        .filter(|name| name != "id" && name != "vector_index" && name != "label")
        .collect()
}

fn parse_create_table(statement: &str) -> Option<(String, String)> {
    CREATE_TABLE_RE
        .captures(statement)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

fn invalid(message: String) -> Error {
    Error::new(ErrorKind::InvalidSchema, message)
}

fn check_foreign_key_actions(statement: &str, table: &str) -> Result<()> {
    for caps in FOREIGN_KEY_RE.captures_iter(statement) {
        let actions = &caps[1];
        let on_delete = ON_DELETE_RE
            .captures(actions)
            .map(|c| normalize_whitespace(&c[1]).to_ascii_uppercase());
        let on_update = ON_UPDATE_RE
            .captures(actions)
            .map(|c| normalize_whitespace(&c[1]).to_ascii_uppercase());

        if on_delete.as_deref() == Some("CASCADE") && on_update.as_deref() != Some("CASCADE") {
            return Err(invalid(format!(
                "table '{table}': foreign key with ON DELETE CASCADE requires ON UPDATE CASCADE, \
                 got {}",
                on_update.as_deref().unwrap_or("no ON UPDATE clause")
            ))
            .with_context(table));
        }
    }
    Ok(())
}

/// Enforces the structural rules of the dialect over authored SQL.
///
/// Rules: FK-action pairing, `vector_index INTEGER` on vector tables,
/// attribute-name disjointness between a collection and its vector/set
/// tables, and a `label` column on every non-reserved collection table.
pub(crate) fn validate_schema_sql(sql: &str) -> Result<()> {
    let mut tables: Vec<(String, String)> = Vec::new();

    for statement in split_statements(sql) {
        if let Some((name, body)) = parse_create_table(&statement) {
            check_foreign_key_actions(&statement, &name)?;
            tables.push((name, body));
        } else {
            check_foreign_key_actions(&statement, "<unnamed>")?;
        }
    }

    for (name, body) in &tables {
        let role = TableRole::classify(name);

        if matches!(role, TableRole::Vector { .. }) && !VECTOR_INDEX_RE.is_match(body) {
            return Err(invalid(format!(
                "vector table '{name}' must declare a 'vector_index INTEGER' column"
            ))
            .with_context(name.as_str()));
        }

        let exempt = name.eq_ignore_ascii_case(RESERVED_CONFIGURATION)
            || name.to_ascii_lowercase().ends_with("_files");
        if matches!(role, TableRole::Main { .. }) && !exempt && !LABEL_RE.is_match(body) {
            return Err(invalid(format!(
                "collection table '{name}' must declare a 'label' column"
            ))
            .with_context(name.as_str()));
        }
    }

    for (name, body) in &tables {
        let role = TableRole::classify(name);
        let parent = match &role {
            TableRole::Vector { collection, .. } | TableRole::Set { collection, .. } => collection,
            _ => continue,
        };
        let Some((_, parent_body)) = tables.iter().find(|(n, _)| n == parent) else {
            continue;
        };
        let parent_columns = attribute_columns(parent_body);
        for column in attribute_columns(body) {
            if parent_columns.contains(&column) {
                return Err(invalid(format!(
                    "attribute '{column}' declared in both '{parent}' and '{name}'"
                ))
                .with_context(name.as_str()));
            }
        }
    }

    Ok(())
}

/// Validates and applies authored SQL, one statement at a time.
///
/// Any failing statement aborts the load; the caller decides what to do
/// with the database file.
pub(crate) fn apply_sql(conn: &Connection, sql: &str) -> Result<()> {
    validate_schema_sql(sql)?;
    for statement in split_statements(sql) {
        debug!(statement = statement.as_str(), "applying schema statement");
        conn.execute_batch(&statement).map_err(|e| {
            let err = map_sqlite(e);
            Error::new(
                err.kind,
                format!("failed to apply statement '{}': {}", statement, err.message),
            )
        })?;
    }
    Ok(())
}

/// Extracts the `CHECK (...)` expression attached to a column definition,
/// parentheses balanced.
fn extract_check(def: &str) -> Option<String> {
    let upper = def.to_ascii_uppercase();
    let start = upper.find("CHECK")?;
    let open = def[start..].find('(')? + start;
    let mut depth = 0usize;
    for (i, c) in def[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(def[open + 1..open + i].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Per-column details that `PRAGMA table_info` does not expose, recovered
/// from the stored `CREATE TABLE` text.
fn column_extras(create_sql: &str, column: &str) -> (bool, Option<String>) {
    let Some((_, body)) = parse_create_table(create_sql) else {
        return (false, None);
    };
    for def in split_definitions(&body) {
        if is_table_constraint(&def) {
            continue;
        }
        let Some(first) = def.split_whitespace().next() else {
            continue;
        };
        if first.trim_matches(['"', '`', '[', ']']).eq_ignore_ascii_case(column) {
            return (UNIQUE_RE.is_match(&def), extract_check(&def));
        }
    }
    (false, None)
}

/// Rebuilds the in-memory schema model from the catalog of an open
/// database.
pub(crate) fn introspect(conn: &Connection) -> Result<Schema> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .map_err(map_sqlite)?;

    let catalog: Vec<(String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
        })
        .map_err(map_sqlite)?
        .collect::<std::result::Result<_, _>>()
        .map_err(map_sqlite)?;

    let mut tables = Vec::with_capacity(catalog.len());
    for (name, create_sql) in catalog {
        let mut columns = Vec::new();
        conn.pragma(None, "table_info", &name, |row| {
            let column_name: String = row.get("name")?;
            let declared: String = row.get("type")?;
            let not_null: bool = row.get("notnull")?;
            let default: Option<String> = row.get("dflt_value")?;
            let pk: i64 = row.get("pk")?;
            columns.push((column_name, declared, not_null, default, pk > 0));
            Ok(())
        })
        .map_err(map_sqlite)?;

        let mut parsed = Vec::with_capacity(columns.len());
        for (column_name, declared, not_null, default, primary_key) in columns {
            let column_type = ColumnType::parse(&declared).map_err(|_| {
                invalid(format!(
                    "table '{name}': column '{column_name}' has unsupported type '{declared}'"
                ))
                .with_context(name.as_str())
            })?;
            let (unique, check) = column_extras(&create_sql, &column_name);
            parsed.push(Column {
                name: column_name,
                column_type,
                not_null,
                unique,
                primary_key,
                default,
                check,
            });
        }

        let mut foreign_keys = Vec::new();
        conn.pragma(None, "foreign_key_list", &name, |row| {
            let target_table: String = row.get("table")?;
            let column: String = row.get("from")?;
            let target_column: Option<String> = row.get("to")?;
            let on_update: String = row.get("on_update")?;
            let on_delete: String = row.get("on_delete")?;
            foreign_keys.push(ForeignKey {
                column,
                target_table,
                target_column: target_column.unwrap_or_else(|| "id".to_string()),
                on_delete: FkAction::parse(&on_delete),
                on_update: FkAction::parse(&on_update),
            });
            Ok(())
        })
        .map_err(map_sqlite)?;

        tables.push(Table {
            role: TableRole::classify(&name),
            name,
            columns: parsed,
            foreign_keys,
        });
    }

    Ok(Schema::new(tables))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_quoted_semicolons() {
        let statements = split_statements(
            "INSERT INTO t VALUES ('a;b');\nCREATE TABLE x (id INTEGER);\n",
        );
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn split_respects_escaped_quotes() {
        let statements = split_statements(r"INSERT INTO t VALUES ('a\';b');SELECT 1;");
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn split_keeps_trailing_statement_without_semicolon() {
        let statements = split_statements("SELECT 1");
        assert_eq!(statements, ["SELECT 1"]);
    }

    #[test]
    fn cascade_delete_requires_cascade_update() {
        let sql = "CREATE TABLE Child_vector_x (
            id INTEGER,
            vector_index INTEGER NOT NULL,
            v REAL,
            FOREIGN KEY(id) REFERENCES Child(id) ON DELETE CASCADE ON UPDATE SET NULL
        );";
        let err = validate_schema_sql(sql).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSchema);
        assert!(err.message.contains("ON UPDATE"));
    }

    #[test]
    fn cascade_delete_without_update_clause_is_rejected() {
        let sql = "CREATE TABLE Child_vector_x (
            id INTEGER,
            vector_index INTEGER NOT NULL,
            v REAL,
            FOREIGN KEY(id) REFERENCES Child(id) ON DELETE CASCADE
        );";
        assert!(validate_schema_sql(sql).is_err());
    }

    #[test]
    fn matched_cascade_actions_pass() {
        let sql = "CREATE TABLE Child (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL);
        CREATE TABLE Child_vector_x (
            id INTEGER,
            vector_index INTEGER NOT NULL,
            v REAL,
            FOREIGN KEY(id) REFERENCES Child(id) ON DELETE CASCADE ON UPDATE CASCADE
        );";
        validate_schema_sql(sql).unwrap();
    }

    #[test]
    fn vector_table_requires_vector_index() {
        let sql = "CREATE TABLE Plant (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL);
        CREATE TABLE Plant_vector_costs (id INTEGER, costs REAL);";
        let err = validate_schema_sql(sql).unwrap_err();
        assert!(err.message.contains("vector_index"));
    }

    #[test]
    fn duplicate_attribute_between_main_and_side_table() {
        let sql = "CREATE TABLE Plant (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL, costs REAL);
        CREATE TABLE Plant_vector_costs (id INTEGER, vector_index INTEGER, costs REAL);";
        let err = validate_schema_sql(sql).unwrap_err();
        assert!(err.message.contains("costs"));
    }

    #[test]
    fn collection_without_label_is_rejected() {
        let err = validate_schema_sql("CREATE TABLE Plant (id INTEGER PRIMARY KEY);").unwrap_err();
        assert!(err.message.contains("label"));
    }

    #[test]
    fn configuration_and_files_tables_skip_label_rule() {
        validate_schema_sql(
            "CREATE TABLE Configuration (id INTEGER PRIMARY KEY, version TEXT);
             CREATE TABLE Plant (id INTEGER PRIMARY KEY, label TEXT UNIQUE NOT NULL);
             CREATE TABLE Plant_time_series_files (generation TEXT);",
        )
        .unwrap();
    }

    #[test]
    fn introspection_builds_full_model() {
        let conn = Connection::open_in_memory().unwrap();
        apply_sql(
            &conn,
            "PRAGMA foreign_keys = ON;
             CREATE TABLE Plant (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 label TEXT UNIQUE NOT NULL,
                 capacity REAL NOT NULL DEFAULT 0 CHECK(capacity >= 0)
             ) STRICT;
             CREATE TABLE Plant_vector_costs (
                 id INTEGER,
                 vector_index INTEGER NOT NULL,
                 costs REAL NOT NULL,
                 PRIMARY KEY (id, vector_index),
                 FOREIGN KEY(id) REFERENCES Plant(id) ON DELETE CASCADE ON UPDATE CASCADE
             ) STRICT;",
        )
        .unwrap();

        let schema = introspect(&conn).unwrap();
        assert_eq!(schema.collections(), vec!["Plant"]);

        let plant = schema.table("Plant").unwrap();
        let capacity = plant.column("capacity").unwrap();
        assert_eq!(capacity.column_type, ColumnType::Real);
        assert!(capacity.not_null);
        assert_eq!(capacity.default.as_deref(), Some("0"));
        assert_eq!(capacity.check.as_deref(), Some("capacity >= 0"));

        let label = plant.column("label").unwrap();
        assert!(label.unique);
        assert!(label.not_null);

        let costs = schema.table("Plant_vector_costs").unwrap();
        let fk = costs.foreign_key("id").unwrap();
        assert_eq!(fk.target_table, "Plant");
        assert_eq!(fk.target_column, "id");
        assert_eq!(fk.on_delete, FkAction::Cascade);
        assert_eq!(fk.on_update, FkAction::Cascade);
    }
}
