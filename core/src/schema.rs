//! In-memory schema model.
//!
//! A [`Schema`] describes the tables of one database: their columns,
//! declared types, constraints, foreign keys, and the [`TableRole`] each
//! table plays. Roles are encoded in table names:
//!
//! - `Plant`: a [`Main`](TableRole::Main) collection table
//! - `Plant_vector_costs`: ordered vector group `costs` on `Plant`
//! - `Plant_set_units`: unordered set group `units` on `Plant`
//! - `Plant_time_series_generation`: time-series group on `Plant`
//! - `Plant_time_series_files`: one-row file-path sidecar for `Plant`
//!
//! The model is pure data: it is built by the loader after the DDL has
//! been applied, and is read-only for the lifetime of a database handle.

use crate::error::{Error, ErrorKind, Result};

/// Reserved main-table name that is not a user-facing collection and is
/// exempt from the `label` column requirement.
pub const RESERVED_CONFIGURATION: &str = "Configuration";

/// Columns that identify rows rather than carry attribute data.
pub const IDENTITY_COLUMNS: [&str; 3] = ["id", "vector_index", "label"];

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
    /// Opaque byte string.
    Blob,
}

impl ColumnType {
    /// Parses a declared SQL type name.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidType`] for anything outside the constrained
    /// dialect.
    pub fn parse(declared: &str) -> Result<Self> {
        match declared.trim().to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Ok(ColumnType::Integer),
            "REAL" => Ok(ColumnType::Real),
            "TEXT" => Ok(ColumnType::Text),
            "BLOB" => Ok(ColumnType::Blob),
            other => Err(Error::new(
                ErrorKind::InvalidType,
                format!("unsupported column type '{other}'"),
            )),
        }
    }

    /// The SQL spelling of the type.
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// Referential action of a foreign key clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FkAction {
    /// `NO ACTION` (SQLite default).
    #[default]
    NoAction,
    /// `RESTRICT`.
    Restrict,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
    /// `CASCADE`.
    Cascade,
}

impl FkAction {
    /// Parses the action as reported by `PRAGMA foreign_key_list`.
    pub fn parse(action: &str) -> Self {
        match action.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => FkAction::Cascade,
            "RESTRICT" => FkAction::Restrict,
            "SET NULL" => FkAction::SetNull,
            "SET DEFAULT" => FkAction::SetDefault,
            _ => FkAction::NoAction,
        }
    }
}

/// A foreign-key edge from one column to a target table's column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing column on the owning table.
    pub column: String,
    /// Referenced table.
    pub target_table: String,
    /// Referenced column (always `id` in this dialect).
    pub target_column: String,
    /// Action on parent delete.
    pub on_delete: FkAction,
    /// Action on parent update.
    pub on_update: FkAction,
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared storage type.
    pub column_type: ColumnType,
    /// `NOT NULL` present.
    pub not_null: bool,
    /// Column-level `UNIQUE` present.
    pub unique: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// `DEFAULT` literal as written, if any.
    pub default: Option<String>,
    /// `CHECK` expression as written, if any (passed through verbatim).
    pub check: Option<String>,
}

/// Role a table plays, derived from its name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRole {
    /// Row-per-element collection table.
    Main {
        /// Collection name (the table name itself).
        collection: String,
    },
    /// Ordered side table `<collection>_vector_<group>`.
    Vector {
        /// Owning collection.
        collection: String,
        /// Group name.
        group: String,
    },
    /// Unordered side table `<collection>_set_<group>`.
    Set {
        /// Owning collection.
        collection: String,
        /// Group name.
        group: String,
    },
    /// Time-series side table `<collection>_time_series_<group>`.
    TimeSeries {
        /// Owning collection.
        collection: String,
        /// Group name.
        group: String,
    },
    /// One-row sidecar `<collection>_time_series_files`.
    TimeSeriesFiles {
        /// Owning collection.
        collection: String,
    },
}

impl TableRole {
    /// Classifies a table by its name pattern.
    ///
    /// The earliest role marker in the name wins, so
    /// `Plant_vector_cost_set` is a vector table of group `cost_set`.
    pub fn classify(name: &str) -> TableRole {
        if let Some(collection) = name.strip_suffix("_time_series_files") {
            if !collection.is_empty() {
                return TableRole::TimeSeriesFiles {
                    collection: collection.to_string(),
                };
            }
        }

        let markers: [(&str, fn(String, String) -> TableRole); 3] = [
            ("_time_series_", |collection, group| TableRole::TimeSeries { collection, group }),
            ("_vector_", |collection, group| TableRole::Vector { collection, group }),
            ("_set_", |collection, group| TableRole::Set { collection, group }),
        ];

        let mut earliest: Option<(usize, &str, fn(String, String) -> TableRole)> = None;
        for (marker, make) in markers {
            if let Some(pos) = name.find(marker) {
                if pos > 0 && pos + marker.len() < name.len() {
                    match earliest {
                        Some((best, _, _)) if best <= pos => {}
                        _ => earliest = Some((pos, marker, make)),
                    }
                }
            }
        }

        if let Some((pos, marker, make)) = earliest {
            let collection = name[..pos].to_string();
            let group = name[pos + marker.len()..].to_string();
            return make(collection, group);
        }

        TableRole::Main {
            collection: name.to_string(),
        }
    }

    /// The owning collection of the table.
    pub fn collection(&self) -> &str {
        match self {
            TableRole::Main { collection }
            | TableRole::Vector { collection, .. }
            | TableRole::Set { collection, .. }
            | TableRole::TimeSeries { collection, .. }
            | TableRole::TimeSeriesFiles { collection } => collection,
        }
    }

    /// The group name for side tables, `None` for main and sidecar tables.
    pub fn group(&self) -> Option<&str> {
        match self {
            TableRole::Vector { group, .. }
            | TableRole::Set { group, .. }
            | TableRole::TimeSeries { group, .. } => Some(group),
            _ => None,
        }
    }
}

/// Where an attribute name resolves on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeRole {
    /// Column on the main table.
    Scalar,
    /// Column on a vector side table.
    Vector {
        /// Owning group.
        group: String,
    },
    /// Column on a set side table.
    Set {
        /// Owning group.
        group: String,
    },
    /// Column on a time-series side table.
    TimeSeries {
        /// Owning group.
        group: String,
    },
    /// Column on the `_time_series_files` sidecar.
    TimeSeriesFile,
}

/// One table of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table name as stored in the catalog.
    pub name: String,
    /// Role derived from the name pattern.
    pub role: TableRole,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Foreign-key edges declared on the table.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up the foreign key whose referencing column is `column`.
    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Columns that carry attribute data: everything except `id`,
    /// `vector_index`, and `label`.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| !IDENTITY_COLUMNS.contains(&c.name.as_str()))
    }
}

/// Returns `true` when `name` is a valid table/column identifier: starts
/// with a letter or underscore, continues with alphanumerics or
/// underscores, at most 128 bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates an identifier before it is spliced into SQL.
///
/// # Errors
///
/// [`ErrorKind::InvalidIdentifier`] naming the offending identifier.
pub fn validate_identifier(name: &str, context: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidIdentifier,
            format!("invalid identifier '{name}'"),
        )
        .with_context(context))
    }
}

/// The full schema of one database.
///
/// # Examples
///
/// ```
/// use quiver_core::{Schema, Table, TableRole, Column, ColumnType, AttributeRole};
///
/// let plant = Table {
///     name: "Plant".into(),
///     role: TableRole::classify("Plant"),
///     columns: vec![Column {
///         name: "capacity".into(),
///         column_type: ColumnType::Real,
///         not_null: true,
///         unique: false,
///         primary_key: false,
///         default: None,
///         check: None,
///     }],
///     foreign_keys: vec![],
/// };
/// let schema = Schema::new(vec![plant]);
///
/// assert_eq!(schema.collections(), vec!["Plant"]);
/// assert_eq!(
///     schema.classify_attribute("Plant", "capacity").unwrap(),
///     AttributeRole::Scalar,
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    tables: Vec<Table>,
}

impl Schema {
    /// Builds a schema from tables in catalog order.
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    /// All tables in catalog order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Looks up a table by name (SQLite identifiers are case-insensitive).
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The main table of a collection.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::CollectionNotFound`] when the table is missing or is
    /// not a main table.
    pub fn main_table(&self, collection: &str) -> Result<&Table> {
        self.table(collection)
            .filter(|t| matches!(t.role, TableRole::Main { .. }))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::CollectionNotFound,
                    format!("no collection '{collection}' in schema"),
                )
                .with_context(collection)
            })
    }

    /// User-facing collections: main tables excluding the reserved
    /// `Configuration` table and `_files` sidecars.
    pub fn collections(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| matches!(t.role, TableRole::Main { .. }))
            .filter(|t| !t.name.eq_ignore_ascii_case(RESERVED_CONFIGURATION))
            .filter(|t| !t.name.ends_with("_files"))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Side tables of `collection` matching `filter`, in catalog order.
    fn side_tables(&self, collection: &str, filter: impl Fn(&TableRole) -> bool) -> Vec<&Table> {
        self.tables
            .iter()
            .filter(|t| filter(&t.role) && t.role.collection() == collection)
            .collect()
    }

    /// Vector groups declared for a collection, in catalog order.
    pub fn vector_groups(&self, collection: &str) -> Vec<&str> {
        self.side_tables(collection, |r| matches!(r, TableRole::Vector { .. }))
            .into_iter()
            .filter_map(|t| t.role.group())
            .collect()
    }

    /// Set groups declared for a collection, in catalog order.
    pub fn set_groups(&self, collection: &str) -> Vec<&str> {
        self.side_tables(collection, |r| matches!(r, TableRole::Set { .. }))
            .into_iter()
            .filter_map(|t| t.role.group())
            .collect()
    }

    /// Time-series groups declared for a collection, in catalog order.
    pub fn time_series_groups(&self, collection: &str) -> Vec<&str> {
        self.side_tables(collection, |r| matches!(r, TableRole::TimeSeries { .. }))
            .into_iter()
            .filter_map(|t| t.role.group())
            .collect()
    }

    /// Composes the vector table name for a group.
    pub fn vector_table_name(collection: &str, group: &str) -> String {
        format!("{collection}_vector_{group}")
    }

    /// Composes the set table name for a group.
    pub fn set_table_name(collection: &str, group: &str) -> String {
        format!("{collection}_set_{group}")
    }

    /// Composes the time-series table name for a group.
    pub fn time_series_table_name(collection: &str, group: &str) -> String {
        format!("{collection}_time_series_{group}")
    }

    /// Composes the time-series file sidecar name.
    pub fn time_series_files_table_name(collection: &str) -> String {
        format!("{collection}_time_series_files")
    }

    /// Resolves an attribute name on a collection to its role.
    ///
    /// Main-table columns win over side-table columns; the loader has
    /// already rejected schemas where both declare the same name.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::CollectionNotFound`] when the collection is unknown,
    /// [`ErrorKind::AttributeNotFound`] when no table declares the name.
    pub fn classify_attribute(&self, collection: &str, attribute: &str) -> Result<AttributeRole> {
        let main = self.main_table(collection)?;
        if main.column(attribute).is_some() {
            return Ok(AttributeRole::Scalar);
        }

        for table in self.side_tables(collection, |r| !matches!(r, TableRole::Main { .. })) {
            let is_value_column = table
                .value_columns()
                .any(|c| c.name == attribute);
            if !is_value_column {
                continue;
            }
            return Ok(match &table.role {
                TableRole::Vector { group, .. } => AttributeRole::Vector { group: group.clone() },
                TableRole::Set { group, .. } => AttributeRole::Set { group: group.clone() },
                TableRole::TimeSeries { group, .. } => {
                    AttributeRole::TimeSeries { group: group.clone() }
                }
                TableRole::TimeSeriesFiles { .. } => AttributeRole::TimeSeriesFile,
                TableRole::Main { .. } => unreachable!(),
            });
        }

        Err(Error::new(
            ErrorKind::AttributeNotFound,
            format!("collection '{collection}' has no attribute '{attribute}'"),
        )
        .with_context(attribute))
    }

    /// Finds the side table owning `attribute` for the given role filter.
    pub fn side_table_for_attribute(
        &self,
        collection: &str,
        attribute: &str,
        filter: impl Fn(&TableRole) -> bool,
    ) -> Option<&Table> {
        self.side_tables(collection, filter)
            .into_iter()
            .find(|t| t.value_columns().any(|c| c.name == attribute))
    }

    /// Declared element type of a vector attribute.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::AttributeNotFound`] when `attribute` is not a value
    /// column of `<collection>_vector_<group>`.
    pub fn vector_element_type(
        &self,
        collection: &str,
        group: &str,
        attribute: &str,
    ) -> Result<ColumnType> {
        let table_name = Self::vector_table_name(collection, group);
        self.table(&table_name)
            .and_then(|t| t.column(attribute))
            .map(|c| c.column_type)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("no vector attribute '{attribute}' in group '{group}'"),
                )
                .with_context(collection)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, column_type: ColumnType) -> Column {
        Column {
            name: name.to_string(),
            column_type,
            not_null: false,
            unique: false,
            primary_key: false,
            default: None,
            check: None,
        }
    }

    fn table(name: &str, columns: Vec<Column>) -> Table {
        Table {
            name: name.to_string(),
            role: TableRole::classify(name),
            columns,
            foreign_keys: vec![],
        }
    }

    fn sample_schema() -> Schema {
        Schema::new(vec![
            table(
                "Plant",
                vec![
                    column("id", ColumnType::Integer),
                    column("label", ColumnType::Text),
                    column("capacity", ColumnType::Real),
                ],
            ),
            table(
                "Plant_vector_costs",
                vec![
                    column("id", ColumnType::Integer),
                    column("vector_index", ColumnType::Integer),
                    column("costs", ColumnType::Real),
                ],
            ),
            table(
                "Plant_set_units",
                vec![
                    column("id", ColumnType::Integer),
                    column("unit_name", ColumnType::Text),
                ],
            ),
            table(
                "Plant_time_series_generation",
                vec![
                    column("id", ColumnType::Integer),
                    column("date_time", ColumnType::Text),
                    column("generation", ColumnType::Real),
                ],
            ),
            table("Plant_time_series_files", vec![column("generation", ColumnType::Text)]),
            table("Configuration", vec![column("id", ColumnType::Integer)]),
        ])
    }

    #[test]
    fn classify_table_roles() {
        assert_eq!(
            TableRole::classify("Plant"),
            TableRole::Main { collection: "Plant".into() }
        );
        assert_eq!(
            TableRole::classify("Plant_vector_costs"),
            TableRole::Vector { collection: "Plant".into(), group: "costs".into() }
        );
        assert_eq!(
            TableRole::classify("Plant_set_units"),
            TableRole::Set { collection: "Plant".into(), group: "units".into() }
        );
        assert_eq!(
            TableRole::classify("Plant_time_series_generation"),
            TableRole::TimeSeries { collection: "Plant".into(), group: "generation".into() }
        );
        assert_eq!(
            TableRole::classify("Plant_time_series_files"),
            TableRole::TimeSeriesFiles { collection: "Plant".into() }
        );
    }

    #[test]
    fn earliest_marker_wins() {
        assert_eq!(
            TableRole::classify("A_vector_b_set_c"),
            TableRole::Vector { collection: "A".into(), group: "b_set_c".into() }
        );
    }

    #[test]
    fn collections_exclude_reserved_and_sidecars() {
        assert_eq!(sample_schema().collections(), vec!["Plant"]);
    }

    #[test]
    fn attribute_classification() {
        let schema = sample_schema();
        assert_eq!(
            schema.classify_attribute("Plant", "capacity").unwrap(),
            AttributeRole::Scalar
        );
        assert_eq!(
            schema.classify_attribute("Plant", "costs").unwrap(),
            AttributeRole::Vector { group: "costs".into() }
        );
        assert_eq!(
            schema.classify_attribute("Plant", "unit_name").unwrap(),
            AttributeRole::Set { group: "units".into() }
        );
        assert_eq!(
            schema.classify_attribute("Plant", "date_time").unwrap(),
            AttributeRole::TimeSeries { group: "generation".into() }
        );
        let err = schema.classify_attribute("Plant", "missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeNotFound);
        let err = schema.classify_attribute("Ghost", "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CollectionNotFound);
    }

    #[test]
    fn time_series_file_attribute() {
        let schema = sample_schema();
        // "generation" exists both as a time-series value column and as a
        // sidecar column; the time-series table is earlier in the catalog.
        assert_eq!(
            schema.classify_attribute("Plant", "generation").unwrap(),
            AttributeRole::TimeSeries { group: "generation".into() }
        );
    }

    #[test]
    fn vector_element_type_lookup() {
        let schema = sample_schema();
        assert_eq!(
            schema.vector_element_type("Plant", "costs", "costs").unwrap(),
            ColumnType::Real
        );
        assert!(schema.vector_element_type("Plant", "costs", "other").is_err());
    }

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("Plant"));
        assert!(is_valid_identifier("_hidden"));
        assert!(is_valid_identifier("a1_b2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("bad-name"));
        assert!(!is_valid_identifier("drop;--"));
    }
}
