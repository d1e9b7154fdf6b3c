//! Deterministic diffing of collections across two databases.
//!
//! Every category yields human-readable sentences naming the collection,
//! element, attribute or group, and both sides' values. Output is sorted,
//! so two runs over the same pair of databases are byte-identical, and
//! swapping the operands swaps only the "side A"/"side B" values.
//!
//! Reals compare bit-for-bit; two NaNs compare equal (see
//! [`Value`] equality).

use std::collections::BTreeSet;

use quiver_core::{Result, Table, TableRole, Value};

use crate::database::Database;

fn fmt_values(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn fmt_row(row: &[(String, Value)]) -> String {
    let items: Vec<String> = row.iter().map(|(n, v)| format!("{n}={v}")).collect();
    format!("{{{}}}", items.join(", "))
}

fn fmt_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("null")
}

fn sorted_labels(db: &Database, collection: &str) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    for value in db.read_scalar(collection, "label")? {
        labels.push(value.as_text()?.to_string());
    }
    labels.sort();
    Ok(labels)
}

/// Labels present on both sides plus one sentence per one-sided label.
fn split_labels(
    collection: &str,
    a: &[String],
    b: &[String],
    diffs: &mut Vec<String>,
) -> Vec<String> {
    let set_a: BTreeSet<&String> = a.iter().collect();
    let set_b: BTreeSet<&String> = b.iter().collect();
    for label in set_a.difference(&set_b) {
        diffs.push(format!("collection '{collection}': element '{label}' only in side A"));
    }
    for label in set_b.difference(&set_a) {
        diffs.push(format!("collection '{collection}': element '{label}' only in side B"));
    }
    set_a.intersection(&set_b).map(|l| (*l).to_string()).collect()
}

/// Non-FK value columns of a table: the comparable parameters.
fn parameter_columns(table: &Table) -> Vec<String> {
    table
        .value_columns()
        .filter(|c| table.foreign_key(&c.name).is_none())
        .map(|c| c.name.clone())
        .collect()
}

/// FK value columns of a table: the comparable relations.
fn relation_columns(table: &Table) -> Vec<String> {
    table
        .value_columns()
        .filter(|c| table.foreign_key(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect()
}

impl Database {
    /// Diffs the scalar (main-table, non-FK) attributes of a collection.
    ///
    /// Elements present on only one side are reported here, once.
    pub fn compare_scalar_parameters(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        let main_a = self.require_schema()?.main_table(collection)?;
        let main_b = other.require_schema()?.main_table(collection)?;

        let mut diffs = Vec::new();
        let labels_a = sorted_labels(self, collection)?;
        let labels_b = sorted_labels(other, collection)?;
        let common = split_labels(collection, &labels_a, &labels_b, &mut diffs);

        let columns_a = parameter_columns(main_a);
        let columns_b = parameter_columns(main_b);
        for column in &columns_a {
            if !columns_b.contains(column) {
                diffs.push(format!(
                    "collection '{collection}': attribute '{column}' only in side A schema"
                ));
            }
        }
        for column in &columns_b {
            if !columns_a.contains(column) {
                diffs.push(format!(
                    "collection '{collection}': attribute '{column}' only in side B schema"
                ));
            }
        }

        for label in &common {
            for column in columns_a.iter().filter(|c| columns_b.contains(c)) {
                let value_a = self.read_scalar_by_label(collection, column, label)?;
                let value_b = other.read_scalar_by_label(collection, column, label)?;
                if value_a != value_b {
                    diffs.push(format!(
                        "collection '{collection}' element '{label}' attribute '{column}': \
                         side A has {value_a}, side B has {value_b}"
                    ));
                }
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    /// Diffs the vector (non-FK) attributes of a collection.
    pub fn compare_vector_parameters(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        self.compare_group_parameters(other, collection, GroupKind::Vector)
    }

    /// Diffs the set (non-FK) attributes of a collection, as multisets.
    pub fn compare_set_parameters(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        self.compare_group_parameters(other, collection, GroupKind::Set)
    }

    fn compare_group_parameters(
        &self,
        other: &Database,
        collection: &str,
        kind: GroupKind,
    ) -> Result<Vec<String>> {
        let schema_a = self.require_schema()?;
        let schema_b = other.require_schema()?;
        schema_a.main_table(collection)?;
        schema_b.main_table(collection)?;

        let mut diffs = Vec::new();
        let labels_a = sorted_labels(self, collection)?;
        let labels_b = sorted_labels(other, collection)?;
        let common: BTreeSet<String> = labels_a
            .iter()
            .filter(|l| labels_b.contains(l))
            .cloned()
            .collect();

        let tables_a: Vec<&Table> = schema_a
            .tables()
            .iter()
            .filter(|t| kind.matches(&t.role) && t.role.collection() == collection)
            .collect();

        for table in tables_a {
            for column in parameter_columns(table) {
                let on_b = schema_b
                    .side_table_for_attribute(collection, &column, |r| kind.matches(r))
                    .is_some();
                if !on_b {
                    diffs.push(format!(
                        "collection '{collection}': attribute '{column}' only in side A schema"
                    ));
                    continue;
                }
                for label in &common {
                    let (value_a, value_b) = match kind {
                        GroupKind::Vector => (
                            self.read_vector_by_label(collection, &column, label)?,
                            other.read_vector_by_label(collection, &column, label)?,
                        ),
                        GroupKind::Set => {
                            let mut a = self.read_set_by_label(collection, &column, label)?;
                            let mut b = other.read_set_by_label(collection, &column, label)?;
                            sort_multiset(&mut a);
                            sort_multiset(&mut b);
                            (a, b)
                        }
                    };
                    if value_a != value_b {
                        diffs.push(format!(
                            "collection '{collection}' element '{label}' attribute '{column}': \
                             side A has {}, side B has {}",
                            fmt_values(&value_a),
                            fmt_values(&value_b)
                        ));
                    }
                }
            }
        }

        for table in schema_b
            .tables()
            .iter()
            .filter(|t| kind.matches(&t.role) && t.role.collection() == collection)
        {
            for column in parameter_columns(table) {
                let on_a = schema_a
                    .side_table_for_attribute(collection, &column, |r| kind.matches(r))
                    .is_some();
                if !on_a {
                    diffs.push(format!(
                        "collection '{collection}': attribute '{column}' only in side B schema"
                    ));
                }
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    /// Diffs the scalar FK relations of a collection as resolved labels.
    pub fn compare_scalar_relations(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        let main_a = self.require_schema()?.main_table(collection)?;
        let main_b = other.require_schema()?.main_table(collection)?;

        let mut diffs = Vec::new();
        let labels_a = sorted_labels(self, collection)?;
        let labels_b = sorted_labels(other, collection)?;
        let common: Vec<String> = labels_a.iter().filter(|l| labels_b.contains(l)).cloned().collect();

        for relation in relation_columns(main_a) {
            let Some(fk) = main_a.foreign_key(&relation) else { continue };
            if main_b.foreign_key(&relation).is_none() {
                diffs.push(format!(
                    "collection '{collection}': relation '{relation}' only in side A schema"
                ));
                continue;
            }
            let target = fk.target_table.clone();
            for label in &common {
                let value_a = self.scalar_relation_label(collection, &target, &relation, label)?;
                let value_b = other.scalar_relation_label(collection, &target, &relation, label)?;
                if value_a != value_b {
                    diffs.push(format!(
                        "collection '{collection}' element '{label}' relation '{relation}': \
                         side A has {}, side B has {}",
                        fmt_opt(&value_a),
                        fmt_opt(&value_b)
                    ));
                }
            }
        }

        for relation in relation_columns(main_b) {
            if main_a.foreign_key(&relation).is_none() {
                diffs.push(format!(
                    "collection '{collection}': relation '{relation}' only in side B schema"
                ));
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    fn scalar_relation_label(
        &self,
        collection: &str,
        target: &str,
        relation: &str,
        label: &str,
    ) -> Result<Option<String>> {
        let main = self.require_schema()?.main_table(collection)?;
        let row = crate::executor::run_single(
            self.conn(),
            &format!(
                "SELECT t.label FROM {main} m LEFT JOIN {target} t ON m.{relation} = t.id \
                 WHERE m.label = ?",
                main = main.name,
            ),
            &[Value::Text(label.to_string())],
        )?;
        Ok(match row {
            Some(mut cells) => match cells.swap_remove(0) {
                Value::Text(label) => Some(label),
                _ => None,
            },
            None => None,
        })
    }

    /// Diffs the vector FK relations of a collection as ordered label
    /// lists.
    pub fn compare_vector_relations(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        self.compare_group_relations(other, collection, GroupKind::Vector)
    }

    /// Diffs the set FK relations of a collection as label multisets.
    pub fn compare_set_relations(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        self.compare_group_relations(other, collection, GroupKind::Set)
    }

    fn compare_group_relations(
        &self,
        other: &Database,
        collection: &str,
        kind: GroupKind,
    ) -> Result<Vec<String>> {
        let schema_a = self.require_schema()?;
        let schema_b = other.require_schema()?;
        schema_a.main_table(collection)?;
        schema_b.main_table(collection)?;

        let mut diffs = Vec::new();
        let labels_a = sorted_labels(self, collection)?;
        let labels_b = sorted_labels(other, collection)?;
        let common: Vec<String> = labels_a.iter().filter(|l| labels_b.contains(l)).cloned().collect();

        let tables_a: Vec<&Table> = schema_a
            .tables()
            .iter()
            .filter(|t| kind.matches(&t.role) && t.role.collection() == collection)
            .collect();

        for table in tables_a {
            for relation in relation_columns(table) {
                let Some(fk) = table.foreign_key(&relation) else { continue };
                let on_b = schema_b
                    .side_table_for_attribute(collection, &relation, |r| kind.matches(r))
                    .map(|t| t.foreign_key(&relation).is_some())
                    .unwrap_or(false);
                if !on_b {
                    diffs.push(format!(
                        "collection '{collection}': relation '{relation}' only in side A schema"
                    ));
                    continue;
                }
                let target = fk.target_table.clone();
                for label in &common {
                    let reader = |db: &Database| -> Result<Vec<Vec<String>>> {
                        match kind {
                            GroupKind::Vector => {
                                db.read_vector_relations(collection, &target, &relation)
                            }
                            GroupKind::Set => db.read_set_relations(collection, &target, &relation),
                        }
                    };
                    let mut value_a = self.relation_for_label(collection, label, reader(self)?)?;
                    let mut value_b = other.relation_for_label(collection, label, reader(other)?)?;
                    if matches!(kind, GroupKind::Set) {
                        value_a.sort();
                        value_b.sort();
                    }
                    if value_a != value_b {
                        diffs.push(format!(
                            "collection '{collection}' element '{label}' relation '{relation}': \
                             side A has [{}], side B has [{}]",
                            value_a.join(", "),
                            value_b.join(", ")
                        ));
                    }
                }
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    /// Picks the per-label list out of an insertion-ordered relation read.
    fn relation_for_label(
        &self,
        collection: &str,
        label: &str,
        per_element: Vec<Vec<String>>,
    ) -> Result<Vec<String>> {
        let ids = self.element_ids(collection)?;
        let id = self.get_element_id(collection, label)?;
        let slot = ids.iter().position(|i| *i == id);
        Ok(slot.and_then(|s| per_element.into_iter().nth(s)).unwrap_or_default())
    }

    /// Diffs time-series groups row by row.
    pub fn compare_time_series(&self, other: &Database, collection: &str) -> Result<Vec<String>> {
        let schema_a = self.require_schema()?;
        let schema_b = other.require_schema()?;
        schema_a.main_table(collection)?;
        schema_b.main_table(collection)?;

        let mut diffs = Vec::new();
        let labels_a = sorted_labels(self, collection)?;
        let labels_b = sorted_labels(other, collection)?;
        let common: Vec<String> = labels_a.iter().filter(|l| labels_b.contains(l)).cloned().collect();

        let groups_a: Vec<String> =
            schema_a.time_series_groups(collection).into_iter().map(String::from).collect();
        let groups_b: Vec<String> =
            schema_b.time_series_groups(collection).into_iter().map(String::from).collect();

        for group in &groups_a {
            if !groups_b.contains(group) {
                diffs.push(format!(
                    "collection '{collection}': time series group '{group}' only in side A schema"
                ));
                continue;
            }
            for label in &common {
                let rows_a =
                    self.read_element_time_series_group(collection, label.as_str(), group, &[])?;
                let rows_b =
                    other.read_element_time_series_group(collection, label.as_str(), group, &[])?;
                if rows_a.len() != rows_b.len() {
                    diffs.push(format!(
                        "collection '{collection}' element '{label}' time series '{group}': \
                         side A has {} rows, side B has {} rows",
                        rows_a.len(),
                        rows_b.len()
                    ));
                    continue;
                }
                for (index, (row_a, row_b)) in rows_a.iter().zip(&rows_b).enumerate() {
                    if row_a != row_b {
                        diffs.push(format!(
                            "collection '{collection}' element '{label}' time series '{group}' \
                             row {index}: side A has {}, side B has {}",
                            fmt_row(row_a),
                            fmt_row(row_b)
                        ));
                    }
                }
            }
        }

        for group in &groups_b {
            if !groups_a.contains(group) {
                diffs.push(format!(
                    "collection '{collection}': time series group '{group}' only in side B schema"
                ));
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    /// Diffs the stored time-series file paths of a collection.
    pub fn compare_time_series_files(
        &self,
        other: &Database,
        collection: &str,
    ) -> Result<Vec<String>> {
        let schema_a = self.require_schema()?;
        let schema_b = other.require_schema()?;
        schema_a.main_table(collection)?;
        schema_b.main_table(collection)?;

        let mut diffs = Vec::new();
        let files_name = quiver_core::Schema::time_series_files_table_name(collection);
        let table_a = schema_a.table(&files_name);
        let table_b = schema_b.table(&files_name);

        let (Some(table_a), Some(table_b)) = (table_a, table_b) else {
            if table_a.is_some() {
                diffs.push(format!(
                    "collection '{collection}': time series files table only in side A schema"
                ));
            }
            if table_b.is_some() {
                diffs.push(format!(
                    "collection '{collection}': time series files table only in side B schema"
                ));
            }
            return Ok(diffs);
        };

        for column in table_a.value_columns() {
            if table_b.column(&column.name).is_none() {
                diffs.push(format!(
                    "collection '{collection}': time series file parameter '{}' \
                     only in side A schema",
                    column.name
                ));
                continue;
            }
            let path_a = self.read_time_series_file(collection, &column.name)?;
            let path_b = other.read_time_series_file(collection, &column.name)?;
            if path_a != path_b {
                diffs.push(format!(
                    "collection '{collection}' time series file '{}': side A has {}, side B has {}",
                    column.name,
                    fmt_opt(&path_a),
                    fmt_opt(&path_b)
                ));
            }
        }
        for column in table_b.value_columns() {
            if table_a.column(&column.name).is_none() {
                diffs.push(format!(
                    "collection '{collection}': time series file parameter '{}' \
                     only in side B schema",
                    column.name
                ));
            }
        }

        diffs.sort();
        Ok(diffs)
    }

    /// Runs every category over the intersection of collections and
    /// returns one merged, sorted diff list.
    pub fn compare_databases(&self, other: &Database) -> Result<Vec<String>> {
        let collections_a: BTreeSet<String> =
            self.collections()?.into_iter().collect();
        let collections_b: BTreeSet<String> =
            other.collections()?.into_iter().collect();

        let mut diffs = Vec::new();
        for collection in collections_a.difference(&collections_b) {
            diffs.push(format!("collection '{collection}': only in side A"));
        }
        for collection in collections_b.difference(&collections_a) {
            diffs.push(format!("collection '{collection}': only in side B"));
        }

        for collection in collections_a.intersection(&collections_b) {
            diffs.extend(self.compare_scalar_parameters(other, collection)?);
            diffs.extend(self.compare_vector_parameters(other, collection)?);
            diffs.extend(self.compare_set_parameters(other, collection)?);
            diffs.extend(self.compare_scalar_relations(other, collection)?);
            diffs.extend(self.compare_vector_relations(other, collection)?);
            diffs.extend(self.compare_set_relations(other, collection)?);
            diffs.extend(self.compare_time_series(other, collection)?);
            diffs.extend(self.compare_time_series_files(other, collection)?);
        }

        diffs.sort();
        Ok(diffs)
    }
}

#[derive(Clone, Copy)]
enum GroupKind {
    Vector,
    Set,
}

impl GroupKind {
    fn matches(self, role: &TableRole) -> bool {
        match self {
            GroupKind::Vector => matches!(role, TableRole::Vector { .. }),
            GroupKind::Set => matches!(role, TableRole::Set { .. }),
        }
    }
}

/// Orders a multiset of values by their display form; ties cannot change
/// the multiset.
fn sort_multiset(values: &mut [Value]) {
    values.sort_by_key(|v| v.to_string());
}
