//! Foreign-key relations between collections.
//!
//! A relation is an FK column: on the main table (scalar relation) or on
//! a vector/set side table (vector/set relation). Writes address both
//! sides by label and canonicalise to ids; reads resolve stored ids back
//! to the target collection's labels.

use quiver_core::{Error, ErrorKind, ForeignKey, Result, Table, TableRole, Value};

use crate::database::Database;
use crate::executor;

impl Database {
    /// Checks that `relation` is an FK column of `table` pointing at
    /// `target_collection(id)`.
    fn relation_fk<'t>(
        &self,
        table: &'t Table,
        target_collection: &str,
        relation: &str,
    ) -> Result<&'t ForeignKey> {
        if table.column(relation).is_none() {
            return Err(Error::new(
                ErrorKind::AttributeNotFound,
                format!("table '{}' has no column '{relation}'", table.name),
            )
            .with_context(relation.to_string()));
        }
        let fk = table.foreign_key(relation).ok_or_else(|| {
            Error::new(
                ErrorKind::TypeMismatch,
                format!(
                    "column '{relation}' on '{}' has no foreign key; cannot use it as a relation",
                    table.name
                ),
            )
            .with_context(relation.to_string())
        })?;
        if !fk.target_table.eq_ignore_ascii_case(target_collection) {
            return Err(Error::new(
                ErrorKind::TypeMismatch,
                format!(
                    "column '{relation}' references '{}', not '{target_collection}'",
                    fk.target_table
                ),
            )
            .with_context(relation.to_string()));
        }
        Ok(fk)
    }

    fn child_id(&self, target_collection: &str, label: &str) -> Result<i64> {
        self.get_element_id(target_collection, label).map_err(|e| {
            if e.kind == ErrorKind::ElementNotFound {
                Error::new(
                    ErrorKind::ForeignKeyViolation,
                    format!("no element labelled '{label}' in '{target_collection}'"),
                )
                .with_context(label.to_string())
            } else {
                e
            }
        })
    }

    /// Points a scalar relation of `parent_label` at `child_label`.
    ///
    /// This is an UPDATE of the FK column, so repeating the call with the
    /// same arguments leaves the database unchanged.
    pub fn set_scalar_relation(
        &self,
        collection: &str,
        target_collection: &str,
        parent_label: &str,
        child_label: &str,
        relation: &str,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        self.relation_fk(main, target_collection, relation)?;

        let parent = self.get_element_id(collection, parent_label)?;
        let child = self.child_id(target_collection, child_label)?;

        executor::run_update(
            self.conn(),
            &format!("UPDATE {} SET {relation} = ? WHERE id = ?", main.name),
            &[Value::Integer(child), Value::Integer(parent)],
        )?;
        Ok(())
    }

    /// Replaces a vector relation with one row per child label, in the
    /// given order.
    pub fn set_vector_relation(
        &self,
        collection: &str,
        target_collection: &str,
        parent_label: &str,
        child_labels: &[&str],
        relation: &str,
    ) -> Result<()> {
        let parent = self.get_element_id(collection, parent_label)?;
        let mut children = Vec::with_capacity(child_labels.len());
        for label in child_labels {
            children.push(self.child_id(target_collection, label)?);
        }
        self.set_vector_relation_by_id(collection, target_collection, parent, &children, relation)
    }

    /// Replaces a vector relation addressing both sides by id.
    ///
    /// Rows shared with other vector attributes of the group are updated
    /// in place; only a change in child count adds or removes rows, and
    /// removal trims the tail indexes.
    pub fn set_vector_relation_by_id(
        &self,
        collection: &str,
        target_collection: &str,
        parent_id: i64,
        child_ids: &[i64],
        relation: &str,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = schema
            .side_table_for_attribute(collection, relation, |r| {
                matches!(r, TableRole::Vector { .. })
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no vector relation '{relation}'"),
                )
                .with_context(relation.to_string())
            })?;
        self.relation_fk(table, target_collection, relation)?;

        let stored = executor::run_single(
            self.conn(),
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?", table.name),
            &[Value::Integer(parent_id)],
        )?
        .and_then(|row| row[0].as_integer().ok())
        .unwrap_or(0) as usize;

        self.with_savepoint("quiver_vector_relation", |db| {
            let update_sql = format!(
                "UPDATE {} SET {relation} = ? WHERE id = ? AND vector_index = ?",
                table.name
            );
            let insert_sql = format!(
                "INSERT INTO {} (id, vector_index, {relation}) VALUES (?, ?, ?)",
                table.name
            );
            for (index, child) in child_ids.iter().enumerate() {
                let sql = if index < stored { &update_sql } else { &insert_sql };
                let params = if index < stored {
                    [
                        Value::Integer(*child),
                        Value::Integer(parent_id),
                        Value::Integer(index as i64),
                    ]
                } else {
                    [
                        Value::Integer(parent_id),
                        Value::Integer(index as i64),
                        Value::Integer(*child),
                    ]
                };
                executor::run_update(db.conn(), sql, &params)?;
            }
            if child_ids.len() < stored {
                executor::run_update(
                    db.conn(),
                    &format!(
                        "DELETE FROM {} WHERE id = ? AND vector_index >= ?",
                        table.name
                    ),
                    &[Value::Integer(parent_id), Value::Integer(child_ids.len() as i64)],
                )?;
            }
            Ok(())
        })
    }

    /// Replaces a set relation with one row per child label.
    ///
    /// Rows shared with other set attributes of the group are rewritten
    /// in place; their other columns are left as they are.
    pub fn set_set_relation(
        &self,
        collection: &str,
        target_collection: &str,
        parent_label: &str,
        child_labels: &[&str],
        relation: &str,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = schema
            .side_table_for_attribute(collection, relation, |r| matches!(r, TableRole::Set { .. }))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no set relation '{relation}'"),
                )
                .with_context(relation.to_string())
            })?;
        self.relation_fk(table, target_collection, relation)?;

        let parent = self.get_element_id(collection, parent_label)?;
        let mut children = Vec::with_capacity(child_labels.len());
        for label in child_labels {
            children.push(Value::Integer(self.child_id(target_collection, label)?));
        }

        self.overwrite_set_column(&table.name, relation, parent, &children, "quiver_set_relation")
    }

    /// Resolved target labels of a scalar relation, one entry per element
    /// in insertion order; `None` where the relation is unset.
    pub fn read_scalar_relations(
        &self,
        collection: &str,
        target_collection: &str,
        relation: &str,
    ) -> Result<Vec<Option<String>>> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        let fk = self.relation_fk(main, target_collection, relation)?;

        let result = executor::run(
            self.conn(),
            &format!(
                "SELECT t.label FROM {main} m LEFT JOIN {target} t ON m.{relation} = t.id \
                 ORDER BY m.id",
                main = main.name,
                target = fk.target_table,
            ),
            &[],
        )?;
        result
            .rows
            .into_iter()
            .map(|mut row| match row.swap_remove(0) {
                Value::Null => Ok(None),
                Value::Text(label) => Ok(Some(label)),
                other => Err(Error::internal(format!(
                    "label column yielded {}",
                    other.type_name()
                ))),
            })
            .collect()
    }

    /// Resolved target labels of a vector relation, one ordered list per
    /// element in insertion order.
    pub fn read_vector_relations(
        &self,
        collection: &str,
        target_collection: &str,
        relation: &str,
    ) -> Result<Vec<Vec<String>>> {
        let schema = self.require_schema()?;
        let table = schema
            .side_table_for_attribute(collection, relation, |r| {
                matches!(r, TableRole::Vector { .. })
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no vector relation '{relation}'"),
                )
                .with_context(relation.to_string())
            })?;
        let fk = self.relation_fk(table, target_collection, relation)?;
        self.read_relation_labels(
            collection,
            &table.name,
            &fk.target_table,
            relation,
            "v.id, v.vector_index",
        )
    }

    /// Resolved target labels of a set relation, one list per element in
    /// insertion order.
    pub fn read_set_relations(
        &self,
        collection: &str,
        target_collection: &str,
        relation: &str,
    ) -> Result<Vec<Vec<String>>> {
        let schema = self.require_schema()?;
        let table = schema
            .side_table_for_attribute(collection, relation, |r| matches!(r, TableRole::Set { .. }))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no set relation '{relation}'"),
                )
                .with_context(relation.to_string())
            })?;
        let fk = self.relation_fk(table, target_collection, relation)?;
        self.read_relation_labels(
            collection,
            &table.name,
            &fk.target_table,
            relation,
            "v.id, v.rowid",
        )
    }

    fn read_relation_labels(
        &self,
        collection: &str,
        table: &str,
        target: &str,
        relation: &str,
        order: &str,
    ) -> Result<Vec<Vec<String>>> {
        let ids = self.element_ids(collection)?;
        let result = executor::run(
            self.conn(),
            &format!(
                "SELECT v.id, t.label FROM {table} v JOIN {target} t ON v.{relation} = t.id \
                 ORDER BY {order}"
            ),
            &[],
        )?;

        let index_of: std::collections::HashMap<i64, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut buckets: Vec<Vec<String>> = vec![Vec::new(); ids.len()];
        for row in result.rows {
            let id = row[0].as_integer()?;
            let label = row[1].as_text()?.to_string();
            if let Some(&slot) = index_of.get(&id) {
                buckets[slot].push(label);
            }
        }
        Ok(buckets)
    }
}
