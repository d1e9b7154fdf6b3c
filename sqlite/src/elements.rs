//! Element engine: create, read, update, and delete operations.
//!
//! Writes classify every builder field against the schema, resolve
//! label-valued foreign keys to ids, type-check each value, and run all
//! per-table inserts inside one savepoint so a failing step leaves no
//! partial element behind. Reads canonicalise an [`ElementRef`] to the
//! rowid first, then issue typed SELECTs per table.

use quiver_core::{
    validate_identifier, AttributeRole, Element, ElementRef, Error, ErrorKind, Result, Schema,
    Table, TableRole, TimeSeries, Value,
};
use tracing::debug;

use crate::database::Database;
use crate::executor;
use crate::validator::{validate_value, TypeValidator};

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Columns and row-aligned values of one side-table group, ready to
/// insert.
struct GroupRows {
    table: String,
    columns: Vec<(String, Vec<Value>)>,
}

impl GroupRows {
    fn row_count(&self) -> Result<usize> {
        let mut rows = None;
        for (name, values) in &self.columns {
            match rows {
                None => rows = Some(values.len()),
                Some(n) if n != values.len() => {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!(
                            "attribute '{name}' has {} values, other attributes of '{}' have {n}",
                            values.len(),
                            self.table
                        ),
                    )
                    .with_context(self.table.clone()))
                }
                Some(_) => {}
            }
        }
        Ok(rows.unwrap_or(0))
    }
}

impl Database {
    /// Resolves an element reference to its rowid.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::ElementNotFound`] when a label does not resolve.
    pub fn element_id(&self, collection: &str, element: ElementRef<'_>) -> Result<i64> {
        match element {
            ElementRef::Id(id) => Ok(id),
            ElementRef::Label(label) => self.get_element_id(collection, label),
        }
    }

    /// Looks up an element's id by its label.
    pub fn get_element_id(&self, collection: &str, label: &str) -> Result<i64> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        if main.column("label").is_none() {
            return Err(Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no label column"),
            )
            .with_context(collection));
        }

        let row = executor::run_single(
            self.conn(),
            &format!("SELECT id FROM {} WHERE label = ?", main.name),
            &[Value::Text(label.to_string())],
        )?;
        match row {
            Some(cells) => cells[0].as_integer(),
            None => Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("no element labelled '{label}' in '{collection}'"),
            )
            .with_context(label)),
        }
    }

    /// Creates an element and returns its id.
    ///
    /// All main, vector, set, and time-series rows are written inside one
    /// savepoint; any failing step rolls the whole write back.
    pub fn create_element(&self, collection: &str, element: &Element) -> Result<i64> {
        let schema = self.require_schema()?;
        validate_identifier(collection, "collection")?;
        let main = schema.main_table(collection)?;

        if element.is_empty() {
            return Err(Error::new(
                ErrorKind::EmptyElement,
                format!("element for '{collection}' has no attributes"),
            )
            .with_context(collection));
        }

        for (i, (name, _)) in element.fields().iter().enumerate() {
            if element.fields()[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::new(
                    ErrorKind::InvalidValue,
                    format!("attribute '{name}' supplied more than once"),
                )
                .with_context(name.clone()));
            }
        }

        let validator = TypeValidator::new(schema);
        let mut main_columns: Vec<(String, Value)> = Vec::new();
        let mut vector_groups: Vec<GroupRows> = Vec::new();
        let mut set_groups: Vec<GroupRows> = Vec::new();

        for (name, value) in element.fields() {
            validate_identifier(name, "attribute")?;
            match schema.classify_attribute(collection, name)? {
                AttributeRole::Scalar => {
                    if value.is_vector() {
                        return Err(Error::new(
                            ErrorKind::TypeMismatch,
                            format!("scalar attribute '{name}' cannot take a vector value"),
                        )
                        .with_context(name.clone()));
                    }
                    let resolved = self.resolve_fk_scalar(main, name, value.clone())?;
                    validator.validate_scalar(&main.name, name, &resolved)?;
                    main_columns.push((name.clone(), resolved));
                }
                AttributeRole::Vector { group } => {
                    let table_name = Schema::vector_table_name(collection, &group);
                    self.bucket_group_value(
                        schema,
                        &table_name,
                        name,
                        value,
                        &mut vector_groups,
                    )?;
                }
                AttributeRole::Set { group } => {
                    let table_name = Schema::set_table_name(collection, &group);
                    self.bucket_group_value(schema, &table_name, name, value, &mut set_groups)?;
                }
                AttributeRole::TimeSeries { group } => {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!(
                            "attribute '{name}' belongs to time-series group '{group}'; \
                             attach it with a time-series block"
                        ),
                    )
                    .with_context(name.clone()));
                }
                AttributeRole::TimeSeriesFile => {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!("attribute '{name}' is a time-series file path; \
                                 use set_time_series_file"),
                    )
                    .with_context(name.clone()));
                }
            }
        }

        let mut time_series_rows: Vec<GroupRows> = Vec::new();
        for (group, block) in element.time_series() {
            time_series_rows.push(self.plan_time_series(schema, collection, group, block)?);
        }

        for group in vector_groups.iter().chain(&set_groups).chain(&time_series_rows) {
            group.row_count()?;
        }

        debug!(collection, "creating element");
        self.with_savepoint("quiver_create_element", |db| {
            let sql = if main_columns.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", main.name)
            } else {
                let names: Vec<&str> = main_columns.iter().map(|(n, _)| n.as_str()).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    main.name,
                    names.join(", "),
                    placeholders(names.len())
                )
            };
            let params: Vec<Value> = main_columns.iter().map(|(_, v)| v.clone()).collect();
            executor::run_update(db.conn(), &sql, &params)?;
            let new_id = db.last_insert_rowid();

            for group in &vector_groups {
                db.insert_group_rows(group, new_id, true)?;
            }
            for group in &set_groups {
                db.insert_group_rows(group, new_id, false)?;
            }
            for group in &time_series_rows {
                db.insert_group_rows(group, new_id, false)?;
            }

            Ok(new_id)
        })
    }

    /// Classifies one builder field into its side-table bucket, resolving
    /// FK labels and type-checking the whole vector.
    fn bucket_group_value(
        &self,
        schema: &Schema,
        table_name: &str,
        attribute: &str,
        value: &Value,
        buckets: &mut Vec<GroupRows>,
    ) -> Result<()> {
        if !value.is_vector() {
            return Err(Error::new(
                ErrorKind::TypeMismatch,
                format!("attribute '{attribute}' requires a vector value, got {}",
                    value.type_name()),
            )
            .with_context(attribute.to_string()));
        }

        let table = schema
            .table(table_name)
            .ok_or_else(|| Error::internal(format!("side table '{table_name}' vanished")))?;
        let resolved = self.resolve_fk_vector(table, attribute, value.clone())?;
        match &table.role {
            TableRole::Vector { collection, group } => {
                TypeValidator::new(schema).validate_vector(collection, group, attribute, &resolved)?;
            }
            _ => {
                let column = table
                    .column(attribute)
                    .ok_or_else(|| Error::internal(format!("column '{attribute}' vanished")))?;
                validate_value(
                    &format!("attribute '{attribute}'"),
                    column.column_type,
                    &resolved,
                )?;
            }
        }

        let elements = resolved.into_elements()?;
        let slot = match buckets.iter().position(|g| g.table == table_name) {
            Some(slot) => slot,
            None => {
                buckets.push(GroupRows {
                    table: table_name.to_string(),
                    columns: Vec::new(),
                });
                buckets.len() - 1
            }
        };
        buckets[slot].columns.push((attribute.to_string(), elements));
        Ok(())
    }

    /// Validates a time-series block against its table and returns the
    /// rows to insert.
    fn plan_time_series(
        &self,
        schema: &Schema,
        collection: &str,
        group: &str,
        block: &TimeSeries,
    ) -> Result<GroupRows> {
        let table_name = Schema::time_series_table_name(collection, group);
        let table = schema.table(&table_name).ok_or_else(|| {
            Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no time-series group '{group}'"),
            )
            .with_context(group.to_string())
        })?;

        if block.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                format!("time-series block for group '{group}' has no columns"),
            )
            .with_context(group.to_string()));
        }

        let mut columns = Vec::with_capacity(block.columns().len());
        for (name, values) in block.columns() {
            let column = table.column(name).ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("time-series group '{group}' has no column '{name}'"),
                )
                .with_context(name.clone())
            })?;
            for value in values {
                validate_value(&format!("column '{name}'"), column.column_type, value)?;
            }
            columns.push((name.clone(), values.clone()));
        }

        Ok(GroupRows {
            table: table_name,
            columns,
        })
    }

    /// Inserts the rows of one group for a freshly created element.
    fn insert_group_rows(&self, group: &GroupRows, id: i64, ordered: bool) -> Result<()> {
        let rows = group.row_count()?;
        if rows == 0 {
            return Ok(());
        }

        let mut names: Vec<&str> = vec!["id"];
        if ordered {
            names.push("vector_index");
        }
        names.extend(group.columns.iter().map(|(n, _)| n.as_str()));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            group.table,
            names.join(", "),
            placeholders(names.len())
        );

        for row in 0..rows {
            let mut params = Vec::with_capacity(names.len());
            params.push(Value::Integer(id));
            if ordered {
                params.push(Value::Integer(row as i64));
            }
            params.extend(group.columns.iter().map(|(_, values)| values[row].clone()));
            executor::run_update(self.conn(), &sql, &params)?;
        }
        Ok(())
    }

    /// Substitutes a label-valued text for the referenced id when the
    /// column is an integer foreign key.
    fn resolve_fk_scalar(&self, table: &Table, column: &str, value: Value) -> Result<Value> {
        let is_integer = table
            .column(column)
            .map(|c| c.column_type == quiver_core::ColumnType::Integer)
            .unwrap_or(false);
        let Value::Text(label) = &value else {
            return Ok(value);
        };
        if !is_integer {
            return Ok(value);
        }
        let Some(fk) = table.foreign_key(column) else {
            // Text into an integer column without a declared FK is left
            // for the validator to reject.
            return Ok(value);
        };
        let id = self.resolve_target_label(&fk.target_table, label, column)?;
        Ok(Value::Integer(id))
    }

    /// FK-by-label for a whole vector: a text vector on an integer FK
    /// column resolves element-wise to ids.
    fn resolve_fk_vector(&self, table: &Table, column: &str, value: Value) -> Result<Value> {
        let is_integer = table
            .column(column)
            .map(|c| c.column_type == quiver_core::ColumnType::Integer)
            .unwrap_or(false);
        let Value::TextVec(labels) = &value else {
            return Ok(value);
        };
        if !is_integer {
            return Ok(value);
        }
        let Some(fk) = table.foreign_key(column) else {
            return Ok(value);
        };
        let mut ids = Vec::with_capacity(labels.len());
        for label in labels {
            ids.push(self.resolve_target_label(&fk.target_table, label, column)?);
        }
        Ok(Value::IntVec(ids))
    }

    fn resolve_target_label(&self, target_table: &str, label: &str, column: &str) -> Result<i64> {
        let row = executor::run_single(
            self.conn(),
            &format!("SELECT id FROM {target_table} WHERE label = ?"),
            &[Value::Text(label.to_string())],
        )?;
        match row {
            Some(cells) => cells[0].as_integer(),
            None => Err(Error::new(
                ErrorKind::ForeignKeyViolation,
                format!("no element labelled '{label}' in '{target_table}' for column '{column}'"),
            )
            .with_context(label.to_string())),
        }
    }

    fn scalar_table<'s>(&self, schema: &'s Schema, collection: &str, attribute: &str) -> Result<&'s Table> {
        match schema.classify_attribute(collection, attribute)? {
            AttributeRole::Scalar => schema.main_table(collection),
            _ => Err(Error::new(
                ErrorKind::TypeMismatch,
                format!("attribute '{attribute}' is not a scalar attribute of '{collection}'"),
            )
            .with_context(attribute.to_string())),
        }
    }

    fn vector_table<'s>(&self, schema: &'s Schema, collection: &str, attribute: &str) -> Result<&'s Table> {
        schema
            .side_table_for_attribute(collection, attribute, |r| {
                matches!(r, TableRole::Vector { .. })
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no vector attribute '{attribute}'"),
                )
                .with_context(attribute.to_string())
            })
    }

    fn set_table<'s>(&self, schema: &'s Schema, collection: &str, attribute: &str) -> Result<&'s Table> {
        schema
            .side_table_for_attribute(collection, attribute, |r| matches!(r, TableRole::Set { .. }))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no set attribute '{attribute}'"),
                )
                .with_context(attribute.to_string())
            })
    }

    /// Reads a scalar attribute for every element, in insertion order.
    pub fn read_scalar(&self, collection: &str, attribute: &str) -> Result<Vec<Value>> {
        let schema = self.require_schema()?;
        let main = self.scalar_table(schema, collection, attribute)?;
        let result = executor::run(
            self.conn(),
            &format!("SELECT {attribute} FROM {} ORDER BY id", main.name),
            &[],
        )?;
        Ok(result.rows.into_iter().map(|mut r| r.swap_remove(0)).collect())
    }

    /// Reads a scalar attribute of one element by label.
    pub fn read_scalar_by_label(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
    ) -> Result<Value> {
        let schema = self.require_schema()?;
        let main = self.scalar_table(schema, collection, attribute)?;
        let row = executor::run_single(
            self.conn(),
            &format!("SELECT {attribute} FROM {} WHERE label = ?", main.name),
            &[Value::Text(label.to_string())],
        )?;
        match row {
            Some(mut cells) => Ok(cells.swap_remove(0)),
            None => Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("no element labelled '{label}' in '{collection}'"),
            )
            .with_context(label.to_string())),
        }
    }

    /// Reads a vector attribute for every element: outer index follows
    /// insertion order, inner lists are ordered by `vector_index`.
    pub fn read_vector(&self, collection: &str, attribute: &str) -> Result<Vec<Vec<Value>>> {
        let schema = self.require_schema()?;
        let table = self.vector_table(schema, collection, attribute)?;
        self.read_grouped(collection, &table.name, attribute, "ORDER BY id, vector_index")
    }

    /// Reads a vector attribute of one element by label.
    pub fn read_vector_by_label(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
    ) -> Result<Vec<Value>> {
        let schema = self.require_schema()?;
        let table = self.vector_table(schema, collection, attribute)?;
        let id = self.get_element_id(collection, label)?;
        let result = executor::run(
            self.conn(),
            &format!(
                "SELECT {attribute} FROM {} WHERE id = ? ORDER BY vector_index",
                table.name
            ),
            &[Value::Integer(id)],
        )?;
        Ok(result.rows.into_iter().map(|mut r| r.swap_remove(0)).collect())
    }

    /// Reads a set attribute for every element. Inner order is not
    /// specified but is stable within one database.
    pub fn read_set(&self, collection: &str, attribute: &str) -> Result<Vec<Vec<Value>>> {
        let schema = self.require_schema()?;
        let table = self.set_table(schema, collection, attribute)?;
        self.read_grouped(collection, &table.name, attribute, "ORDER BY id, rowid")
    }

    /// Reads a set attribute of one element by label.
    pub fn read_set_by_label(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
    ) -> Result<Vec<Value>> {
        let schema = self.require_schema()?;
        let table = self.set_table(schema, collection, attribute)?;
        let id = self.get_element_id(collection, label)?;
        let result = executor::run(
            self.conn(),
            &format!("SELECT {attribute} FROM {} WHERE id = ? ORDER BY rowid", table.name),
            &[Value::Integer(id)],
        )?;
        Ok(result.rows.into_iter().map(|mut r| r.swap_remove(0)).collect())
    }

    /// One inner list per element of the collection, bucketed from a
    /// single ordered scan of the side table.
    fn read_grouped(
        &self,
        collection: &str,
        table: &str,
        attribute: &str,
        order: &str,
    ) -> Result<Vec<Vec<Value>>> {
        let ids = self.element_ids(collection)?;
        let result = executor::run(
            self.conn(),
            &format!("SELECT id, {attribute} FROM {table} {order}"),
            &[],
        )?;

        let mut buckets: Vec<Vec<Value>> = vec![Vec::new(); ids.len()];
        let index_of: std::collections::HashMap<i64, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for mut row in result.rows {
            let value = row.swap_remove(1);
            let id = row[0].as_integer()?;
            if let Some(&slot) = index_of.get(&id) {
                buckets[slot].push(value);
            }
        }
        Ok(buckets)
    }

    /// All main-table columns of one element as ordered `(name, value)`
    /// pairs.
    pub fn read_element_scalar_attributes<'a>(
        &self,
        collection: &str,
        element: impl Into<ElementRef<'a>>,
    ) -> Result<Vec<(String, Value)>> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        let id = self.element_id(collection, element.into())?;

        let row = executor::run_single(
            self.conn(),
            &format!("SELECT * FROM {} WHERE id = ?", main.name),
            &[Value::Integer(id)],
        )?
        .ok_or_else(|| {
            Error::new(
                ErrorKind::ElementNotFound,
                format!("no element with id {id} in '{collection}'"),
            )
            .with_context(collection.to_string())
        })?;

        Ok(main
            .columns
            .iter()
            .map(|c| c.name.clone())
            .zip(row)
            .collect())
    }

    /// All vector attributes of one group for one element: per-attribute
    /// lists of equal length, index-aligned, in column declaration order.
    ///
    /// A missing group is [`ErrorKind::AttributeNotFound`]; an existing
    /// group with no rows yields the column names paired with empty lists.
    pub fn read_element_vector_group<'a>(
        &self,
        collection: &str,
        element: impl Into<ElementRef<'a>>,
        group: &str,
    ) -> Result<Vec<(String, Vec<Value>)>> {
        let schema = self.require_schema()?;
        let table_name = Schema::vector_table_name(collection, group);
        let table = schema.table(&table_name).ok_or_else(|| {
            Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no vector group '{group}'"),
            )
            .with_context(group.to_string())
        })?;
        let id = self.element_id(collection, element.into())?;

        let result = executor::run(
            self.conn(),
            &format!("SELECT * FROM {table_name} WHERE id = ? ORDER BY vector_index"),
            &[Value::Integer(id)],
        )?;

        let mut lists: Vec<(String, Vec<Value>)> = table
            .value_columns()
            .map(|c| (c.name.clone(), Vec::new()))
            .collect();
        for row in result.rows {
            for (cell, column) in row.into_iter().zip(&table.columns) {
                if let Some(slot) = lists.iter_mut().find(|(n, _)| *n == column.name) {
                    slot.1.push(cell);
                }
            }
        }
        Ok(lists)
    }

    /// All rows of one set group for one element, each row as `(name,
    /// value)` pairs over the group's value columns.
    pub fn read_element_set_group<'a>(
        &self,
        collection: &str,
        element: impl Into<ElementRef<'a>>,
        group: &str,
    ) -> Result<Vec<Vec<(String, Value)>>> {
        let schema = self.require_schema()?;
        let table_name = Schema::set_table_name(collection, group);
        let table = schema.table(&table_name).ok_or_else(|| {
            Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no set group '{group}'"),
            )
            .with_context(group.to_string())
        })?;
        let id = self.element_id(collection, element.into())?;

        let result = executor::run(
            self.conn(),
            &format!("SELECT * FROM {table_name} WHERE id = ? ORDER BY rowid"),
            &[Value::Integer(id)],
        )?;

        Ok(result
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&table.columns)
                    .filter(|(_, c)| {
                        !quiver_core::IDENTITY_COLUMNS.contains(&c.name.as_str())
                    })
                    .map(|(cell, c)| (c.name.clone(), cell))
                    .collect()
            })
            .collect())
    }

    /// Updates scalar attributes of an existing element from a builder.
    pub fn update_element(&self, collection: &str, id: i64, element: &Element) -> Result<()> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;

        if element.fields().is_empty() {
            return Err(Error::new(
                ErrorKind::EmptyElement,
                format!("update for '{collection}' has no attributes"),
            )
            .with_context(collection.to_string()));
        }

        let validator = TypeValidator::new(schema);
        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (name, value) in element.fields() {
            validate_identifier(name, "attribute")?;
            if !matches!(
                schema.classify_attribute(collection, name)?,
                AttributeRole::Scalar
            ) {
                return Err(Error::new(
                    ErrorKind::TypeMismatch,
                    format!("attribute '{name}' is not a scalar attribute of '{collection}'"),
                )
                .with_context(name.clone()));
            }
            let resolved = self.resolve_fk_scalar(main, name, value.clone())?;
            validator.validate_scalar(&main.name, name, &resolved)?;
            assignments.push(format!("{name} = ?"));
            params.push(resolved);
        }
        params.push(Value::Integer(id));

        let changed = executor::run_update(
            self.conn(),
            &format!(
                "UPDATE {} SET {} WHERE id = ?",
                main.name,
                assignments.join(", ")
            ),
            &params,
        )?;
        if changed == 0 {
            return Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("no element with id {id} in '{collection}'"),
            )
            .with_context(collection.to_string()));
        }
        Ok(())
    }

    /// Updates one scalar attribute of the element with the given label.
    pub fn update_scalar_parameter(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let main = self.scalar_table(schema, collection, attribute)?;
        let id = self.get_element_id(collection, label)?;

        let resolved = self.resolve_fk_scalar(main, attribute, value.into())?;
        TypeValidator::new(schema).validate_scalar(&main.name, attribute, &resolved)?;

        executor::run_update(
            self.conn(),
            &format!("UPDATE {} SET {attribute} = ? WHERE id = ?", main.name),
            &[resolved, Value::Integer(id)],
        )?;
        Ok(())
    }

    /// Replaces the values of one vector attribute, index by index.
    ///
    /// The new list must have exactly as many entries as the stored
    /// vector; this API does not resize.
    pub fn update_vector_parameters(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
        values: &[Value],
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = self.vector_table(schema, collection, attribute)?;
        let id = self.get_element_id(collection, label)?;

        let column = table
            .column(attribute)
            .ok_or_else(|| Error::internal(format!("column '{attribute}' vanished")))?;
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            let value = self.resolve_fk_scalar(table, attribute, value.clone())?;
            validate_value(&format!("attribute '{attribute}'"), column.column_type, &value)?;
            resolved.push(value);
        }

        let stored = executor::run_single(
            self.conn(),
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?", table.name),
            &[Value::Integer(id)],
        )?
        .and_then(|row| row[0].as_integer().ok())
        .unwrap_or(0);
        if stored as usize != resolved.len() {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                format!(
                    "vector '{attribute}' of '{label}' has {stored} entries, update supplies {}",
                    resolved.len()
                ),
            )
            .with_context(attribute.to_string()));
        }

        self.with_savepoint("quiver_update_vector", |db| {
            let sql = format!(
                "UPDATE {} SET {attribute} = ? WHERE id = ? AND vector_index = ?",
                table.name
            );
            for (index, value) in resolved.iter().enumerate() {
                executor::run_update(
                    db.conn(),
                    &sql,
                    &[value.clone(), Value::Integer(id), Value::Integer(index as i64)],
                )?;
            }
            Ok(())
        })
    }

    /// Replaces the values of one set attribute for an element.
    ///
    /// Set rows have no index, so they are addressed by rowid: existing
    /// rows are rewritten in place, which leaves any other column of the
    /// same set table untouched.
    pub fn update_set_parameters(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
        values: &[Value],
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = self.set_table(schema, collection, attribute)?;
        let id = self.get_element_id(collection, label)?;

        let column = table
            .column(attribute)
            .ok_or_else(|| Error::internal(format!("column '{attribute}' vanished")))?;
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            let value = self.resolve_fk_scalar(table, attribute, value.clone())?;
            validate_value(&format!("attribute '{attribute}'"), column.column_type, &value)?;
            resolved.push(value);
        }

        self.overwrite_set_column(&table.name, attribute, id, &resolved, "quiver_update_set")
    }

    /// Rewrites one column of an element's set rows without disturbing
    /// the others: surviving rows are updated in place by rowid, excess
    /// rows are deleted, and missing rows are inserted with only the
    /// target column set.
    pub(crate) fn overwrite_set_column(
        &self,
        table: &str,
        column: &str,
        id: i64,
        values: &[Value],
        savepoint: &str,
    ) -> Result<()> {
        let existing = executor::run(
            self.conn(),
            &format!("SELECT rowid FROM {table} WHERE id = ? ORDER BY rowid"),
            &[Value::Integer(id)],
        )?;
        let rowids: Vec<i64> = existing
            .rows
            .into_iter()
            .map(|row| row[0].as_integer())
            .collect::<Result<_>>()?;

        self.with_savepoint(savepoint, |db| {
            let update_sql = format!("UPDATE {table} SET {column} = ? WHERE rowid = ?");
            for (rowid, value) in rowids.iter().zip(values) {
                executor::run_update(
                    db.conn(),
                    &update_sql,
                    &[value.clone(), Value::Integer(*rowid)],
                )?;
            }
            if values.len() < rowids.len() {
                let delete_sql = format!("DELETE FROM {table} WHERE rowid = ?");
                for rowid in &rowids[values.len()..] {
                    executor::run_update(db.conn(), &delete_sql, &[Value::Integer(*rowid)])?;
                }
            } else {
                let insert_sql = format!("INSERT INTO {table} (id, {column}) VALUES (?, ?)");
                for value in &values[rowids.len()..] {
                    executor::run_update(
                        db.conn(),
                        &insert_sql,
                        &[Value::Integer(id), value.clone()],
                    )?;
                }
            }
            Ok(())
        })
    }

    /// Deletes an element. Side-table rows go with it via the schema's
    /// `ON DELETE CASCADE` foreign keys.
    pub fn delete_element<'a>(
        &self,
        collection: &str,
        element: impl Into<ElementRef<'a>>,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let main = schema.main_table(collection)?;
        let id = self.element_id(collection, element.into())?;

        let changed = executor::run_update(
            self.conn(),
            &format!("DELETE FROM {} WHERE id = ?", main.name),
            &[Value::Integer(id)],
        )?;
        if changed == 0 {
            return Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("no element with id {id} in '{collection}'"),
            )
            .with_context(collection.to_string()));
        }
        debug!(collection, id, "deleted element");
        Ok(())
    }
}
