//! Time-series groups and the file-path sidecar.
//!
//! Time-series rows are bulk-inserted by `create_element`; this module
//! covers reading a group back (dimension-ordered), point updates keyed
//! by `date_time`, group deletion, and the one-row
//! `<collection>_time_series_files` sidecar.

use quiver_core::{ElementRef, Error, ErrorKind, Result, Schema, Table, Value};

use crate::database::Database;
use crate::executor;
use crate::validator::validate_value;

impl Database {
    fn time_series_table<'s>(
        &self,
        schema: &'s Schema,
        collection: &str,
        group: &str,
    ) -> Result<&'s Table> {
        let table_name = Schema::time_series_table_name(collection, group);
        schema.table(&table_name).ok_or_else(|| {
            Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no time-series group '{group}'"),
            )
            .with_context(group.to_string())
        })
    }

    /// All rows of one time-series group for one element, each row as
    /// `(name, value)` pairs in column declaration order (dimension
    /// columns included).
    ///
    /// Rows are ordered by `dimension_keys` when supplied, otherwise by
    /// the group's value columns left to right.
    pub fn read_element_time_series_group<'a>(
        &self,
        collection: &str,
        element: impl Into<ElementRef<'a>>,
        group: &str,
        dimension_keys: &[&str],
    ) -> Result<Vec<Vec<(String, Value)>>> {
        let schema = self.require_schema()?;
        let table = self.time_series_table(schema, collection, group)?;
        let id = self.element_id(collection, element.into())?;

        let order_columns: Vec<String> = if dimension_keys.is_empty() {
            table.value_columns().map(|c| c.name.clone()).collect()
        } else {
            let mut columns = Vec::with_capacity(dimension_keys.len());
            for key in dimension_keys {
                let column = table.column(key).ok_or_else(|| {
                    Error::new(
                        ErrorKind::AttributeNotFound,
                        format!("time-series group '{group}' has no dimension '{key}'"),
                    )
                    .with_context((*key).to_string())
                })?;
                columns.push(column.name.clone());
            }
            columns
        };
        let order = if order_columns.is_empty() {
            "rowid".to_string()
        } else {
            order_columns.join(", ")
        };

        let result = executor::run(
            self.conn(),
            &format!("SELECT * FROM {} WHERE id = ? ORDER BY {order}", table.name),
            &[Value::Integer(id)],
        )?;

        Ok(result
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&table.columns)
                    .filter(|(_, c)| c.name != "id")
                    .map(|(cell, c)| (c.name.clone(), cell))
                    .collect()
            })
            .collect())
    }

    /// Updates one time-series cell, addressed by element label and
    /// `date_time` key.
    pub fn update_time_series_row(
        &self,
        collection: &str,
        attribute: &str,
        label: &str,
        value: impl Into<Value>,
        date_time: &str,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = schema
            .side_table_for_attribute(collection, attribute, |r| {
                matches!(r, quiver_core::TableRole::TimeSeries { .. })
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AttributeNotFound,
                    format!("collection '{collection}' has no time-series attribute '{attribute}'"),
                )
                .with_context(attribute.to_string())
            })?;
        if table.column("date_time").is_none() {
            return Err(Error::new(
                ErrorKind::AttributeNotFound,
                format!("time-series table '{}' has no 'date_time' dimension", table.name),
            )
            .with_context(table.name.clone()));
        }

        let value = value.into();
        let column = table
            .column(attribute)
            .ok_or_else(|| Error::internal(format!("column '{attribute}' vanished")))?;
        validate_value(&format!("attribute '{attribute}'"), column.column_type, &value)?;

        let id = self.get_element_id(collection, label)?;
        let changed = executor::run_update(
            self.conn(),
            &format!(
                "UPDATE {} SET {attribute} = ? WHERE id = ? AND date_time = ?",
                table.name
            ),
            &[value, Value::Integer(id), Value::Text(date_time.to_string())],
        )?;
        if changed == 0 {
            return Err(Error::new(
                ErrorKind::ElementNotFound,
                format!("no time-series row of '{label}' at '{date_time}'"),
            )
            .with_context(date_time.to_string()));
        }
        Ok(())
    }

    /// Deletes every row of one time-series group for an element.
    pub fn delete_time_series(&self, collection: &str, group: &str, label: &str) -> Result<()> {
        let schema = self.require_schema()?;
        let table = self.time_series_table(schema, collection, group)?;
        let id = self.get_element_id(collection, label)?;

        executor::run_update(
            self.conn(),
            &format!("DELETE FROM {} WHERE id = ?", table.name),
            &[Value::Integer(id)],
        )?;
        Ok(())
    }

    fn time_series_files_table<'s>(
        &self,
        schema: &'s Schema,
        collection: &str,
        parameter: &str,
    ) -> Result<&'s Table> {
        let table_name = Schema::time_series_files_table_name(collection);
        let table = schema.table(&table_name).ok_or_else(|| {
            Error::new(
                ErrorKind::AttributeNotFound,
                format!("collection '{collection}' has no time-series files table"),
            )
            .with_context(collection.to_string())
        })?;
        if table.column(parameter).is_none() {
            return Err(Error::new(
                ErrorKind::AttributeNotFound,
                format!("no time-series file parameter '{parameter}' on '{collection}'"),
            )
            .with_context(parameter.to_string()));
        }
        Ok(table)
    }

    /// Upserts the file path stored for one parameter in the collection's
    /// one-row `_time_series_files` sidecar. The path is stored verbatim;
    /// the engine never opens it.
    pub fn set_time_series_file(
        &self,
        collection: &str,
        parameter: &str,
        file_path: &str,
    ) -> Result<()> {
        let schema = self.require_schema()?;
        let table = self.time_series_files_table(schema, collection, parameter)?;

        let existing = executor::run_single(
            self.conn(),
            &format!("SELECT COUNT(*) FROM {}", table.name),
            &[],
        )?
        .and_then(|row| row[0].as_integer().ok())
        .unwrap_or(0);

        let sql = if existing == 0 {
            format!("INSERT INTO {} ({parameter}) VALUES (?)", table.name)
        } else {
            format!("UPDATE {} SET {parameter} = ?", table.name)
        };
        executor::run_update(self.conn(), &sql, &[Value::Text(file_path.to_string())])?;
        Ok(())
    }

    /// The file path stored for one parameter, if any.
    pub fn read_time_series_file(
        &self,
        collection: &str,
        parameter: &str,
    ) -> Result<Option<String>> {
        let schema = self.require_schema()?;
        let table = self.time_series_files_table(schema, collection, parameter)?;

        let row = executor::run_single(
            self.conn(),
            &format!("SELECT {parameter} FROM {}", table.name),
            &[],
        )?;
        Ok(match row {
            Some(mut cells) => match cells.swap_remove(0) {
                Value::Null => None,
                Value::Text(path) => Some(path),
                other => {
                    return Err(Error::internal(format!(
                        "file path column yielded {}",
                        other.type_name()
                    )))
                }
            },
            None => None,
        })
    }
}
