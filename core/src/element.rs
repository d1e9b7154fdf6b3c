//! In-memory element builder.
//!
//! An [`Element`] accumulates the attributes of one element before it is
//! handed to the engine: an insertion-ordered list of `name -> Value`
//! fields (scalars and vectors) plus optional per-group [`TimeSeries`]
//! blocks. The engine classifies each field against the schema at write
//! time, so the builder itself is schema-agnostic.

use crate::value::Value;

/// Builder for the attributes of a single element.
///
/// Field order is preserved, which keeps statement binding deterministic.
/// Setting the same name twice keeps both entries; the engine rejects the
/// duplicate when it classifies the fields.
///
/// # Examples
///
/// ```
/// use quiver_core::Element;
///
/// let mut element = Element::new();
/// element
///     .set("label", "Plant 1")
///     .set("capacity", 450.5)
///     .set("costs", vec![1.0, 2.5, 3.0]);
///
/// assert_eq!(element.fields().len(), 3);
/// assert!(!element.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    fields: Vec<(String, Value)>,
    time_series: Vec<(String, TimeSeries)>,
}

impl Element {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute. Accepts anything convertible into [`Value`],
    /// including the vector forms.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Sets an attribute to SQL NULL.
    pub fn set_null(&mut self, name: impl Into<String>) -> &mut Self {
        self.fields.push((name.into(), Value::Null));
        self
    }

    /// Attaches a time-series block for the given group. A second block
    /// for the same group replaces the first.
    pub fn set_time_series(&mut self, group: impl Into<String>, series: TimeSeries) -> &mut Self {
        let group = group.into();
        if let Some(slot) = self.time_series.iter_mut().find(|(g, _)| *g == group) {
            slot.1 = series;
        } else {
            self.time_series.push((group, series));
        }
        self
    }

    /// The fields in insertion order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// The attached time-series blocks, one per group.
    pub fn time_series(&self) -> &[(String, TimeSeries)] {
        &self.time_series
    }

    /// `true` when no field and no time-series block is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.time_series.is_empty()
    }

    /// Removes all fields and time-series blocks.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.time_series.clear();
    }
}

/// Columnar time-series block: named columns of equal length.
///
/// Lengths are not enforced here; the engine rejects ragged blocks at
/// write time so the builder stays infallible.
///
/// # Examples
///
/// ```
/// use quiver_core::TimeSeries;
///
/// let mut series = TimeSeries::new();
/// series
///     .add_column("date_time", vec!["2020-01-01", "2021-01-01"])
///     .add_column("generation", vec![10.0, 12.5]);
///
/// assert_eq!(series.row_count(), Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    columns: Vec<(String, Vec<Value>)>,
}

impl TimeSeries {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column. Every item converts into [`Value`] individually, so
    /// `vec![1.0, 2.0]` and `vec!["a", "b"]` both work.
    pub fn add_column<T: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        values: Vec<T>,
    ) -> &mut Self {
        self.columns
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// The columns in insertion order.
    pub fn columns(&self) -> &[(String, Vec<Value>)] {
        &self.columns
    }

    /// Row count shared by all columns, or `None` when the block is
    /// ragged or empty.
    pub fn row_count(&self) -> Option<usize> {
        let mut rows = None;
        for (_, values) in &self.columns {
            match rows {
                None => rows = Some(values.len()),
                Some(n) if n != values.len() => return None,
                Some(_) => {}
            }
        }
        rows
    }

    /// `true` when no column is present.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Addresses an element either by rowid or by its unique label.
///
/// Engine entry points canonicalise to the id as their first step.
///
/// # Examples
///
/// ```
/// use quiver_core::ElementRef;
///
/// let by_id: ElementRef = 3i64.into();
/// let by_label: ElementRef = "Plant 1".into();
/// assert!(matches!(by_id, ElementRef::Id(3)));
/// assert!(matches!(by_label, ElementRef::Label(_)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef<'a> {
    /// Rowid of the element in its main table.
    Id(i64),
    /// Value of the element's `label` column.
    Label(&'a str),
}

impl From<i64> for ElementRef<'_> {
    fn from(id: i64) -> Self {
        ElementRef::Id(id)
    }
}

impl<'a> From<&'a str> for ElementRef<'a> {
    fn from(label: &'a str) -> Self {
        ElementRef::Label(label)
    }
}

impl<'a> From<&'a String> for ElementRef<'a> {
    fn from(label: &'a String) -> Self {
        ElementRef::Label(label)
    }
}
