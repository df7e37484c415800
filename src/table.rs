//! Indexed table wrapper around a polars `DataFrame`.
//!
//! Polars frames have no notion of an index, so the table records which
//! column plays that role. It also carries a content fingerprint that the
//! group aggregator uses to decide whether a new table really is new,
//! without comparing frames cell by cell on every configuration change.

use crate::error::{ClimateError, Result};
use polars::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Ordered named columns of equal length with an optional index column
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    index: Option<String>,
    fingerprint: OnceLock<u64>,
}

impl Table {
    pub fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            index: None,
            fingerprint: OnceLock::new(),
        }
    }

    /// Create a table keyed by an existing column
    pub fn with_index(frame: DataFrame, index: &str) -> Result<Self> {
        let mut table = Self::new(frame);
        table.set_index(index)?;
        Ok(table)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Name of the index column, if one is designated
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Names from `names` that are not columns of this table, in request order
    pub fn missing_columns<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| !self.has_column(name))
            .cloned()
            .collect()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        if !self.has_column(name) {
            return Err(ClimateError::MissingColumn {
                column: name.to_string(),
            });
        }
        Ok(self.frame.column(name)?)
    }

    /// Add a column, or replace the column with the same name
    pub fn replace_column(&mut self, series: Series) -> Result<()> {
        self.frame.with_column(series)?;
        self.touch();
        Ok(())
    }

    /// Designate `name` as the index and move it to the first position.
    /// Row order is left as it is.
    pub fn set_index(&mut self, name: &str) -> Result<()> {
        if !self.has_column(name) {
            return Err(ClimateError::MissingColumn {
                column: name.to_string(),
            });
        }

        let mut order = vec![name.to_string()];
        order.extend(self.column_names().into_iter().filter(|c| c != name));

        self.frame = self.frame.select(order)?;
        self.index = Some(name.to_string());
        self.touch();
        Ok(())
    }

    /// Hash of the index name, schema and every value
    pub fn fingerprint(&self) -> u64 {
        *self
            .fingerprint
            .get_or_init(|| content_fingerprint(&self.frame, self.index.as_deref()))
    }

    pub fn same_content(&self, other: &Table) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    fn touch(&mut self) {
        self.fingerprint = OnceLock::new();
    }
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = &self.index {
            writeln!(f, "index: {}", index)?;
        }
        write!(f, "{}", self.frame)
    }
}

fn content_fingerprint(frame: &DataFrame, index: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    index.hash(&mut hasher);
    frame.height().hash(&mut hasher);

    for column in frame.get_columns() {
        column.name().as_str().hash(&mut hasher);
        column.dtype().to_string().hash(&mut hasher);
        hash_values(column, &mut hasher);
    }

    hasher.finish()
}

fn hash_values(column: &Column, hasher: &mut DefaultHasher) {
    // Float bits keep NaN and -0.0 distinct from their neighbours
    if let Ok(values) = column.f64() {
        for value in values.into_iter() {
            value.map(f64::to_bits).hash(hasher);
        }
        return;
    }

    if let Ok(text) = column.cast(&DataType::String) {
        if let Ok(values) = text.str() {
            for value in values.into_iter() {
                value.hash(hasher);
            }
        }
    }
}
