//! Configuration management and validation.
//!
//! Provides the station file schema, delimiter, default grouping and
//! histogram settings. Defaults describe the Met Office historic station
//! data layout; CLI flags layer on top through the `with_*` builders.

use crate::constants::*;
use crate::error::{ClimateError, Result};
use crate::grouper::{AggSpec, Reduction};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column layout of a station file and the names of derived columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSchema {
    /// Data columns in file order
    pub columns: Vec<String>,

    /// Columns coerced to whole numbers rather than floats
    pub integer_columns: Vec<String>,

    pub year_column: String,
    pub month_column: String,
    pub tmax_column: String,
    pub tmin_column: String,

    /// Column carrying provider annotation markers
    pub marker_column: String,

    /// Characters stripped from the marker column before coercion
    pub annotation_markers: Vec<char>,

    /// Derived monthly date, becomes the table index
    pub date_column: String,

    /// Derived mean of max and min temperature
    pub tavg_column: String,

    /// Day used for every derived date
    pub day_of_month: u32,
}

impl Default for StationSchema {
    fn default() -> Self {
        Self {
            columns: STATION_COLUMNS.iter().map(|c| c.to_string()).collect(),
            integer_columns: INTEGER_COLUMNS.iter().map(|c| c.to_string()).collect(),
            year_column: YEAR_COLUMN.to_string(),
            month_column: MONTH_COLUMN.to_string(),
            tmax_column: TMAX_COLUMN.to_string(),
            tmin_column: TMIN_COLUMN.to_string(),
            marker_column: SUN_COLUMN.to_string(),
            annotation_markers: ANNOTATION_MARKERS.to_vec(),
            date_column: DATE_COLUMN.to_string(),
            tavg_column: TAVG_COLUMN.to_string(),
            day_of_month: DEFAULT_DAY_OF_MONTH,
        }
    }
}

impl StationSchema {
    /// Check that every named column is part of the file layout
    pub fn validate(&self) -> Result<()> {
        for name in [
            &self.year_column,
            &self.month_column,
            &self.tmax_column,
            &self.tmin_column,
            &self.marker_column,
        ] {
            if !self.columns.contains(name) {
                return Err(ClimateError::configuration(format!(
                    "Column '{}' is not part of the station schema",
                    name
                )));
            }
        }

        if !(1..=28).contains(&self.day_of_month) {
            return Err(ClimateError::configuration(format!(
                "Day of month {} is not valid for every month",
                self.day_of_month
            )));
        }

        Ok(())
    }
}

/// Bins for the month profile temperature histograms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// First bin edge
    pub start: f64,
    /// Edges stop before this value
    pub end: f64,
    pub step: f64,
    /// Columns to histogram
    pub columns: Vec<String>,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            start: HISTOGRAM_START_DEGC,
            end: HISTOGRAM_END_DEGC,
            step: HISTOGRAM_STEP_DEGC,
            columns: PROFILE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl HistogramConfig {
    /// Bin edges from `start` up to but excluding `end`
    pub fn edges(&self) -> Result<Vec<f64>> {
        if self.step <= 0.0 || self.end <= self.start {
            return Err(ClimateError::configuration(format!(
                "Invalid histogram range {}..{} step {}",
                self.start, self.end, self.step
            )));
        }

        let count = ((self.end - self.start) / self.step).ceil() as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }
}

/// Configuration for a data session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Regex separating cells within a data line
    pub delimiter: String,

    pub schema: StationSchema,

    /// Default grouping key for the summary table
    pub group_by: Vec<String>,

    /// Default reductions for the summary table
    pub aggregation: AggSpec,

    pub histogram: HistogramConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let aggregation = AggSpec::new()
            .with(TMIN_COLUMN, Reduction::Min)
            .with(TAVG_COLUMN, Reduction::Mean)
            .with(TMAX_COLUMN, Reduction::Max);

        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            schema: StationSchema::default(),
            group_by: vec![MONTH_COLUMN.to_string()],
            aggregation,
            histogram: HistogramConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the cell delimiter pattern
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Set the summary grouping key
    pub fn with_group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the summary reductions
    pub fn with_aggregation(mut self, aggregation: AggSpec) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Replace the station schema
    pub fn with_schema(mut self, schema: StationSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Replace the histogram settings
    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }

    /// Validate the whole configuration up front
    pub fn validate(&self) -> Result<()> {
        regex::Regex::new(&self.delimiter)?;
        self.schema.validate()?;
        self.histogram.edges()?;

        debug!(
            "Configuration valid: delimiter={:?}, group_by={:?}, aggregation={}",
            self.delimiter, self.group_by, self.aggregation
        );
        Ok(())
    }
}
