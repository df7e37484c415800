//! Error handling for station data processing.
//!
//! Provides error types with context for path binding, table reading,
//! grouping configuration and aggregation failures. Per-value coercion
//! problems are never errors; they become missing values in the cleaner.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClimateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("No file path has been set")]
    PathUnset,

    #[error("File {path} is not a readable file: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Column '{column}' does not exist in table")]
    MissingColumn { column: String },

    #[error("Columns {columns:?} specified for groupby do not exist in data")]
    InvalidGroupingColumns { columns: Vec<String> },

    #[error("Columns {columns:?} specified for aggregation do not exist in data")]
    UnknownAggregationColumns { columns: Vec<String> },

    #[error("Grouping by {group_by:?} requested but no apply function or aggregation is set")]
    NoAggregation { group_by: Vec<String> },

    #[error("No data set to perform groupby operation")]
    NoData,

    #[error("Unknown reduction '{name}'")]
    InvalidReduction { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Session worker has stopped")]
    WorkerStopped,
}

impl ClimateError {
    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the presentation layer should offer a retry (bad path or bad columns)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PathUnset
                | Self::InvalidPath { .. }
                | Self::InvalidGroupingColumns { .. }
                | Self::UnknownAggregationColumns { .. }
                | Self::MissingColumn { .. }
        )
    }
}

impl From<regex::Error> for ClimateError {
    fn from(error: regex::Error) -> Self {
        Self::Configuration {
            message: format!("Invalid delimiter pattern: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClimateError>;
