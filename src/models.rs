//! Core data structures shared across the pipeline.
//!
//! Defines source file metadata, header boundaries and read statistics.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata captured when a station file is bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub file_path: PathBuf,
    pub file_dir: PathBuf,
    pub file_name: String,
    /// Not every filesystem records a creation time
    pub created: Option<DateTime<Local>>,
    pub modified: DateTime<Local>,
    pub filesize_bytes: u64,
}

/// Where the data section of a station file begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBoundaries {
    /// Number of leading lines that are not fully numeric
    pub skip_rows: usize,
    pub lines_scanned: usize,
    /// False when the whole file was scanned without finding a numeric line
    pub data_found: bool,
}

/// Counters from a single table read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub rows_read: usize,
    pub blank_lines: usize,
    /// Rows with fewer tokens than columns; the tail is filled with missing values
    pub short_rows: usize,
    /// Rows with trailing tokens beyond the schema, such as "Provisional"
    pub long_rows: usize,
}

/// What a station read found: the header boundary and the row counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReport {
    pub boundaries: DataBoundaries,
    pub stats: ReadStats,
}
