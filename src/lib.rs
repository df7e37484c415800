//! Station Climate Library
//!
//! A Rust library for reading UK Met Office historic station data files
//! and summarising them by month.
//!
//! This library provides tools for:
//! - Locating where a free-text file preamble ends and numeric data begins
//! - Reading whitespace delimited records into a polars backed table
//! - Cleaning provider markers and missing-value sentinels into typed columns
//! - Deriving a monthly date index and average temperature
//! - Memoized grouping with either per-group functions or column reductions
//! - Month temperature profiles for histogram displays

pub mod cleaner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod grouper;
pub mod header;
pub mod models;
pub mod numeric;
pub mod profile;
pub mod reader;
pub mod session;
pub mod source;
pub mod table;
pub mod worker;

// Re-export commonly used types
pub use config::{HistogramConfig, PipelineConfig, StationSchema};
pub use error::{ClimateError, Result};
pub use grouper::{
    AggSpec, Directive, DirectiveConflict, GroupAggregator, GroupApply, GroupRequest,
    GrouperState, Reduction,
};
pub use models::{DataBoundaries, ReadReport, ReadStats, SourceMetadata};
pub use profile::{Histogram, MonthProfile, TemperatureSummary};
pub use reader::{StationReader, TableReader, TableSource};
pub use session::DataSession;
pub use source::SourceFile;
pub use table::Table;
pub use worker::{SessionCommand, SessionEvent, SessionWorker};
