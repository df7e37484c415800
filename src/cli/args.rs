//! Command-line argument definitions for the station climate tool
//!
//! Defines the CLI interface using the clap derive API. Flags layer on top
//! of `PipelineConfig::default()`.

use crate::config::PipelineConfig;
use crate::grouper::AggSpec;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the station climate tool
///
/// Reads Met Office historic station data files and prints monthly
/// climatologies and single month temperature profiles.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "station-climate",
    version,
    about = "Summarise UK Met Office historic station data by month",
    long_about = "Reads a Met Office historic station data file, skips its free-text preamble, \
                  cleans provider markers and missing-value sentinels, and prints grouped \
                  summaries or single month temperature profiles."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Regex separating cells within a data line. The preamble is still
    /// detected by splitting on whitespace, so data lines must also be
    /// whitespace separated numbers to be found
    #[arg(long, value_name = "REGEX", global = true)]
    pub delimiter: Option<String>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print grouped summary statistics (monthly climatology by default)
    Summary(SummaryArgs),
    /// Print temperature histograms and extremes for one month
    Profile(ProfileArgs),
    /// Show file metadata, header size and the first cleaned rows
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct SummaryArgs {
    /// Station data file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Columns to group by (comma-separated)
    #[arg(short = 'g', long = "group-by", value_name = "COLS", value_delimiter = ',')]
    pub group_by: Option<Vec<String>>,

    /// Reductions as column=op pairs, e.g. tmin_degc=min,tavg_degc=mean
    #[arg(short = 'a', long = "agg", value_name = "SPEC")]
    pub aggregation: Option<AggSpec>,
}

#[derive(Debug, Clone, Parser)]
pub struct ProfileArgs {
    /// Station data file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Month to profile; snapped to a month present in the data
    #[arg(short, long, default_value_t = 1.0)]
    pub month: f64,
}

#[derive(Debug, Clone, Parser)]
pub struct InspectArgs {
    /// Station data file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Number of cleaned rows to show
    #[arg(short = 'n', long, default_value_t = 5)]
    pub rows: usize,
}

impl Args {
    /// Get the log level from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Default configuration with the global flags applied
    pub fn pipeline_config(&self) -> PipelineConfig {
        let config = PipelineConfig::default();
        match &self.delimiter {
            Some(delimiter) => config.with_delimiter(delimiter.clone()),
            None => config,
        }
    }
}

impl SummaryArgs {
    /// Layer the summary flags over a base configuration
    pub fn apply_to(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(group_by) = &self.group_by {
            config = config.with_group_by(group_by.iter().cloned());
        }
        if let Some(aggregation) = &self.aggregation {
            config = config.with_aggregation(aggregation.clone());
        }
        config
    }
}
