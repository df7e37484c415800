//! Single month temperature profile.
//!
//! Backs the histogram view: picks a month present in the data, bins the
//! temperature columns for that month and summarises the extremes.

use crate::config::{HistogramConfig, StationSchema};
use crate::error::{ClimateError, Result};
use crate::table::Table;
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Share of a month's readings falling in each temperature bin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    /// Bin edges; bin `i` spans `edges[i]..edges[i + 1]`
    pub edges: Vec<f64>,
    /// Percentage of in-range readings per bin, one entry per bin
    pub percent: Vec<f64>,
    /// Non-missing readings inside the edge range
    pub counted: usize,
}

/// Coldest minimum, mean average and warmest maximum for a month
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureSummary {
    pub tmin_min: Option<f64>,
    pub tavg_mean: Option<f64>,
    pub tmax_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthProfile {
    /// Month actually profiled after snapping
    pub month: i32,
    pub rows: usize,
    pub histograms: Vec<Histogram>,
    pub summary: TemperatureSummary,
}

/// Build the profile for the month closest to `requested`
pub fn month_profile(
    table: &Table,
    requested: f64,
    schema: &StationSchema,
    histogram: &HistogramConfig,
) -> Result<MonthProfile> {
    let months = table.column(&schema.month_column)?.cast(&DataType::Int32)?;
    let month = snap_month(months.i32()?, requested).ok_or(ClimateError::NoData)?;

    let selected = table
        .frame()
        .clone()
        .lazy()
        .filter(
            col(schema.month_column.as_str())
                .cast(DataType::Int32)
                .eq(lit(month)),
        )
        .collect()?;

    debug!(
        "Month profile: requested {}, using month {} ({} rows)",
        requested,
        month,
        selected.height()
    );

    let edges = histogram.edges()?;
    let histograms = histogram
        .columns
        .iter()
        .map(|column| {
            let values = float_values(&selected, column)?;
            Ok(build_histogram(column, &values, &edges))
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = TemperatureSummary {
        tmin_min: float_column(&selected, &schema.tmin_column)?.f64()?.min(),
        tavg_mean: float_column(&selected, &schema.tavg_column)?.f64()?.mean(),
        tmax_max: float_column(&selected, &schema.tmax_column)?.f64()?.max(),
    };

    Ok(MonthProfile {
        month,
        rows: selected.height(),
        histograms,
        summary,
    })
}

/// Round and clamp the request to the observed months, then take the
/// smallest month at or above it. Falls back to January when one row
/// or fewer qualify. `None` when the table has no months at all.
pub fn snap_month(months: &Int32Chunked, requested: f64) -> Option<i32> {
    let observed: Vec<i32> = months.into_iter().flatten().collect();
    let lowest = *observed.iter().min()?;
    let highest = *observed.iter().max()?;

    let target = (requested.round() as i32).clamp(lowest, highest);
    let candidates: Vec<i32> = observed.into_iter().filter(|m| *m >= target).collect();

    if candidates.len() > 1 {
        candidates.into_iter().min()
    } else {
        Some(1)
    }
}

fn build_histogram(column: &str, values: &[f64], edges: &[f64]) -> Histogram {
    let counts = bin_counts(values, edges);
    let counted: usize = counts.iter().sum();

    let percent = counts
        .iter()
        .map(|&count| {
            if counted == 0 {
                0.0
            } else {
                100.0 * count as f64 / counted as f64
            }
        })
        .collect();

    Histogram {
        column: column.to_string(),
        edges: edges.to_vec(),
        percent,
        counted,
    }
}

/// Count values per bin. Bins are half-open except the last, which also
/// takes values equal to the final edge. Out of range values are ignored.
fn bin_counts(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }

    let (first, last) = (edges[0], edges[bins]);
    for &value in values {
        if !(first..=last).contains(&value) {
            continue;
        }
        let index = if value == last {
            bins - 1
        } else {
            edges.partition_point(|edge| *edge <= value) - 1
        };
        counts[index] += 1;
    }
    counts
}

fn float_column(frame: &DataFrame, name: &str) -> Result<Column> {
    if frame.get_column_index(name).is_none() {
        return Err(ClimateError::MissingColumn {
            column: name.to_string(),
        });
    }
    Ok(frame.column(name)?.cast(&DataType::Float64)?)
}

fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = float_column(frame, name)?;
    Ok(column.f64()?.into_iter().flatten().collect())
}
