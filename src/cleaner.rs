//! Station data cleaning.
//!
//! Turns the raw string table from the reader into typed data: provider
//! markers are stripped, every cell is coerced to a number or missing,
//! a monthly date key and an average temperature are derived, and the
//! date becomes the table index.

use crate::config::StationSchema;
use crate::error::Result;
use crate::numeric::parse_numeric;
use crate::table::Table;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::debug;

/// `NaiveDate::num_days_from_ce` of 1970-01-01, the polars date epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Clean a freshly read station table in place
pub fn clean(table: &mut Table, schema: &StationSchema) -> Result<()> {
    strip_markers(table, &schema.marker_column, &schema.annotation_markers)?;
    coerce_numeric(table, schema)?;
    derive_date(table, schema)?;
    derive_average(table, schema)?;
    table.set_index(&schema.date_column)?;

    debug!(
        "Cleaned {} rows, columns: {:?}",
        table.height(),
        table.column_names()
    );
    Ok(())
}

/// Remove annotation characters from every value of `column`
pub fn strip_markers(table: &mut Table, column: &str, markers: &[char]) -> Result<()> {
    let text = table.column(column)?.cast(&DataType::String)?;

    let stripped: Vec<Option<String>> = text
        .str()?
        .into_iter()
        .map(|value| value.map(|s| s.chars().filter(|c| !markers.contains(c)).collect()))
        .collect();

    table.replace_column(Series::new(column.into(), stripped))
}

/// Coerce every schema column to numbers. Anything that does not parse
/// becomes missing; this is how the source encodes absent readings.
pub fn coerce_numeric(table: &mut Table, schema: &StationSchema) -> Result<()> {
    let mut coerced_to_missing = 0;

    for name in &schema.columns {
        let text = table.column(name)?.cast(&DataType::String)?;
        let values = text.str()?;

        let series = if schema.integer_columns.contains(name) {
            let parsed: Vec<Option<i32>> = values
                .into_iter()
                .map(|value| value.and_then(parse_integer))
                .collect();
            Series::new(name.as_str().into(), parsed)
        } else {
            let parsed: Vec<Option<f64>> = values
                .into_iter()
                .map(|value| value.and_then(parse_numeric))
                .collect();
            Series::new(name.as_str().into(), parsed)
        };

        coerced_to_missing += series.null_count().saturating_sub(values.null_count());
        table.replace_column(series)?;
    }

    if coerced_to_missing > 0 {
        debug!(
            "{} non-numeric values replaced with missing",
            coerced_to_missing
        );
    }
    Ok(())
}

/// Add the monthly date column built from year, month and a fixed day
pub fn derive_date(table: &mut Table, schema: &StationSchema) -> Result<()> {
    let years = table.column(&schema.year_column)?.cast(&DataType::Int32)?;
    let months = table.column(&schema.month_column)?.cast(&DataType::Int32)?;

    let days: Vec<Option<i32>> = years
        .i32()?
        .into_iter()
        .zip(months.i32()?.into_iter())
        .map(|(year, month)| {
            let date = month_start(year?, month?, schema.day_of_month)?;
            Some(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        })
        .collect();

    let dates = Series::new(schema.date_column.as_str().into(), days).cast(&DataType::Date)?;
    table.replace_column(dates)
}

/// Add the average of the max and min temperature columns
pub fn derive_average(table: &mut Table, schema: &StationSchema) -> Result<()> {
    let tmax = table.column(&schema.tmax_column)?.cast(&DataType::Float64)?;
    let tmin = table.column(&schema.tmin_column)?.cast(&DataType::Float64)?;

    let average: Vec<Option<f64>> = tmax
        .f64()?
        .into_iter()
        .zip(tmin.f64()?.into_iter())
        .map(|(high, low)| Some((high? + low?) / 2.0))
        .collect();

    table.replace_column(Series::new(schema.tavg_column.as_str().into(), average))
}

fn parse_integer(token: &str) -> Option<i32> {
    parse_numeric(token)
        .filter(|value| value.fract() == 0.0)
        .filter(|value| (i32::MIN as f64..=i32::MAX as f64).contains(value))
        .map(|value| value as i32)
}

fn month_start(year: i32, month: i32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_table(rows: &[[&str; 7]]) -> Table {
        let schema = StationSchema::default();
        let columns: Vec<Column> = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<String> = rows.iter().map(|row| row[i].to_string()).collect();
                Column::new(name.as_str().into(), values)
            })
            .collect();
        Table::new(DataFrame::new(columns).unwrap())
    }

    fn cleaned(rows: &[[&str; 7]]) -> Table {
        let mut table = raw_table(rows);
        clean(&mut table, &StationSchema::default()).unwrap();
        table
    }

    #[test]
    fn test_sunshine_markers_are_stripped() {
        let table = cleaned(&[
            ["2001", "1", "10.0", "2.0", "0", "50.0", "90.5#"],
            ["2001", "2", "9.0", "1.0", "3", "40.0", "*61.2"],
        ]);

        let sun = table.column("sun_hours").unwrap().f64().unwrap();
        assert_eq!(sun.get(0), Some(90.5));
        assert_eq!(sun.get(1), Some(61.2));
    }

    #[test]
    fn test_average_temperature() {
        let table = cleaned(&[["2001", "1", "10.0", "2.0", "0", "50.0", "90.5"]]);

        let tavg = table.column("tavg_degc").unwrap().f64().unwrap();
        assert_eq!(tavg.get(0), Some(6.0));
    }

    #[test]
    fn test_missing_input_makes_average_missing() {
        let table = cleaned(&[["2001", "1", "10.0", "---", "0", "50.0", "90.5"]]);

        let tmin = table.column("tmin_degc").unwrap().f64().unwrap();
        let tavg = table.column("tavg_degc").unwrap().f64().unwrap();
        assert_eq!(tmin.get(0), None);
        assert_eq!(tavg.get(0), None);
    }

    #[test]
    fn test_year_and_month_are_integers() {
        let table = cleaned(&[["1948", "12", "8.9", "3.3", "---", "85.0", "---"]]);

        assert_eq!(
            table.column("year").unwrap().dtype(),
            &DataType::Int32
        );
        assert_eq!(table.column("month").unwrap().i32().unwrap().get(0), Some(12));
        assert_eq!(table.column("af_days").unwrap().f64().unwrap().get(0), None);
    }

    #[test]
    fn test_date_index_is_first_of_month() {
        let table = cleaned(&[
            ["1948", "1", "8.9", "3.3", "---", "85.0", "---"],
            ["1948", "13", "7.9", "2.2", "---", "58.0", "---"],
        ]);

        assert_eq!(table.index(), Some("date"));
        assert_eq!(table.column_names()[0], "date");

        let dates = table.column("date").unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);

        let days = dates.cast(&DataType::Int32).unwrap();
        let days = days.i32().unwrap();
        let expected = NaiveDate::from_ymd_opt(1948, 1, 1).unwrap().num_days_from_ce()
            - UNIX_EPOCH_DAYS_FROM_CE;
        assert_eq!(days.get(0), Some(expected));
        // Month 13 cannot form a date
        assert_eq!(days.get(1), None);
    }

    #[test]
    fn test_fractional_month_is_missing() {
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("7"), Some(7));
        assert_eq!(parse_integer("7.0"), Some(7));
    }

    #[test]
    fn test_missing_schema_column_is_reported() {
        let mut table = Table::new(df!("year" => ["2001"]).unwrap());
        let result = clean(&mut table, &StationSchema::default());
        assert!(matches!(
            result,
            Err(crate::ClimateError::MissingColumn { .. })
        ));
    }
}
