//! Station file reading.
//!
//! `TableSource` is the seam for anything that produces a `Table`.
//! `TableReader` turns delimited text into a table of raw string cells;
//! `StationReader` chains header detection, `TableReader` and the cleaner
//! into the full station pipeline and caches its output.

use crate::cleaner::clean;
use crate::config::PipelineConfig;
use crate::constants::DEFAULT_DELIMITER;
use crate::error::{ClimateError, Result};
use crate::header::find_first_valid_data;
use crate::models::{ReadReport, ReadStats};
use crate::source::SourceFile;
use crate::table::Table;
use polars::prelude::*;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that can produce a table
pub trait TableSource {
    fn read_table(&self) -> Result<Table>;

    /// Short human readable description of where the table comes from
    fn describe(&self) -> String;
}

/// Reads delimited text into a table of string columns
#[derive(Debug, Clone)]
pub struct TableReader {
    source: SourceFile,
    columns: Vec<String>,
    skip_rows: usize,
    delimiter: Regex,
}

impl TableReader {
    /// Bind `path` eagerly and prepare to read it with the given column names
    pub fn new<I, S>(path: impl AsRef<Path>, columns: I, skip_rows: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = SourceFile::bind(path)?;
        Self::from_source(source, columns, skip_rows)
    }

    /// Read an already bound source
    pub fn from_source<I, S>(source: SourceFile, columns: I, skip_rows: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(ClimateError::configuration("No column names given"));
        }

        Ok(Self {
            source,
            columns,
            skip_rows,
            delimiter: Regex::new(DEFAULT_DELIMITER)?,
        })
    }

    /// Use a different delimiter pattern
    pub fn with_delimiter(mut self, pattern: &str) -> Result<Self> {
        self.delimiter = Regex::new(pattern)?;
        Ok(self)
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn delimiter(&self) -> &str {
        self.delimiter.as_str()
    }

    /// Read the table and report row counters
    pub fn read_with_stats(&self) -> Result<(Table, ReadStats)> {
        let file = File::open(self.source.path())?;
        let reader = BufReader::new(file);

        let width = self.columns.len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        let mut stats = ReadStats::default();

        for line in reader.lines().skip(self.skip_rows) {
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                stats.blank_lines += 1;
                continue;
            }

            let tokens: Vec<&str> = self.delimiter.split(trimmed).map(str::trim).collect();

            if tokens.len() < width {
                stats.short_rows += 1;
            } else if tokens.len() > width {
                stats.long_rows += 1;
            }

            for (position, column) in cells.iter_mut().enumerate() {
                column.push(tokens.get(position).map(|token| token.to_string()));
            }
            stats.rows_read += 1;
        }

        if stats.long_rows > 0 {
            debug!(
                "Dropped trailing tokens from {} rows of {}",
                stats.long_rows,
                self.source.path().display()
            );
        }

        let columns: Vec<Column> = self
            .columns
            .iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name.as_str().into(), values))
            .collect();

        let table = Table::new(DataFrame::new(columns)?);
        Ok((table, stats))
    }
}

impl TableSource for TableReader {
    fn read_table(&self) -> Result<Table> {
        self.read_with_stats().map(|(table, _)| table)
    }

    fn describe(&self) -> String {
        format!(
            "{} (skip {} rows, delimiter {:?})",
            self.source.path().display(),
            self.skip_rows,
            self.delimiter.as_str()
        )
    }
}

/// Full station pipeline: locate the data, read it, clean it, cache it
#[derive(Debug)]
pub struct StationReader {
    config: PipelineConfig,
    source: Option<SourceFile>,
    table: Option<Arc<Table>>,
    last_report: Option<ReadReport>,
}

impl StationReader {
    /// Create a reader with no file bound
    pub fn unbound(config: PipelineConfig) -> Self {
        Self {
            config,
            source: None,
            table: None,
            last_report: None,
        }
    }

    /// Create a reader bound to `path`
    pub fn open(path: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        let mut reader = Self::unbound(config);
        reader.bind(path)?;
        Ok(reader)
    }

    /// Bind a new path. The cached table is dropped when the path points
    /// at a different file or the file changed since the last bind.
    pub fn bind(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let source = SourceFile::bind(path)?;

        let changed = self
            .source
            .as_ref()
            .is_none_or(|current| source.differs_from(current));

        if changed {
            info!("Station file set to {}", source.path().display());
            self.table = None;
            self.last_report = None;
        }

        self.source = Some(source);
        Ok(())
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Header boundary and counters of the last successful read
    pub fn last_report(&self) -> Option<&ReadReport> {
        self.last_report.as_ref()
    }

    /// Parse the bound file, replacing any cached table.
    /// Returns `Ok(None)` when no file is bound.
    pub fn read(&mut self) -> Result<Option<Arc<Table>>> {
        let Some((table, report)) = self.load()? else {
            debug!("No station file bound, nothing to read");
            return Ok(None);
        };

        let table = Arc::new(table);
        self.table = Some(Arc::clone(&table));
        self.last_report = Some(report);
        Ok(Some(table))
    }

    /// The cleaned table, parsing the file only if nothing is cached
    pub fn table(&mut self) -> Result<Option<Arc<Table>>> {
        match &self.table {
            Some(table) => Ok(Some(Arc::clone(table))),
            None => self.read(),
        }
    }

    fn load(&self) -> Result<Option<(Table, ReadReport)>> {
        let Some(source) = &self.source else {
            return Ok(None);
        };

        let boundaries = find_first_valid_data(source.path())?;
        if !boundaries.data_found {
            warn!(
                "No fully numeric line found in {}, table will be empty",
                source.path().display()
            );
        }

        let reader = TableReader::from_source(
            source.clone(),
            self.config.schema.columns.iter().cloned(),
            boundaries.skip_rows,
        )?
        .with_delimiter(&self.config.delimiter)?;

        let (mut table, stats) = reader.read_with_stats()?;
        clean(&mut table, &self.config.schema)?;

        info!(
            "Read {} rows from {} ({} header lines skipped)",
            stats.rows_read,
            source.metadata().file_name,
            boundaries.skip_rows
        );

        Ok(Some((table, ReadReport { boundaries, stats })))
    }
}

impl TableSource for StationReader {
    fn read_table(&self) -> Result<Table> {
        self.load()?
            .map(|(table, _)| table)
            .ok_or(ClimateError::PathUnset)
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(source) => format!("station file {}", source.path().display()),
            None => "unbound station reader".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const COLUMNS: [&str; 3] = ["year", "month", "sun_hours"];

    fn write_lines(lines: &[&str]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_reader_rejects_missing_path_at_construction() {
        let result = TableReader::new("/nonexistent/file.txt", COLUMNS, 0);
        assert!(matches!(result, Err(ClimateError::InvalidPath { .. })));
    }

    #[test]
    fn test_reads_whitespace_runs_as_strings() {
        let file = write_lines(&["Header line", "   2001   1    90.5#", "2001\t2  ---"]);
        let reader = TableReader::new(file.path(), COLUMNS, 1).unwrap();
        let (table, stats) = reader.read_with_stats().unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(stats.rows_read, 2);

        let sun = table.column("sun_hours").unwrap().str().unwrap();
        assert_eq!(sun.get(0), Some("90.5#"));
        assert_eq!(sun.get(1), Some("---"));
    }

    #[test]
    fn test_short_and_long_rows() {
        let file = write_lines(&["2001 1", "2001 2 55.0 Provisional", "", "2001 3 60.1"]);
        let reader = TableReader::new(file.path(), COLUMNS, 0).unwrap();
        let (table, stats) = reader.read_with_stats().unwrap();

        assert_eq!(table.height(), 3);
        assert_eq!(stats.short_rows, 1);
        assert_eq!(stats.long_rows, 1);
        assert_eq!(stats.blank_lines, 1);

        let sun = table.column("sun_hours").unwrap().str().unwrap();
        assert_eq!(sun.get(0), None);
        assert_eq!(sun.get(1), Some("55.0"));
    }

    #[test]
    fn test_custom_delimiter() {
        let file = write_lines(&["2001,1,10.5", "2001,2,"]);
        let reader = TableReader::new(file.path(), COLUMNS, 0)
            .unwrap()
            .with_delimiter(",")
            .unwrap();
        let table = reader.read_table().unwrap();

        let sun = table.column("sun_hours").unwrap().str().unwrap();
        assert_eq!(sun.get(0), Some("10.5"));
        assert_eq!(sun.get(1), Some(""));
        assert!(reader.describe().contains("skip 0 rows"));
    }

    #[test]
    fn test_unbound_station_reader_has_no_data() {
        let mut reader = StationReader::unbound(PipelineConfig::default());
        assert!(reader.table().unwrap().is_none());
        assert!(matches!(reader.read_table(), Err(ClimateError::PathUnset)));
    }

    #[test]
    fn test_station_reader_caches_until_rebound() {
        let first = write_lines(&[
            "Station",
            "2001 1 10.0 2.0 0 50.0 90.5",
            "2001 2 9.0 1.0 0 40.0 80.0#",
        ]);
        let second = write_lines(&["Station", "2002 2 8.0 1.0 3 40.0 60.0"]);

        let mut reader = StationReader::open(first.path(), PipelineConfig::default()).unwrap();
        let a = reader.table().unwrap().unwrap();
        let b = reader.table().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reader.last_report().unwrap().boundaries.skip_rows, 1);

        reader.bind(second.path()).unwrap();
        let c = reader.table().unwrap().unwrap();
        assert_eq!(c.height(), 1);
        assert_eq!(a.height(), 2);
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
