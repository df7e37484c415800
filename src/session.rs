//! Data session: one station file, one aggregator.
//!
//! A session is the unit a front end talks to. It owns its reader and its
//! group aggregator, so independent sessions never share cached state.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::grouper::{GroupAggregator, GroupRequest};
use crate::models::ReadReport;
use crate::profile::{MonthProfile, month_profile};
use crate::reader::StationReader;
use crate::source::SourceFile;
use crate::table::Table;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct DataSession {
    config: PipelineConfig,
    reader: StationReader,
    grouper: GroupAggregator,
}

impl DataSession {
    /// Create a session with no file bound
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            reader: StationReader::unbound(config.clone()),
            grouper: GroupAggregator::new(),
            config,
        })
    }

    /// Create a session bound to `path`
    pub fn open(path: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        let mut session = Self::new(config)?;
        session.bind_path(path)?;
        Ok(session)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bind_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.reader.bind(path)
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.reader.source()
    }

    pub fn last_report(&self) -> Option<&ReadReport> {
        self.reader.last_report()
    }

    /// The cleaned, date indexed table. `None` when no file is bound.
    pub fn table(&mut self) -> Result<Option<Arc<Table>>> {
        self.reader.table()
    }

    /// Re-read the bound file from disk
    pub fn reload(&mut self) -> Result<Option<Arc<Table>>> {
        self.reader.read()
    }

    /// Grouped summary using the configured key and reductions
    pub fn summary(&mut self) -> Result<Option<Arc<Table>>> {
        let request = GroupRequest::new()
            .group_by(self.config.group_by.clone())
            .aggregate(self.config.aggregation.clone());
        self.summarise(request)
    }

    /// Grouped summary with per-call overrides layered over the bound table
    pub fn summarise(&mut self, request: GroupRequest) -> Result<Option<Arc<Table>>> {
        let Some(table) = self.reader.table()? else {
            debug!("Summary requested with no station file bound");
            return Ok(None);
        };

        let request = GroupRequest {
            table: Some(table),
            ..request
        };
        self.grouper.aggregate(request).map(Some)
    }

    /// Temperature profile of the observed month nearest `month`
    pub fn profile(&mut self, month: f64) -> Result<Option<MonthProfile>> {
        let Some(table) = self.reader.table()? else {
            return Ok(None);
        };

        month_profile(&table, month, &self.config.schema, &self.config.histogram).map(Some)
    }

    pub fn grouper(&self) -> &GroupAggregator {
        &self.grouper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouper::GrouperState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn station_file() -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Test Station").unwrap();
        writeln!(temp_file, "   yyyy  mm   tmax    tmin      af    rain     sun").unwrap();
        writeln!(temp_file, "   2001   1   10.0     2.0       0    50.0    90.0").unwrap();
        writeln!(temp_file, "   2001   2   12.0     4.0       1    40.0    80.5#").unwrap();
        writeln!(temp_file, "   2002   1    8.0     0.0       4    30.0    70.0*").unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_unbound_session_has_no_summary() {
        let mut session = DataSession::new(PipelineConfig::default()).unwrap();
        assert!(session.summary().unwrap().is_none());
        assert!(session.profile(1.0).unwrap().is_none());
    }

    #[test]
    fn test_summary_is_cached_between_calls() {
        let file = station_file();
        let mut session = DataSession::open(file.path(), PipelineConfig::default()).unwrap();

        let first = session.summary().unwrap().unwrap();
        let second = session.summary().unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.grouper().state(), GrouperState::Grouped);
        assert_eq!(first.height(), 2);
    }

    #[test]
    fn test_summarise_with_override() {
        let file = station_file();
        let mut session = DataSession::open(file.path(), PipelineConfig::default()).unwrap();

        let by_year = session
            .summarise(GroupRequest::new().group_by(["year"]).aggregate(
                "rain_mm=sum".parse().unwrap(),
            ))
            .unwrap()
            .unwrap();

        let rain = by_year.column("rain_mm").unwrap().f64().unwrap();
        assert_eq!(rain.get(0), Some(90.0));
        assert_eq!(rain.get(1), Some(30.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig::default().with_delimiter("(");
        assert!(DataSession::new(config).is_err());
    }
}
