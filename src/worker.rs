//! Background session worker.
//!
//! Runs a `DataSession` on a blocking thread so a front end never waits on
//! file I/O or aggregation. Commands go in over one channel and results
//! come back over another; the session itself stays single threaded.

use crate::config::PipelineConfig;
use crate::error::{ClimateError, Result};
use crate::profile::MonthProfile;
use crate::session::DataSession;
use crate::table::Table;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error};

const CHANNEL_CAPACITY: usize = 16;

/// Requests understood by the worker
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Bind a new file and publish its summary
    SetFilePath(PathBuf),
    /// Re-publish the summary for the bound file
    Refresh,
    /// Publish the profile for the month nearest the value
    FilterMonth(f64),
    Shutdown,
}

/// Results published by the worker
#[derive(Debug)]
pub enum SessionEvent {
    NewData(Arc<Table>),
    MonthProfile(MonthProfile),
    /// A command needed a file but none is bound
    NoData,
    Failed(ClimateError),
}

/// Handle to a running session worker
#[derive(Debug)]
pub struct SessionWorker {
    commands: mpsc::Sender<SessionCommand>,
    handle: JoinHandle<()>,
}

impl SessionWorker {
    /// Start a worker; events arrive on the returned receiver
    pub fn spawn(config: PipelineConfig) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let mut session = DataSession::new(config)?;
        let (command_tx, mut command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = task::spawn_blocking(move || {
            while let Some(command) = command_rx.blocking_recv() {
                debug!("Session worker received {:?}", command);

                let event = match command {
                    SessionCommand::Shutdown => break,
                    SessionCommand::SetFilePath(path) => session
                        .bind_path(&path)
                        .and_then(|_| session.summary())
                        .map(|summary| summary.map(SessionEvent::NewData)),
                    SessionCommand::Refresh => session
                        .summary()
                        .map(|summary| summary.map(SessionEvent::NewData)),
                    SessionCommand::FilterMonth(month) => session
                        .profile(month)
                        .map(|profile| profile.map(SessionEvent::MonthProfile)),
                };

                let event = match event {
                    Ok(Some(event)) => event,
                    Ok(None) => SessionEvent::NoData,
                    Err(e) => {
                        error!("Session command failed: {}", e);
                        SessionEvent::Failed(e)
                    }
                };

                if event_tx.blocking_send(event).is_err() {
                    debug!("Event receiver dropped, stopping session worker");
                    break;
                }
            }
        });

        Ok((
            Self {
                commands: command_tx,
                handle,
            },
            event_rx,
        ))
    }

    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClimateError::WorkerStopped)
    }

    /// Stop the worker and wait for it to finish
    pub async fn shutdown(self) -> Result<()> {
        // A worker that already stopped has nothing left to shut down
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        drop(self.commands);

        self.handle.await.map_err(|e| {
            error!("Session worker did not exit cleanly: {}", e);
            ClimateError::WorkerStopped
        })
    }
}
