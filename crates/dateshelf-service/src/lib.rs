//! Dateshelf Service
//!
//! Host adapter around the dateshelf worker: loads settings, writes the
//! start and stop entries, and runs the worker until shutdown.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod sink;

use dateshelf_core::{
    EventCode, ExitStatus, MoverError, MoverMetrics, ReportSink, Reporter, Scheduler,
    SchedulerOptions, Settings,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

pub use config::{load_settings, parse_settings, ConfigError};
pub use sink::TracingSink;

/// Source name attached to report entries
pub const SOURCE_NAME: &str = "dateshelf";

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker refused to start
    #[error(transparent)]
    Mover(#[from] MoverError),
}

/// Hosted mover service
pub struct Service {
    scheduler: Scheduler,
    reporter: Reporter,
}

impl Service {
    /// Create a service; nothing runs until [`Service::on_start`]
    pub fn new(
        settings: Settings,
        options: SchedulerOptions,
        sink: Option<Arc<dyn ReportSink>>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(settings, options, sink.clone()),
            reporter: Reporter::new(sink, None, 0),
        }
    }

    /// Announce the start and launch the worker
    pub fn on_start(&mut self) -> Result<(), ServiceError> {
        self.reporter
            .inform("Service started.", EventCode::ServiceStarted);
        self.scheduler.start()?;
        Ok(())
    }

    /// Request the worker to stop and announce it
    pub fn on_stop(&self) {
        self.scheduler.stop();
        self.reporter
            .inform("Service stopped.", EventCode::ServiceStopped);
    }

    /// Resolves once the worker has stopped for any reason
    pub async fn stopped(&self) -> ExitStatus {
        self.scheduler.stopped().await
    }

    /// Wait for the worker to finish and return its exit status
    pub async fn wait(&mut self) -> ExitStatus {
        self.scheduler.wait().await
    }

    /// Totals collected by the finished worker
    pub fn metrics(&self) -> Option<&MoverMetrics> {
        self.scheduler.metrics()
    }

    /// Run until `shutdown` resolves or the worker stops by itself
    ///
    /// A start failure still writes the stop entry before the error is
    /// returned.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<ExitStatus, ServiceError>
    where
        S: Future,
    {
        if let Err(e) = self.on_start() {
            self.on_stop();
            return Err(e);
        }

        tokio::select! {
            _ = shutdown => tracing::info!("Shutdown requested"),
            status = self.scheduler.stopped() => {
                tracing::info!(?status, "Worker stopped on its own");
            }
        }

        self.on_stop();
        Ok(self.wait().await)
    }
}
