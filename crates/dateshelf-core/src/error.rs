//! Error types for file mover operations

use crate::reporter::EventCode;
use std::io;
use thiserror::Error;

/// Errors that can occur while validating settings or running the poll loop
#[derive(Error, Debug)]
pub enum MoverError {
    /// Source directory is missing or not a directory
    #[error("Invalid source directory: {0:?}")]
    InvalidSourceDirectory(String),

    /// Destination root is missing or not a directory
    #[error("Invalid destination directory: {0:?}")]
    InvalidDestinationDirectory(String),

    /// `ResetPermissionsAfterMove` is not a boolean
    #[error("Invalid value for ResetPermissionsAfterMove: {0:?}. Valid values are \"true\" or \"false\"")]
    InvalidResetPermissions(String),

    /// Log directory could not be created or written
    #[error("Log directory {path:?} is not writable: {source}")]
    LogDirectoryNotWritable {
        /// Configured log directory
        path: String,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Listing the source directory failed
    #[error("Failed to list source directory {path:?}: {source}")]
    ListSource {
        /// Source directory being polled
        path: String,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// A pass panicked or the worker task was lost
    #[error("Worker error: {0}")]
    Worker(String),

    /// `start()` was called on a scheduler that already left `Idle`
    #[error("Scheduler has already been started")]
    AlreadyStarted,
}

impl MoverError {
    /// Code under which this error is reported to the sink
    pub fn event_code(&self) -> EventCode {
        match self {
            MoverError::InvalidSourceDirectory(_) => EventCode::InvalidSourceDirectory,
            MoverError::InvalidDestinationDirectory(_) => EventCode::InvalidDestinationDirectory,
            MoverError::InvalidResetPermissions(_) => EventCode::InvalidResetPermissions,
            MoverError::LogDirectoryNotWritable { .. } => EventCode::InvalidLogDirectory,
            MoverError::ListSource { .. } | MoverError::Worker(_) | MoverError::AlreadyStarted => {
                EventCode::UnhandledFailure
            }
        }
    }

    /// Path or value the error concerns, used as the deduplication target
    pub fn target(&self) -> &str {
        match self {
            MoverError::InvalidSourceDirectory(value)
            | MoverError::InvalidDestinationDirectory(value)
            | MoverError::InvalidResetPermissions(value) => value,
            MoverError::LogDirectoryNotWritable { path, .. }
            | MoverError::ListSource { path, .. } => path,
            MoverError::Worker(_) | MoverError::AlreadyStarted => "",
        }
    }

    /// Whether this error stems from settings validation
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            MoverError::InvalidSourceDirectory(_)
                | MoverError::InvalidDestinationDirectory(_)
                | MoverError::InvalidResetPermissions(_)
                | MoverError::LogDirectoryNotWritable { .. }
        )
    }
}
