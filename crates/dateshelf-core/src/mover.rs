//! Single poll pass over the source directory

use crate::filesystem::{Filesystem, OsFilesystem};
use crate::{
    resolve_destination, EventCode, MoveExecutor, MoveOutcome, MoverConfig, MoverError,
    MoverMetrics, Reporter,
};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Extension of the files picked up from the source directory
const CANDIDATE_EXTENSION: &str = "pdf";

/// List `*.pdf` regular files directly inside `dir`, sorted by name
///
/// Entries that vanish while the directory is read are skipped.
pub fn list_candidates(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| is_candidate(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CANDIDATE_EXTENSION))
}

/// Runs poll passes: list, resolve, move, report
///
/// Owns the executor, the reporter and the run's metrics. A `Mover` lives on
/// the worker only, so none of its state is shared.
///
/// # Examples
///
/// ```no_run
/// use dateshelf_core::{Mover, MoverConfig, Reporter, Settings};
/// use tokio_util::sync::CancellationToken;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = Settings::new("/srv/incoming", "/srv/archive", "false");
/// let config = MoverConfig::from_settings(&settings)?;
/// let mut mover = Mover::new(config, Reporter::silent());
///
/// let pass = mover.pass(&CancellationToken::new())?;
/// println!("{}", pass.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Mover<F = OsFilesystem> {
    config: MoverConfig,
    executor: MoveExecutor<F>,
    reporter: Reporter,
    metrics: MoverMetrics,
}

impl Mover<OsFilesystem> {
    /// Create a mover on the real filesystem
    pub fn new(config: MoverConfig, reporter: Reporter) -> Self {
        Self::with_filesystem(config, OsFilesystem, reporter)
    }
}

impl<F: Filesystem> Mover<F> {
    /// Create a mover on a custom filesystem
    pub fn with_filesystem(config: MoverConfig, fs: F, reporter: Reporter) -> Self {
        let executor = MoveExecutor::with_filesystem(fs, config.reset_permissions);
        Self {
            config,
            executor,
            reporter,
            metrics: MoverMetrics::new(),
        }
    }

    /// Configuration this mover runs with
    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    /// Counters accumulated over all passes
    pub fn metrics(&self) -> &MoverMetrics {
        &self.metrics
    }

    /// Consume the mover, keeping its counters
    pub fn into_metrics(self) -> MoverMetrics {
        self.metrics
    }

    /// Reporter used for failures
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run one pass and return its counters
    ///
    /// `cancel` is checked before every file; a cancelled pass returns early
    /// with the files handled so far. Only a failure to list the source
    /// directory is returned as an error.
    pub fn pass(&mut self, cancel: &CancellationToken) -> Result<MoverMetrics, MoverError> {
        let start = Instant::now();
        let source_dir = &self.config.source_directory;
        let files = list_candidates(source_dir).map_err(|source| MoverError::ListSource {
            path: source_dir.display().to_string(),
            source,
        })?;

        let mut pass = MoverMetrics::new();
        for source in files {
            if cancel.is_cancelled() {
                tracing::debug!("Stop requested, abandoning pass");
                break;
            }
            let outcome = self.process(&source);
            self.report_outcome(&outcome);
            pass.record(&outcome);
        }

        pass.record_pass(start.elapsed());
        self.metrics.merge(&pass);
        Ok(pass)
    }

    /// Resolve and move one file
    pub fn process(&self, source: &Path) -> MoveOutcome {
        let file_name = source.file_name().and_then(OsStr::to_str);
        match resolve_destination(&self.config.destination_directory, file_name) {
            Some(destination_dir) => self.executor.execute(source, &destination_dir),
            None => MoveOutcome::SkippedNoDestination,
        }
    }

    /// Report a fatal loop failure
    pub fn report_fatal(&mut self, error: &MoverError) {
        tracing::error!(error = %error, "Poll loop failed");
        self.reporter.report(
            "An unhandled failure occurred. Service stopped.",
            error.target(),
            Some(error),
            EventCode::UnhandledFailure,
            false,
        );
    }

    fn report_outcome(&mut self, outcome: &MoveOutcome) {
        let (message, target, error, code, delayed) = match outcome {
            MoveOutcome::FailedDirectoryCreate { directory, error } => (
                "Failed to create destination directory",
                directory,
                error,
                EventCode::CreateDirectory,
                false,
            ),
            // Often a writer still holding the file; give it a few passes
            MoveOutcome::FailedMove { destination, error } => {
                ("Failed to move file", destination, error, EventCode::MoveFile, true)
            }
            MoveOutcome::FailedDuplicateRemoval { source, error } => (
                "Failed to remove duplicate file",
                source,
                error,
                EventCode::RemoveDuplicate,
                false,
            ),
            MoveOutcome::FailedPermissionReset { destination, error } => (
                "Failed to reset permissions",
                destination,
                error,
                EventCode::ResetPermissions,
                false,
            ),
            _ => return,
        };

        tracing::debug!(
            code = code.as_u32(),
            target = %target.display(),
            error = %error,
            "{}",
            message
        );
        let target = target.display().to_string();
        self.reporter
            .report(message, &target, Some(error as &dyn fmt::Display), code, delayed);
    }
}
