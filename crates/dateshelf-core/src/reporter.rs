//! Deduplicating failure reporter
//!
//! A stuck file fails the same way on every pass. [`Reporter`] makes sure each
//! distinct `(code, target)` pair reaches the [`ReportSink`] at most once per
//! reporter lifetime, optionally only after a grace period of repeats.

use chrono::Local;
use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collision suffixes tried before a detail log write gives up
const MAX_DETAIL_FILE_ATTEMPTS: u32 = 100;

/// Severity of a sink entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Failure needing attention
    Error,
    /// Lifecycle notice
    Information,
}

/// Numeric codes written with every sink entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventCode {
    /// Host started the service
    ServiceStarted = 1,
    /// Host stopped the service
    ServiceStopped = 2,
    /// `SourceDirectory` does not exist
    InvalidSourceDirectory = 3,
    /// `DestinationDirectory` does not exist
    InvalidDestinationDirectory = 4,
    /// `ResetPermissionsAfterMove` is not a boolean
    InvalidResetPermissions = 5,
    /// `LogDirectory` is not writable
    InvalidLogDirectory = 6,
    /// The poll loop died
    UnhandledFailure = 9,
    /// Destination directory could not be created
    CreateDirectory = 10,
    /// File could not be moved
    MoveFile = 20,
    /// Duplicate source could not be deleted
    RemoveDuplicate = 21,
    /// Permissions of a moved file could not be reset
    ResetPermissions = 30,
}

impl EventCode {
    /// Numeric value handed to the sink
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Destination of emitted reports, e.g. a system event log
pub trait ReportSink: Send + Sync {
    /// Write one entry
    fn write_entry(&self, message: &str, severity: Severity, code: u32);
}

/// Per-key reporting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    /// Already emitted; further occurrences are dropped
    Suppressed,
    /// Delayed report waiting for `remaining` more occurrences
    Pending {
        /// Occurrences still swallowed before emitting
        remaining: u32,
    },
}

/// Deduplicating reporter owned by one scheduler run
///
/// # Examples
///
/// ```
/// use dateshelf_core::{EventCode, ReportSink, Reporter, Severity};
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<u32>>);
///
/// impl ReportSink for Collect {
///     fn write_entry(&self, _message: &str, _severity: Severity, code: u32) {
///         self.0.lock().unwrap().push(code);
///     }
/// }
///
/// let sink = Arc::new(Collect::default());
/// let mut reporter = Reporter::new(Some(sink.clone()), None, 15);
///
/// for _ in 0..5 {
///     reporter.report(
///         "Failed to create destination directory",
///         "/a",
///         None,
///         EventCode::CreateDirectory,
///         false,
///     );
/// }
/// assert_eq!(*sink.0.lock().unwrap(), vec![10]);
/// ```
pub struct Reporter {
    sink: Option<Arc<dyn ReportSink>>,
    log_directory: Option<PathBuf>,
    grace: u32,
    states: HashMap<(EventCode, String), ReportState>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("has_sink", &self.sink.is_some())
            .field("log_directory", &self.log_directory)
            .field("grace", &self.grace)
            .field("tracked_keys", &self.states.len())
            .finish()
    }
}

impl Reporter {
    /// Create a reporter
    ///
    /// `grace` is the number of repeat occurrences a delayed report swallows
    /// after its first occurrence before it is emitted.
    pub fn new(
        sink: Option<Arc<dyn ReportSink>>,
        log_directory: Option<PathBuf>,
        grace: u32,
    ) -> Self {
        Self {
            sink,
            log_directory,
            grace,
            states: HashMap::new(),
        }
    }

    /// Reporter that drops everything, for interactive runs
    pub fn silent() -> Self {
        Self::new(None, None, 0)
    }

    /// Current state of a key, if it has been seen
    pub fn state(&self, code: EventCode, target: &str) -> Option<ReportState> {
        self.states.get(&(code, target.to_string())).copied()
    }

    /// Report a failure; returns whether the sink received an entry
    ///
    /// Never fails: problems writing the detail log fall back to an inline
    /// entry.
    pub fn report(
        &mut self,
        message: &str,
        target: &str,
        error: Option<&dyn fmt::Display>,
        code: EventCode,
        delayed: bool,
    ) -> bool {
        let Some(sink) = self.sink.clone() else {
            tracing::debug!(code = code.as_u32(), target, "No report sink: {}", message);
            return false;
        };

        let key = (code, target.to_string());
        let next = match self.states.get(&key) {
            Some(ReportState::Suppressed) => return false,
            Some(ReportState::Pending { remaining }) if *remaining > 0 => {
                ReportState::Pending {
                    remaining: remaining - 1,
                }
            }
            None if delayed => ReportState::Pending {
                remaining: self.grace,
            },
            Some(ReportState::Pending { .. }) | None => ReportState::Suppressed,
        };
        self.states.insert(key, next);

        if next != ReportState::Suppressed {
            tracing::debug!(code = code.as_u32(), target, ?next, "Report delayed");
            return false;
        }

        let detail = error.map(|e| e.to_string()).unwrap_or_default();
        let entry = self.compose_entry(message, target, &detail);
        sink.write_entry(&entry, Severity::Error, code.as_u32());
        true
    }

    /// Write an information entry, bypassing deduplication
    pub fn inform(&self, message: &str, code: EventCode) {
        if let Some(sink) = &self.sink {
            sink.write_entry(message, Severity::Information, code.as_u32());
        }
    }

    fn compose_entry(&self, message: &str, target: &str, detail: &str) -> String {
        let Some(dir) = &self.log_directory else {
            return format!(
                "{message}\n\nTarget: {target}\n\n{detail}\n\n(Detailed logging unavailable: LogDirectory is not configured)"
            );
        };

        match write_detail_file(dir, message, target, detail) {
            Ok(path) => format!(
                "{message}\n\nTarget: {target}\n\nDetails: {}",
                path.display()
            ),
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Failed to write detail log"
                );
                format!(
                    "{message}\n\nTarget: {target}\n\n{detail}\n\n(Detailed logging failed: {e})"
                )
            }
        }
    }
}

/// Write one detail file named after the current local time
fn write_detail_file(dir: &Path, message: &str, target: &str, detail: &str) -> io::Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d%H%M%S%3f").to_string();

    for attempt in 0..MAX_DETAIL_FILE_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stamp}.txt")
        } else {
            format!("{stamp}-{attempt}.txt")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                write!(file, "{message}\n\nTarget: {target}\n\n{detail}\n")?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free detail log name for {stamp}"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<(String, Severity, u32)>>,
    }

    impl RecordingSink {
        fn entries(&self) -> Vec<(String, Severity, u32)> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl ReportSink for RecordingSink {
        fn write_entry(&self, message: &str, severity: Severity, code: u32) {
            self.entries
                .lock()
                .unwrap()
                .push((message.to_string(), severity, code));
        }
    }

    fn reporter(log_directory: Option<PathBuf>) -> (Arc<RecordingSink>, Reporter) {
        let sink = Arc::new(RecordingSink::default());
        let reporter = Reporter::new(Some(sink.clone()), log_directory, 3);
        (sink, reporter)
    }

    #[test]
    fn test_immediate_report_emits_once() {
        let (sink, mut reporter) = reporter(None);

        let emitted: Vec<bool> = (0..10)
            .map(|_| reporter.report("Failed", "/x", None, EventCode::CreateDirectory, false))
            .collect();

        assert_eq!(emitted.iter().filter(|e| **e).count(), 1);
        assert!(emitted[0]);
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(
            reporter.state(EventCode::CreateDirectory, "/x"),
            Some(ReportState::Suppressed)
        );
    }

    #[test]
    fn test_delayed_report_waits_for_grace() {
        let (sink, mut reporter) = reporter(None);

        // First occurrence plus three graced repeats stay silent
        for _ in 0..4 {
            assert!(!reporter.report("Failed to move file", "/y", None, EventCode::MoveFile, true));
        }
        assert!(sink.entries().is_empty());
        assert_eq!(
            reporter.state(EventCode::MoveFile, "/y"),
            Some(ReportState::Pending { remaining: 0 })
        );

        assert!(reporter.report("Failed to move file", "/y", None, EventCode::MoveFile, true));
        for _ in 0..20 {
            assert!(!reporter.report("Failed to move file", "/y", None, EventCode::MoveFile, true));
        }
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn test_keys_are_distinct_per_code_and_target() {
        let (sink, mut reporter) = reporter(None);

        reporter.report("a", "/x", None, EventCode::CreateDirectory, false);
        reporter.report("b", "/y", None, EventCode::CreateDirectory, false);
        reporter.report("c", "/x", None, EventCode::ResetPermissions, false);
        reporter.report("d", "/x", None, EventCode::CreateDirectory, false);

        let codes: Vec<u32> = sink.entries().iter().map(|(_, _, code)| *code).collect();
        assert_eq!(codes, vec![10, 10, 30]);
    }

    #[test]
    fn test_inline_entry_without_log_directory() {
        let (sink, mut reporter) = reporter(None);
        let error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");

        reporter.report(
            "Failed to reset permissions",
            "/z",
            Some(&error),
            EventCode::ResetPermissions,
            false,
        );

        let (message, severity, code) = &sink.entries()[0];
        assert_eq!(*severity, Severity::Error);
        assert_eq!(*code, 30);
        assert!(message.starts_with("Failed to reset permissions"));
        assert!(message.contains("Target: /z"));
        assert!(message.contains("access denied"));
        assert!(message.contains("Detailed logging unavailable"));
    }

    #[test]
    fn test_detail_file_written_to_log_directory() {
        let logs = TempDir::new().unwrap();
        let (sink, mut reporter) = reporter(Some(logs.path().to_path_buf()));
        let error = io::Error::other("disk on fire");

        reporter.report(
            "Failed to create destination directory",
            "/d",
            Some(&error),
            EventCode::CreateDirectory,
            false,
        );

        let files: Vec<PathBuf> = fs::read_dir(logs.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), "yyyyMMddHHmmssfff.txt".len());
        assert!(name[..17].bytes().all(|b| b.is_ascii_digit()));

        let content = fs::read_to_string(&files[0]).unwrap();
        assert!(content.contains("Failed to create destination directory"));
        assert!(content.contains("Target: /d"));
        assert!(content.contains("disk on fire"));

        let (message, _, _) = &sink.entries()[0];
        assert!(message.contains(&files[0].display().to_string()));
        assert!(!message.contains("disk on fire"));
    }

    #[test]
    fn test_detail_file_names_do_not_collide() {
        let logs = TempDir::new().unwrap();
        let (_sink, mut reporter) = reporter(Some(logs.path().to_path_buf()));

        for i in 0..5 {
            reporter.report("Failed", &format!("/t{i}"), None, EventCode::CreateDirectory, false);
        }

        assert_eq!(fs::read_dir(logs.path()).unwrap().count(), 5);
    }

    #[test]
    fn test_unwritable_log_directory_falls_back_inline() {
        let logs = TempDir::new().unwrap();
        let missing = logs.path().join("gone");
        let (sink, mut reporter) = reporter(Some(missing));

        assert!(reporter.report("Failed", "/q", Some(&"boom"), EventCode::MoveFile, false));

        let (message, _, _) = &sink.entries()[0];
        assert!(message.contains("boom"));
        assert!(message.contains("Detailed logging failed"));
    }

    #[test]
    fn test_without_sink_is_silent() {
        let mut reporter = Reporter::silent();
        assert!(!reporter.report("Failed", "/x", None, EventCode::CreateDirectory, false));
        assert_eq!(reporter.state(EventCode::CreateDirectory, "/x"), None);
        reporter.inform("Service started.", EventCode::ServiceStarted);
    }

    #[test]
    fn test_inform_is_not_deduplicated() {
        let (sink, reporter) = reporter(None);
        reporter.inform("Service started.", EventCode::ServiceStarted);
        reporter.inform("Service started.", EventCode::ServiceStarted);

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, Severity::Information);
        assert_eq!(entries[0].2, 1);
    }
}
