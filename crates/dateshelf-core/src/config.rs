//! Configuration for the file mover
//!
//! [`Settings`] mirrors the raw key/value settings handed over by the host.
//! [`MoverConfig`] is the validated form the poll loop runs with, and
//! [`SchedulerOptions`] holds the timing knobs that are not part of the
//! settings file.

use crate::MoverError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the file written and removed again to prove the log directory is writable
const PROBE_FILE_NAME: &str = ".dateshelf-probe";

/// Raw settings as read from the external configuration source
///
/// Keys use the PascalCase names of the settings file. Missing required keys
/// deserialize to empty strings and are rejected by [`MoverConfig::from_settings`].
///
/// # Examples
///
/// ```
/// use dateshelf_core::Settings;
///
/// let settings = Settings::new("/srv/incoming", "/srv/archive", "true");
/// assert_eq!(settings.reset_permissions_after_move, "true");
/// assert!(settings.log_directory.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    /// Directory polled for incoming files
    #[serde(default)]
    pub source_directory: String,

    /// Root directory files are moved into
    #[serde(default)]
    pub destination_directory: String,

    /// `"true"` or `"false"`; kept as text so validation can report bad values
    #[serde(default)]
    pub reset_permissions_after_move: String,

    /// Optional directory for detailed failure logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_directory: Option<String>,
}

impl Settings {
    /// Build settings without a log directory
    pub fn new(
        source_directory: impl Into<String>,
        destination_directory: impl Into<String>,
        reset_permissions_after_move: impl Into<String>,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            destination_directory: destination_directory.into(),
            reset_permissions_after_move: reset_permissions_after_move.into(),
            log_directory: None,
        }
    }

    /// Set the detail log directory
    pub fn with_log_directory(mut self, log_directory: impl Into<String>) -> Self {
        self.log_directory = Some(log_directory.into());
        self
    }
}

/// Validated configuration the poll loop runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoverConfig {
    /// Existing directory polled for `*.pdf` files
    pub source_directory: PathBuf,
    /// Existing root under which date directories are created
    pub destination_directory: PathBuf,
    /// Reset permissions of each moved file
    pub reset_permissions: bool,
    /// Writable directory for detailed failure logs
    pub log_directory: Option<PathBuf>,
}

impl MoverConfig {
    /// Validate raw settings
    ///
    /// Checks run in order: source directory, destination directory,
    /// permission flag, log directory. The first failing check is returned.
    pub fn from_settings(settings: &Settings) -> Result<Self, MoverError> {
        let source_directory = PathBuf::from(&settings.source_directory);
        if settings.source_directory.is_empty() || !source_directory.is_dir() {
            return Err(MoverError::InvalidSourceDirectory(
                settings.source_directory.clone(),
            ));
        }

        let destination_directory = PathBuf::from(&settings.destination_directory);
        if settings.destination_directory.is_empty() || !destination_directory.is_dir() {
            return Err(MoverError::InvalidDestinationDirectory(
                settings.destination_directory.clone(),
            ));
        }

        let reset_permissions = parse_bool(&settings.reset_permissions_after_move).ok_or_else(
            || MoverError::InvalidResetPermissions(settings.reset_permissions_after_move.clone()),
        )?;

        let log_directory = match settings.log_directory.as_deref() {
            None | Some("") => None,
            Some(dir) => {
                let path = PathBuf::from(dir);
                probe_writable(&path).map_err(|source| MoverError::LogDirectoryNotWritable {
                    path: dir.to_string(),
                    source,
                })?;
                Some(path)
            }
        };

        Ok(Self {
            source_directory,
            destination_directory,
            reset_permissions,
            log_directory,
        })
    }
}

/// Accepts `true`/`false` in any letter case, surrounding whitespace ignored
fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn probe_writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(PROBE_FILE_NAME);
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)
}

/// Timing and reporting knobs of the scheduler
///
/// # Examples
///
/// ```
/// use dateshelf_core::SchedulerOptions;
/// use std::time::Duration;
///
/// let options = SchedulerOptions::default();
/// assert_eq!(options.poll_interval, Duration::from_secs(3));
/// assert_eq!(options.move_failure_grace, 15);
/// assert!(options.max_passes.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Pause between two passes
    pub poll_interval: Duration,

    /// Repeat occurrences of a move failure swallowed before it is reported
    pub move_failure_grace: u32,

    /// Stop with success after this many passes; `None` runs until stopped
    pub max_passes: Option<u64>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            move_failure_grace: 15,
            max_passes: None,
        }
    }
}

impl SchedulerOptions {
    /// Options for a single pass, used for one-shot runs
    pub fn single_pass() -> Self {
        Self {
            max_passes: Some(1),
            ..Self::default()
        }
    }
}
