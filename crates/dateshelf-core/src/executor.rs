//! Per-file move: create directory, move or drop duplicate, reset permissions

use crate::filesystem::{Filesystem, OsFilesystem};
use std::io;
use std::path::{Path, PathBuf};

/// Result of processing one candidate file
#[derive(Debug)]
pub enum MoveOutcome {
    /// File now lives at `destination`
    Moved {
        /// Final path of the file
        destination: PathBuf,
    },
    /// Name carries no date prefix; file left alone
    SkippedNoDestination,
    /// Source disappeared between listing and processing
    SkippedVanished,
    /// A file with the same name already existed; the source was deleted
    SkippedAlreadyExists {
        /// Existing file that was kept
        destination: PathBuf,
    },
    /// Destination directory could not be created
    FailedDirectoryCreate {
        /// Directory that could not be created
        directory: PathBuf,
        /// Underlying failure
        error: io::Error,
    },
    /// Rename failed; the file stays in the source directory
    FailedMove {
        /// Path the file was supposed to land at
        destination: PathBuf,
        /// Underlying failure
        error: io::Error,
    },
    /// Duplicate source could not be deleted
    FailedDuplicateRemoval {
        /// Source file that is still present
        source: PathBuf,
        /// Underlying failure
        error: io::Error,
    },
    /// File was moved but its permissions could not be reset
    FailedPermissionReset {
        /// Final path of the file
        destination: PathBuf,
        /// Underlying failure
        error: io::Error,
    },
}

impl MoveOutcome {
    /// Whether the outcome should be reported
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MoveOutcome::FailedDirectoryCreate { .. }
                | MoveOutcome::FailedMove { .. }
                | MoveOutcome::FailedDuplicateRemoval { .. }
                | MoveOutcome::FailedPermissionReset { .. }
        )
    }

    /// Whether the file left the source directory by being moved
    pub fn is_moved(&self) -> bool {
        matches!(
            self,
            MoveOutcome::Moved { .. } | MoveOutcome::FailedPermissionReset { .. }
        )
    }
}

/// Moves single files into their resolved destination directory
///
/// # Examples
///
/// ```no_run
/// use dateshelf_core::{MoveExecutor, MoveOutcome};
/// use std::path::Path;
///
/// let executor = MoveExecutor::new(false);
/// let outcome = executor.execute(
///     Path::new("/srv/incoming/2023061512_scan.pdf"),
///     Path::new("/srv/archive/20/202306-1512"),
/// );
/// assert!(matches!(outcome, MoveOutcome::Moved { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct MoveExecutor<F = OsFilesystem> {
    fs: F,
    reset_permissions: bool,
}

impl MoveExecutor<OsFilesystem> {
    /// Create an executor on the real filesystem
    pub fn new(reset_permissions: bool) -> Self {
        Self::with_filesystem(OsFilesystem, reset_permissions)
    }
}

impl<F: Filesystem> MoveExecutor<F> {
    /// Create an executor on a custom filesystem
    pub fn with_filesystem(fs: F, reset_permissions: bool) -> Self {
        Self {
            fs,
            reset_permissions,
        }
    }

    /// Whether moved files get their permissions reset
    pub fn resets_permissions(&self) -> bool {
        self.reset_permissions
    }

    /// Process one file
    ///
    /// Never overwrites: when the destination already holds a regular file of
    /// the same name the source is deleted instead, without comparing
    /// contents. Anything else occupying the name fails the move and leaves
    /// the source in place.
    pub fn execute(&self, source: &Path, destination_dir: &Path) -> MoveOutcome {
        if !self.fs.is_file(source) {
            return MoveOutcome::SkippedVanished;
        }
        let Some(file_name) = source.file_name() else {
            return MoveOutcome::SkippedNoDestination;
        };

        if let Err(error) = self.fs.create_dir_all(destination_dir) {
            return MoveOutcome::FailedDirectoryCreate {
                directory: destination_dir.to_path_buf(),
                error,
            };
        }

        let destination = destination_dir.join(file_name);

        if self.fs.is_regular_file(&destination) {
            return self.drop_duplicate(source, destination);
        }

        match self.fs.move_file(source, &destination) {
            Ok(()) => {}
            // Another writer got there between the check and the move
            Err(error)
                if error.kind() == io::ErrorKind::AlreadyExists
                    && self.fs.is_regular_file(&destination) =>
            {
                return self.drop_duplicate(source, destination);
            }
            Err(error) => return MoveOutcome::FailedMove { destination, error },
        }
        tracing::info!(
            source = %source.display(),
            destination = %destination.display(),
            "Moved file"
        );

        if self.reset_permissions {
            if let Err(error) = self.fs.reset_permissions(&destination) {
                return MoveOutcome::FailedPermissionReset { destination, error };
            }
        }

        MoveOutcome::Moved { destination }
    }

    fn drop_duplicate(&self, source: &Path, destination: PathBuf) -> MoveOutcome {
        match self.fs.remove_file(source) {
            Ok(()) => {
                tracing::info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "Removed duplicate"
                );
                MoveOutcome::SkippedAlreadyExists { destination }
            }
            Err(error) => MoveOutcome::FailedDuplicateRemoval {
                source: source.to_path_buf(),
                error,
            },
        }
    }
}
