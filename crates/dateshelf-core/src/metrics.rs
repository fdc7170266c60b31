//! Metrics collection for poll passes

use crate::MoveOutcome;
use std::time::Duration;

/// Outcome counters for one pass or a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoverMetrics {
    /// Files moved into their date directory
    pub moved: usize,

    /// Sources deleted because the destination already held the name
    pub duplicates_removed: usize,

    /// Files whose name carries no date prefix
    pub skipped_no_destination: usize,

    /// Files gone before they could be processed
    pub skipped_vanished: usize,

    /// Destination directories that could not be created
    pub directory_failures: usize,

    /// Renames that failed
    pub move_failures: usize,

    /// Duplicates that could not be deleted
    pub removal_failures: usize,

    /// Moved files whose permissions could not be reset
    pub permission_failures: usize,

    /// Passes completed
    pub pass_count: u64,

    /// Time spent inside passes
    pub total_runtime: Duration,
}

impl MoverMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one file outcome
    pub fn record(&mut self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::Moved { .. } => self.moved += 1,
            MoveOutcome::SkippedNoDestination => self.skipped_no_destination += 1,
            MoveOutcome::SkippedVanished => self.skipped_vanished += 1,
            MoveOutcome::SkippedAlreadyExists { .. } => self.duplicates_removed += 1,
            MoveOutcome::FailedDirectoryCreate { .. } => self.directory_failures += 1,
            MoveOutcome::FailedMove { .. } => self.move_failures += 1,
            MoveOutcome::FailedDuplicateRemoval { .. } => self.removal_failures += 1,
            MoveOutcome::FailedPermissionReset { .. } => {
                // The file did move
                self.moved += 1;
                self.permission_failures += 1;
            }
        }
    }

    /// Record a pass completion
    pub fn record_pass(&mut self, elapsed: Duration) {
        self.pass_count += 1;
        self.total_runtime += elapsed;
    }

    /// Fold another set of counters into this one
    pub fn merge(&mut self, other: &MoverMetrics) {
        self.moved += other.moved;
        self.duplicates_removed += other.duplicates_removed;
        self.skipped_no_destination += other.skipped_no_destination;
        self.skipped_vanished += other.skipped_vanished;
        self.directory_failures += other.directory_failures;
        self.move_failures += other.move_failures;
        self.removal_failures += other.removal_failures;
        self.permission_failures += other.permission_failures;
        self.pass_count += other.pass_count;
        self.total_runtime += other.total_runtime;
    }

    /// Failures of any kind
    pub fn total_failures(&self) -> usize {
        self.directory_failures
            + self.move_failures
            + self.removal_failures
            + self.permission_failures
    }

    /// Whether any file changed place or failed
    pub fn has_activity(&self) -> bool {
        self.moved + self.duplicates_removed + self.total_failures() > 0
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Mover Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Passes: {}", self.pass_count),
            format!("Total runtime: {}ms", self.total_runtime.as_millis()),
            format!("Moved: {}", self.moved),
            format!("Duplicates removed: {}", self.duplicates_removed),
            format!(
                "Skipped: {} without date prefix, {} vanished",
                self.skipped_no_destination, self.skipped_vanished
            ),
        ];

        if self.total_failures() > 0 {
            lines.push(String::new());
            lines.push("Failures:".to_string());
            lines.push(format!("  Create directory: {}", self.directory_failures));
            lines.push(format!("  Move: {}", self.move_failures));
            lines.push(format!("  Remove duplicate: {}", self.removal_failures));
            lines.push(format!("  Reset permissions: {}", self.permission_failures));
            lines.push(format!("  Total: {}", self.total_failures()));
        }

        lines.join("\n")
    }
}
