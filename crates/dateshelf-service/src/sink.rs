//! Report sink writing to the process log

use dateshelf_core::{ReportSink, Severity};

/// [`ReportSink`] that turns every entry into a `tracing` event
///
/// Plays the part of the system event log: errors are logged at `error`,
/// information entries at `info`, both tagged with the source name and code.
#[derive(Debug, Clone)]
pub struct TracingSink {
    source: String,
}

impl TracingSink {
    /// Create a sink tagging entries with `source`
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Source name attached to every entry
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl ReportSink for TracingSink {
    fn write_entry(&self, message: &str, severity: Severity, code: u32) {
        match severity {
            Severity::Error => tracing::error!(source = %self.source, code, "{}", message),
            Severity::Information => tracing::info!(source = %self.source, code, "{}", message),
        }
    }
}
