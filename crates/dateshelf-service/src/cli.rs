//! Command-line arguments

use clap::Parser;
use dateshelf_core::SchedulerOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Dateshelf - file date-coded PDFs into an archive tree.
#[derive(Debug, Parser)]
#[command(name = "dateshelf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file path (TOML)
    #[arg(short, long, env = "DATESHELF_CONFIG", default_value = "dateshelf.toml")]
    pub config: PathBuf,

    /// Log filter directive (e.g. `info`, `dateshelf_core=debug`)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Do not send reports anywhere
    #[arg(long)]
    pub no_sink: bool,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Pause between passes, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub poll_interval_ms: u64,
}

impl Cli {
    /// Worker options selected by the arguments
    pub fn scheduler_options(&self) -> SchedulerOptions {
        let base = if self.once {
            SchedulerOptions::single_pass()
        } else {
            SchedulerOptions::default()
        };
        SchedulerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..base
        }
    }
}
