//! Dateshelf Core
//!
//! Polls a source directory and files date-coded documents into an archive tree.
//!
//! # Overview
//!
//! The core is responsible for:
//! - **Destination resolution**: mapping names with a ten digit prefix such as
//!   `YYYYMMDDHH` to a `<root>/YY/YYYYMM-DDHH` directory
//! - **Moving**: creating the directory, moving the file, dropping duplicates,
//!   resetting permissions
//! - **Reporting**: sending each distinct failure to a sink once, with an
//!   optional detail log file per report
//! - **Scheduling**: running passes on a background worker until stopped
//!
//! # Layout
//!
//! | Name | Resolves to |
//! |------|-------------|
//! | `2023061512_abcde.pdf` | `<root>/20/202306-1512/2023061512_abcde.pdf` |
//! | `1234567890X.pdf` | `<root>/12/123456-7890/1234567890X.pdf` |
//! | `invoice.pdf` | left in place |
//!
//! # Usage
//!
//! ## One-time Pass
//!
//! ```no_run
//! use dateshelf_core::{Mover, MoverConfig, Reporter, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new("/srv/incoming", "/srv/archive", "false");
//! let mut mover = Mover::new(MoverConfig::from_settings(&settings)?, Reporter::silent());
//!
//! let pass = mover.pass(&CancellationToken::new())?;
//! println!("{}", pass.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Background Worker
//!
//! ```no_run
//! use dateshelf_core::{Scheduler, SchedulerOptions, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new("/srv/incoming", "/srv/archive", "true")
//!         .with_log_directory("/var/log/dateshelf");
//!     let mut scheduler = Scheduler::new(settings, SchedulerOptions::default(), None);
//!
//!     scheduler.start()?;
//!     tokio::signal::ctrl_c().await?;
//!     scheduler.stop();
//!     scheduler.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! # Reporting
//!
//! Failures go through [`Reporter`] to a [`ReportSink`]. Each
//! `(code, target)` pair is emitted once per run; move failures are only
//! emitted after they repeated for the configured grace count, since a file
//! still being written usually clears up on its own.

#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod filesystem;
mod metrics;
mod mover;
mod reporter;
mod resolver;
mod scheduler;

pub use config::{MoverConfig, SchedulerOptions, Settings};
pub use error::MoverError;
pub use executor::{MoveExecutor, MoveOutcome};
pub use filesystem::{Filesystem, OsFilesystem};
pub use metrics::MoverMetrics;
pub use mover::{list_candidates, Mover};
pub use reporter::{EventCode, ReportSink, ReportState, Reporter, Severity};
pub use resolver::{resolve_destination, MIN_NAME_LEN};
pub use scheduler::{ExitStatus, Scheduler, SchedulerState};
