//! Background poll loop and its lifecycle

use crate::filesystem::{Filesystem, OsFilesystem};
use crate::{
    Mover, MoverConfig, MoverError, MoverMetrics, ReportSink, Reporter, SchedulerOptions,
    Settings,
};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Stopped on request or after the configured passes
    Success,
    /// Invalid configuration or a fatal loop failure
    Failure,
}

impl ExitStatus {
    /// Whether the run ended cleanly
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }

    /// Process exit code for this status
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

/// Lifecycle of a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not started
    Idle,
    /// Checking settings
    Validating,
    /// Worker is polling
    Running,
    /// Worker finished or never got to run
    Stopped(ExitStatus),
}

impl SchedulerState {
    /// Exit status once stopped
    pub fn exit_status(self) -> Option<ExitStatus> {
        match self {
            SchedulerState::Stopped(status) => Some(status),
            _ => None,
        }
    }
}

/// Owns the poll loop: validates settings, runs the worker, stops it
///
/// The controller and the worker share only the cancellation token and the
/// state channel. Each pass runs on a blocking thread that owns the
/// [`Mover`] for its duration.
///
/// # Examples
///
/// ```no_run
/// use dateshelf_core::{Scheduler, SchedulerOptions, Settings};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = Settings::new("/srv/incoming", "/srv/archive", "true");
///     let mut scheduler = Scheduler::new(settings, SchedulerOptions::default(), None);
///
///     scheduler.start()?;
///     tokio::signal::ctrl_c().await?;
///     scheduler.stop();
///
///     let status = scheduler.wait().await;
///     println!("stopped: {status:?}");
///     Ok(())
/// }
/// ```
pub struct Scheduler<F = OsFilesystem> {
    settings: Settings,
    options: SchedulerOptions,
    sink: Option<Arc<dyn ReportSink>>,
    fs: Option<F>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
    handle: Option<JoinHandle<MoverMetrics>>,
    metrics: Option<MoverMetrics>,
}

impl<F> fmt::Debug for Scheduler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("settings", &self.settings)
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .field("stop_requested", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Scheduler<OsFilesystem> {
    /// Create a scheduler on the real filesystem
    pub fn new(
        settings: Settings,
        options: SchedulerOptions,
        sink: Option<Arc<dyn ReportSink>>,
    ) -> Self {
        Self::with_filesystem(settings, options, sink, OsFilesystem)
    }
}

impl<F: Filesystem> Scheduler<F> {
    /// Create a scheduler on a custom filesystem
    pub fn with_filesystem(
        settings: Settings,
        options: SchedulerOptions,
        sink: Option<Arc<dyn ReportSink>>,
        fs: F,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            settings,
            options,
            sink,
            fs: Some(fs),
            cancel: CancellationToken::new(),
            state: Arc::new(state),
            handle: None,
            metrics: None,
        }
    }

    /// Validate settings and launch the worker
    ///
    /// Returns as soon as the worker is spawned. Must be called from within a
    /// tokio runtime. On invalid settings the error is reported, the scheduler
    /// moves to `Stopped(Failure)` and the error is returned.
    pub fn start(&mut self) -> Result<(), MoverError> {
        if self.state() != SchedulerState::Idle {
            return Err(MoverError::AlreadyStarted);
        }
        if self.cancel.is_cancelled() {
            tracing::info!("Stop requested before start, not starting");
            self.state.send_replace(SchedulerState::Stopped(ExitStatus::Success));
            return Ok(());
        }

        self.state.send_replace(SchedulerState::Validating);
        let config = match MoverConfig::from_settings(&self.settings) {
            Ok(config) => config,
            Err(e) => {
                self.report_invalid(&e);
                self.state.send_replace(SchedulerState::Stopped(ExitStatus::Failure));
                return Err(e);
            }
        };
        let fs = self.fs.take().ok_or(MoverError::AlreadyStarted)?;

        tracing::info!(
            source = %config.source_directory.display(),
            destination = %config.destination_directory.display(),
            reset_permissions = config.reset_permissions,
            interval = ?self.options.poll_interval,
            "File mover starting"
        );

        let reporter = Reporter::new(
            self.sink.clone(),
            config.log_directory.clone(),
            self.options.move_failure_grace,
        );
        let mover = Mover::with_filesystem(config, fs, reporter);

        self.state.send_replace(SchedulerState::Running);
        self.handle = Some(tokio::spawn(run_worker(
            mover,
            self.options.clone(),
            self.cancel.clone(),
            Arc::clone(&self.state),
        )));
        Ok(())
    }

    /// Request the worker to halt; does not wait
    ///
    /// One-way and idempotent. An in-flight file operation completes; no
    /// further file or pass is started.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stop requested");
        }
        self.cancel.cancel();
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Exit status, available once stopped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.state().exit_status()
    }

    /// Resolve once the scheduler reaches `Stopped`, without consuming the worker
    pub async fn stopped(&self) -> ExitStatus {
        let mut rx = self.state.subscribe();
        let status = rx
            .wait_for(|state| state.exit_status().is_some())
            .await
            .map(|state| state.exit_status());
        status.ok().flatten().unwrap_or(ExitStatus::Failure)
    }

    /// Wait for the worker to finish and return its exit status
    ///
    /// Does not request a stop. A scheduler that never started reports
    /// success.
    pub async fn wait(&mut self) -> ExitStatus {
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(metrics) => self.metrics = Some(metrics),
                Err(e) => {
                    tracing::error!(error = %e, "Worker task failed");
                    self.state.send_replace(SchedulerState::Stopped(ExitStatus::Failure));
                }
            }
        }
        self.exit_status().unwrap_or(ExitStatus::Success)
    }

    /// Counters of the finished run, available after [`Scheduler::wait`]
    pub fn metrics(&self) -> Option<&MoverMetrics> {
        self.metrics.as_ref()
    }

    fn report_invalid(&self, error: &MoverError) {
        tracing::error!(error = %error, "Invalid configuration");
        let detail = std::error::Error::source(error).map(|source| source.to_string());
        let mut reporter = Reporter::new(self.sink.clone(), None, 0);
        reporter.report(
            &error.to_string(),
            error.target(),
            detail.as_ref().map(|d| d as &dyn fmt::Display),
            error.event_code(),
            false,
        );
    }
}

impl<F> Drop for Scheduler<F> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker<F: Filesystem>(
    mut mover: Mover<F>,
    options: SchedulerOptions,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
) -> MoverMetrics {
    tracing::info!("Worker started");

    let status = loop {
        if cancel.is_cancelled() {
            break ExitStatus::Success;
        }

        let token = cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| mover.pass(&token)));
            (mover, result)
        })
        .await;

        let (returned, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Pass task lost, stopping");
                state.send_replace(SchedulerState::Stopped(ExitStatus::Failure));
                return MoverMetrics::default();
            }
        };
        mover = returned;

        match result {
            Ok(Ok(pass)) if pass.has_activity() => tracing::info!(
                moved = pass.moved,
                duplicates_removed = pass.duplicates_removed,
                failures = pass.total_failures(),
                "Pass completed"
            ),
            Ok(Ok(_)) => tracing::debug!("Pass completed, nothing to do"),
            Ok(Err(e)) => {
                mover.report_fatal(&e);
                break ExitStatus::Failure;
            }
            Err(payload) => {
                mover.report_fatal(&MoverError::Worker(panic_message(payload.as_ref())));
                break ExitStatus::Failure;
            }
        }

        if options
            .max_passes
            .is_some_and(|max| mover.metrics().pass_count >= max)
        {
            break ExitStatus::Success;
        }

        tokio::select! {
            _ = cancel.cancelled() => break ExitStatus::Success,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    };

    tracing::info!(
        ?status,
        "Worker stopped. Final metrics:\n{}",
        mover.metrics().summary()
    );
    state.send_replace(SchedulerState::Stopped(status));
    mover.into_metrics()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pass panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        codes: Mutex<Vec<u32>>,
    }

    impl ReportSink for RecordingSink {
        fn write_entry(&self, _message: &str, _severity: Severity, code: u32) {
            self.codes.lock().unwrap().push(code);
        }
    }

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let root = TempDir::new().unwrap();
        let source = root.path().join("in");
        let dest = root.path().join("out");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&dest).unwrap();
        (root, source, dest)
    }

    fn options() -> SchedulerOptions {
        SchedulerOptions {
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_settings_stop_before_running() {
        let sink = Arc::new(RecordingSink::default());
        let settings = Settings::new("/definitely/not/here", "/nor/here", "true");
        let mut scheduler = Scheduler::new(settings, options(), Some(sink.clone()));

        let err = scheduler.start().unwrap_err();

        assert!(matches!(err, MoverError::InvalidSourceDirectory(_)));
        assert_eq!(scheduler.state(), SchedulerState::Stopped(ExitStatus::Failure));
        assert_eq!(scheduler.wait().await, ExitStatus::Failure);
        assert_eq!(*sink.codes.lock().unwrap(), vec![3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_flag_reported_with_own_code() {
        let (_root, source, dest) = dirs();
        let sink = Arc::new(RecordingSink::default());
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "yes");
        let mut scheduler = Scheduler::new(settings, options(), Some(sink.clone()));

        assert!(scheduler.start().is_err());
        assert_eq!(*sink.codes.lock().unwrap(), vec![5]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_stop_lifecycle() {
        let (_root, source, dest) = dirs();
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "false");
        let mut scheduler = Scheduler::new(settings, options(), None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.start().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(matches!(scheduler.start(), Err(MoverError::AlreadyStarted)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.stop();
        scheduler.stop();

        assert_eq!(scheduler.wait().await, ExitStatus::Success);
        assert_eq!(scheduler.exit_status(), Some(ExitStatus::Success));
        assert!(scheduler.metrics().unwrap().pass_count >= 1);
        assert!(scheduler.is_stop_requested());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_max_passes_stops_on_its_own() {
        let (_root, source, dest) = dirs();
        fs::write(source.join("2023061512_abcde.pdf"), b"pdf").unwrap();
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "false");
        let options = SchedulerOptions {
            max_passes: Some(2),
            ..options()
        };
        let mut scheduler = Scheduler::new(settings, options, None);

        scheduler.start().unwrap();
        assert_eq!(scheduler.stopped().await, ExitStatus::Success);
        assert_eq!(scheduler.wait().await, ExitStatus::Success);

        let metrics = scheduler.metrics().unwrap();
        assert_eq!(metrics.pass_count, 2);
        assert_eq!(metrics.moved, 1);
        assert!(dest.join("20/202306-1512/2023061512_abcde.pdf").is_file());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stopped_resolves_for_every_ending() {
        let settings = Settings::new("/definitely/not/here", "/nor/here", "true");
        let mut failed = Scheduler::new(settings, options(), None);
        assert!(failed.start().is_err());
        assert_eq!(failed.stopped().await, ExitStatus::Failure);

        let (_root, source, dest) = dirs();
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "false");
        let mut running = Scheduler::new(settings, options(), None);
        running.start().unwrap();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            running.stop();
        };
        let (status, ()) = tokio::time::timeout(
            Duration::from_secs(5),
            async { tokio::join!(running.stopped(), stopper) },
        )
        .await
        .unwrap();

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(running.wait().await, ExitStatus::Success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_before_start_never_runs() {
        let (_root, source, dest) = dirs();
        let file = source.join("2023061512_abcde.pdf");
        fs::write(&file, b"pdf").unwrap();
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "false");
        let mut scheduler = Scheduler::new(settings, options(), None);

        scheduler.stop();
        scheduler.start().unwrap();

        assert_eq!(scheduler.wait().await, ExitStatus::Success);
        assert!(file.exists());
        assert!(scheduler.metrics().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_vanished_source_directory_is_fatal() {
        let (_root, source, dest) = dirs();
        let sink = Arc::new(RecordingSink::default());
        let settings = Settings::new(source.to_string_lossy(), dest.to_string_lossy(), "false");
        let options = SchedulerOptions {
            poll_interval: Duration::from_millis(50),
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(settings, options, Some(sink.clone()));

        scheduler.start().unwrap();
        fs::remove_dir(&source).unwrap();

        assert_eq!(scheduler.wait().await, ExitStatus::Failure);
        assert_eq!(*sink.codes.lock().unwrap(), vec![9]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "pass panicked");
    }

    #[test]
    fn test_exit_status_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert!(ExitStatus::Success.is_success());
        assert_eq!(SchedulerState::Running.exit_status(), None);
    }
}
