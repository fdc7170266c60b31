//! Dateshelf service binary
//!
//! Runs the mover until Ctrl+C, or once with `--once`.

use clap::Parser;
use dateshelf_core::ReportSink;
use dateshelf_service::{cli::Cli, load_settings, Service, ServiceError, TracingSink, SOURCE_NAME};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32, ServiceError> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let settings = load_settings(&cli.config)?;
    tracing::info!(config = %cli.config.display(), "Loaded settings");

    let sink: Option<Arc<dyn ReportSink>> = if cli.no_sink {
        None
    } else {
        Some(Arc::new(TracingSink::new(SOURCE_NAME)))
    };

    let mut service = Service::new(settings, cli.scheduler_options(), sink);
    let status = service.run_until(tokio::signal::ctrl_c()).await?;
    Ok(status.code())
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
