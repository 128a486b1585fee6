//! Tracing setup for the command-line binary

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber writing to `log_path`, and to stderr when `verbose`.
/// Keep the returned guard alive so buffered lines are flushed on exit.
pub fn init_logging(log_path: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid log path: {:?}", log_path))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(verbose.then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()?;

    Ok(guard)
}
