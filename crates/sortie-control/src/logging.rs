use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Stdout plus one plain-text file per launch under `log_dir`. Keep the
/// returned guard alive for the life of the process or buffered lines are
/// lost.
pub fn init(log_dir: &Path, debug: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &file_name));

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()?;

    tracing::info!(file = %log_dir.join(&file_name).display(), "logging to file");
    Ok(guard)
}
