use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber, writing to a timestamped file in `log_dir`.
///
/// `RUST_LOG` controls the filter; `info` when unset.
pub fn init_logger(log_dir: &str) -> Result<PathBuf> {
    // Create log directory if it doesn't exist
    if !Path::new(log_dir).exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir))?;
    }

    // Create log file with timestamp
    let log_file = log_file_path(log_dir, &Local::now().format("%Y%m%d_%H%M%S").to_string());
    let file = fs::File::create(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .with_ansi(false)
        .with_writer(file)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    info!("Logger initialized, writing to {}", log_file.display());

    Ok(log_file)
}

fn log_file_path(log_dir: &str, timestamp: &str) -> PathBuf {
    Path::new(log_dir).join(format!("disposable_domains_{}.log", timestamp))
}
