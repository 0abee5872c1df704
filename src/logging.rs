//! Tracing setup. The TUI owns the terminal, so logs go to a rolling file.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogConfig};

/// Where log output should go besides the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
  /// File only (interactive terminal UI)
  FileOnly,
  /// File plus warnings on stderr (one-shot subcommands)
  FileAndStderr,
}

/// Install the global subscriber. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init(config: &LogConfig, target: LogTarget) -> Result<WorkerGuard> {
  let dir = match &config.dir {
    Some(dir) => dir.clone(),
    None => default_log_dir()?,
  };
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "vitals.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("VITALS_LOG")
    .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

  let file_layer = fmt::layer()
    .with_ansi(false)
    .with_target(true)
    .with_writer(writer);

  let stderr_layer = (target == LogTarget::FileAndStderr).then(|| {
    fmt::layer()
      .with_target(false)
      .without_time()
      .with_writer(std::io::stderr)
      .with_filter(EnvFilter::new("warn"))
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn default_log_dir() -> Result<PathBuf> {
  Ok(Config::data_dir()?.join("logs"))
}
