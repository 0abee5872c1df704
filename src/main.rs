mod app;
mod auth;
mod backend;
mod cache;
mod cli;
mod commands;
mod config;
mod context;
mod data;
mod error;
mod event;
mod export;
mod load;
mod logging;
mod models;
mod query;
mod reminders;
mod router;
mod stats;
mod store;
mod theme;
mod ui;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::Result;
use logging::LogTarget;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Cli::parse();
  let config = config::Config::load(args.config.as_deref())?;

  let target = match args.command {
    None | Some(Command::Ui { .. }) => LogTarget::FileOnly,
    Some(_) => LogTarget::FileAndStderr,
  };
  // Flushes buffered log lines on drop
  let _guard = logging::init(&config.log, target)?;
  tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

  let ctx = Arc::new(context::AppContext::from_config(config)?);

  match args.command {
    None => app::App::new(ctx).run("/dashboard").await,
    Some(Command::Ui { path }) => app::App::new(ctx).run(&path).await,
    Some(command) => cli::run(ctx, command).await,
  }
}
