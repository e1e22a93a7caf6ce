mod api;
mod cache;
mod commands;
mod config;
mod logging;
mod prefs;
mod store;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cm-analyzer")]
#[command(about = "Multilingual text analysis from the command line, with a local response cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cm-analyzer/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log at debug level (RUST_LOG overrides)
  #[arg(short, long)]
  verbose: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init_logging(args.verbose, args.log_file.as_deref())?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let services = commands::Services::open(config);

  // Drop entries that expired while nothing was running
  services.cache.clean_expired();

  commands::run(args.command, &services).await
}
