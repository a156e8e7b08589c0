//! Spool - pluggable log/event streaming pipeline
//!
//! # Usage
//!
//! ```bash
//! # Run with the default configuration file
//! spool
//!
//! # Explicit configuration and log level
//! spool --config configs/spool.toml --log-level debug
//! ```
//!
//! The configuration document declares plugin nodes; see
//! `configs/spool.toml` for a commented example. SIGINT/SIGTERM stop the
//! pipeline with a full drain; SIGHUP rolls every plugin (file handles
//! reopen).

mod builder;
mod config;
mod serve;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Spool - pluggable log/event streaming pipeline
#[derive(Parser, Debug)]
#[command(name = "spool")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/spool.toml")]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    serve::run(&cli.config).await
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| anyhow::anyhow!("invalid log level: {err}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
