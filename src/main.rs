//! TWOOPT binary.
//!
//! Loads `.env`, initialises structured logging, parses the command line
//! and runs the chosen stage. Ctrl+C asks a running orchestration to stop
//! after its current iteration; the partial results are still saved.

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use twoopt::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    info!(command = ?cli.command, "TWOOPT starting");

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current iteration");
            flag.store(true, Ordering::SeqCst);
        }
    });

    if let Err(e) = cli::run(cli, cancel).await {
        error!(error = %format!("{e:#}"), "TWOOPT failed");
        return Err(e);
    }
    info!("TWOOPT finished");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("twoopt=info"));

    let json_logging = std::env::var("TWOOPT_LOG_JSON").is_ok();

    // Logs go to stderr, stdout carries command output.
    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
