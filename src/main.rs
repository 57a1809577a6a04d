//! # api_digest
//!
//! Polls a fixed set of public JSON APIs concurrently, retries failed calls
//! with backoff, normalizes every payload into a readable article and prints
//! the articles to the console.
//!
//! ## Usage
//!
//! ```sh
//! api_digest
//! RUST_LOG=debug api_digest --sources ./sources.yaml
//! ```
//!
//! ## Architecture
//!
//! One run is one batch:
//! 1. **Fetching**: every source is requested at once, each with its own
//!    3-attempt budget and 1.5s/3.0s backoff
//! 2. **Normalizing**: each decoded payload becomes an article via a
//!    per-source extraction rule
//! 3. **Dispatch**: articles are handed to the console sink concurrently
//! 4. **Summary**: article count and elapsed time are printed
//!
//! Ctrl-C aborts the batch with a short message; nothing is persisted, so an
//! interrupted run leaves nothing behind.

use clap::Parser;
use std::error::Error;
use std::future::Future;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod batch;
mod cli;
mod error;
mod fetcher;
mod models;
mod normalize;
mod registry;
mod sink;
mod utils;

use cli::Cli;
use fetcher::{Fetcher, HttpSource};
use registry::SourceRegistry;
use sink::ConsoleSink;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    info!("api_digest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let registry = match &args.sources {
        Some(path) => SourceRegistry::from_yaml_file(path)?,
        None => SourceRegistry::builtin(),
    };
    if registry.is_empty() {
        warn!("Source registry is empty; the batch will deliver nothing");
    }
    info!(sources = registry.len(), "Source registry ready");

    let fetcher = Fetcher::new(HttpSource::new(args.timeout())?, args.retry_policy());
    let sink = ConsoleSink::new(args.sink_delay());

    tokio::select! {
        summary = batch::run_batch(registry.sources(), &fetcher, &sink) => {
            println!("\n{}", summary.report());
        }
        _ = interrupted(tokio::signal::ctrl_c()) => {
            warn!("Interrupt received; aborting batch");
            println!("\nInterrupted by user");
        }
    }

    Ok(())
}

/// Resolves when `signal` reports an interrupt.
///
/// If the handler could not be installed the error is logged and the future
/// never resolves, so the batch still runs to completion.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Could not listen for Ctrl-C; batch cannot be interrupted");
        std::future::pending::<()>().await;
    }
}
