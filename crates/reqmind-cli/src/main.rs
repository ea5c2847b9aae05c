//! ReqMind: answers questions about requirements documents with cited sources.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod display;
mod interactive;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The env file may set RUST_LOG, so load it before tracing starts.
    reqmind_core::config::load_env_file(cli.env_file.as_deref())?;

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let orchestrator = app::build(&cli)?;

    let outcome = match &cli.query {
        Some(question) => orchestrator
            .answer(question)
            .await
            .context("Could not answer the question")
            .and_then(|result| display::print_result(&result, cli.json)),
        None => interactive::run(&orchestrator).await,
    };

    match Arc::try_unwrap(orchestrator.into_index()) {
        Ok(index) => index.close()?,
        Err(_) => warn!("Index still shared at shutdown, skipping close"),
    }
    info!("Shutdown complete");
    outcome
}
