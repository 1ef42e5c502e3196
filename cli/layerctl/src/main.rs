//! layerctl - operator CLI for the layerstore cache.
//!
//! Looks up, fetches and inspects cached remotes from a shell. Image
//! extraction is left to the runtime; this tool only talks to the cache.

use anyhow::Result;
use clap::Parser;

mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
