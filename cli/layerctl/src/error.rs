//! Error handling and display for the CLI.

use colored::Colorize;
use layerstore_cache::CacheError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Not cached: {0}")]
    NotCached(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::NotCached(name) => {
                eprintln!(
                    "\n{}",
                    format!("Hint: Run `layerctl fetch {name}` to populate the cache.").yellow()
                );
            }
            CliError::ObjectNotFound(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Use `layerctl get <url>` to find the content hash of a remote.".yellow()
                );
            }
        }
        return;
    }

    match err.downcast_ref::<CacheError>() {
        Some(CacheError::Network { .. } | CacheError::Http(_)) => {
            eprintln!(
                "\n{}",
                "Hint: Check the URL and your network connection.".yellow()
            );
        }
        Some(CacheError::Corrupt(_) | CacheError::Decode { .. }) => {
            eprintln!(
                "\n{}",
                "Hint: Inspect the cache directory with `layerctl dump`.".yellow()
            );
        }
        _ => {}
    }
}
