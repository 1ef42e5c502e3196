//! CLI commands.

mod cat;
mod dump;
mod fetch;
mod get;
mod stat;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use layerstore_cache::{CacheConfig, Fetcher, FetcherConfig, Stores};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::output::OutputFormat;

/// layerctl - inspect and populate the layerstore cache.
#[derive(Debug, Parser)]
#[command(name = "layerctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base directory of the cache.
    #[arg(long, global = true, env = "LAYERSTORE_DIR")]
    dir: Option<PathBuf>,

    /// Read cache budget per store, in bytes.
    #[arg(long, global = true, env = "LAYERSTORE_READ_CACHE_BYTES")]
    read_cache_bytes: Option<u64>,

    /// Fetch timeout in seconds (0 disables it).
    #[arg(long, global = true, env = "LAYERSTORE_FETCH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up a remote in the cache without fetching it.
    Get(get::GetCommand),

    /// Fetch a remote into the cache.
    Fetch(fetch::FetchCommand),

    /// Write a cached object to stdout.
    Cat(cat::CatCommand),

    /// Print every entry of every store.
    Dump(dump::DumpCommand),

    /// Show entry counts and sizes per store.
    Stat(stat::StatCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let mut config = CacheConfig::from_env();
        if let Some(dir) = self.dir {
            config.base_dir = dir;
        }
        if let Some(bytes) = self.read_cache_bytes {
            config.read_cache_bytes = bytes;
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        init_tracing(&config.log_level, self.log_json);

        let ctx = CommandContext {
            config,
            format: self.format,
        };

        match self.command {
            Commands::Get(cmd) => cmd.run(ctx).await,
            Commands::Fetch(cmd) => cmd.run(ctx).await,
            Commands::Cat(cmd) => cmd.run(ctx).await,
            Commands::Dump(cmd) => cmd.run(ctx).await,
            Commands::Stat(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("layerctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: CacheConfig,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Open the stores under the configured base directory.
    pub async fn open_stores(&self) -> Result<Arc<Stores>> {
        let stores = Stores::open(&self.config.base_dir, self.config.shard_config())
            .await
            .with_context(|| {
                format!(
                    "Failed to open cache at {}",
                    self.config.base_dir.display()
                )
            })?;
        Ok(Arc::new(stores))
    }

    /// Build a fetcher over freshly opened stores.
    pub async fn fetcher(&self) -> Result<Fetcher> {
        let stores = self.open_stores().await?;
        let fetcher = Fetcher::new(stores, FetcherConfig::from(&self.config))
            .context("Failed to create HTTP client")?;
        Ok(fetcher)
    }
}
