//! Fetch command - populate the cache from the network.

use anyhow::Result;
use clap::Args;
use layerstore_cache::Remote;
use tokio::sync::watch;
use tracing::info;

use crate::output::{print_json, OutputFormat};

use super::CommandContext;

/// Fetch a remote into the cache.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// URL of the remote.
    url: String,

    /// Fetch even if the remote is already cached.
    #[arg(long)]
    force: bool,
}

impl FetchCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let fetcher = ctx.fetcher().await?;
        let remote = Remote::new(&self.url);

        let remote = if self.force {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, cancelling fetch");
                    let _ = shutdown_tx.send(true);
                }
            });
            fetcher.download_with_shutdown(remote, shutdown_rx).await?
        } else {
            fetcher.resolve(remote).await?
        };

        match ctx.format {
            OutputFormat::Json => print_json(&remote),
            OutputFormat::Text => println!("{}", remote.file),
        }

        Ok(())
    }
}
