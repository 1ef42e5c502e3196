//! Get command - look up a remote without touching the network.

use anyhow::Result;
use clap::Args;
use layerstore_cache::{CacheError, Remote};

use crate::error::CliError;
use crate::output::{print_json, OutputFormat};

use super::CommandContext;

/// Look up a remote by URL.
#[derive(Debug, Args)]
pub struct GetCommand {
    /// URL of the remote.
    url: String,
}

impl GetCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let stores = ctx.open_stores().await?;

        let mut remote = Remote::new(&self.url);
        match stores.get(&mut remote).await {
            Ok(()) => {}
            Err(CacheError::NotFound(_)) => return Err(CliError::NotCached(self.url).into()),
            Err(e) => return Err(e.into()),
        }

        match ctx.format {
            OutputFormat::Json => print_json(&remote),
            OutputFormat::Text if remote.is_resolved() => println!("{}", remote.file),
            OutputFormat::Text => return Err(CliError::NotCached(self.url).into()),
        }

        Ok(())
    }
}
