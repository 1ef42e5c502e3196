//! Cat command - stream a cached object to stdout.

use anyhow::Result;
use clap::Args;
use layerstore_cache::CacheError;
use tokio::io::AsyncWriteExt;

use crate::error::CliError;

use super::CommandContext;

/// Write an object's bytes to stdout.
#[derive(Debug, Args)]
pub struct CatCommand {
    /// Content hash of the object.
    hash: String,
}

impl CatCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let stores = ctx.open_stores().await?;

        let mut object = match stores.object_stream(&self.hash).await {
            Ok(object) => object,
            Err(CacheError::NotFound(_)) => return Err(CliError::ObjectNotFound(self.hash).into()),
            Err(e) => return Err(e.into()),
        };

        let mut stdout = tokio::io::stdout();
        tokio::io::copy(&mut object, &mut stdout).await?;
        stdout.flush().await?;
        Ok(())
    }
}
