//! Dump command - print every entry of every store.

use anyhow::Result;
use clap::Args;
use layerstore_cache::DumpOptions;

use super::CommandContext;

/// Print one line per entry: kind, key, length and a preview of the value.
#[derive(Debug, Args)]
pub struct DumpCommand {
    /// Hex-encode previews.
    #[arg(long)]
    hex: bool,

    /// Number of value bytes to preview.
    #[arg(long, default_value_t = 64)]
    preview: usize,
}

impl DumpCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let stores = ctx.open_stores().await?;
        let options = DumpOptions {
            hex: self.hex,
            preview_len: self.preview,
        };

        let mut stdout = std::io::stdout().lock();
        layerstore_cache::dump(&stores, &options, &mut stdout).await?;
        Ok(())
    }
}
