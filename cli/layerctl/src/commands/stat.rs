//! Stat command - entry counts and sizes per store.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use layerstore_cache::{summarize, StoreKind};

use crate::output::{print_json, OutputFormat};

use super::CommandContext;

/// Show per-store entry counts and sizes.
#[derive(Debug, Args)]
pub struct StatCommand {}

impl StatCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let stores = ctx.open_stores().await?;
        let summaries = summarize(&stores).await?;

        match ctx.format {
            OutputFormat::Json => print_json(&summaries),
            OutputFormat::Text => {
                println!("{:<10} {:>10} {:>16}", "STORE", "ENTRIES", "BYTES");
                for summary in &summaries {
                    println!(
                        "{:<10} {:>10} {:>16}",
                        summary.kind, summary.entries, summary.total_bytes
                    );
                }

                // Landing entries only survive failed fetches
                let download = StoreKind::Download.to_string();
                if let Some(stale) = summaries.iter().find(|s| s.kind == download && s.entries > 0) {
                    println!(
                        "\n{}",
                        format!(
                            "{} landing entries left behind by failed fetches.",
                            stale.entries
                        )
                        .yellow()
                    );
                }
            }
        }

        Ok(())
    }
}
