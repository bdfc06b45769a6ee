//! Inspect or clear the semantic cache

use crate::app::{CacheAction, CacheArgs, OutputFormat};
use crate::AppContext;
use anyhow::Result;

pub async fn run(args: CacheArgs, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    match args.action {
        CacheAction::Stats => match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "entries": ctx.cache.len(),
                        "similarity_threshold": ctx.config.cache.similarity_threshold,
                        "max_entries": ctx.config.cache.max_entries,
                        "path": ctx.config.cache.path,
                    })
                );
            }
            OutputFormat::Cli => {
                println!(
                    "{} entries (threshold {}, capacity {})",
                    ctx.cache.len(),
                    ctx.config.cache.similarity_threshold,
                    ctx.config.cache.max_entries
                );
                println!("Backing file: {}", ctx.config.cache.path.display());
            }
        },
        CacheAction::Clear => {
            let count = ctx.cache.len();
            ctx.cache.clear()?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "cleared": count }))
                }
                OutputFormat::Cli => println!("Cleared {} entries", count),
            }
        }
    }
    Ok(())
}
