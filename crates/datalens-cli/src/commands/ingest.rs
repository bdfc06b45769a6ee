//! Ingest pre-chunked documents from a JSON file

use crate::app::{IngestArgs, OutputFormat};
use crate::AppContext;
use anyhow::{Context, Result};
use datalens_core::DocumentInput;

pub async fn run(args: IngestArgs, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let inputs: Vec<DocumentInput> = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", args.file.display()))?;

    let added = ctx.index.add_documents(inputs).await?;
    ctx.index.save(&ctx.config.index.snapshot_path)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "added": added, "total": ctx.index.count() })
        ),
        OutputFormat::Cli => {
            println!("Added {} documents ({} total)", added, ctx.index.count())
        }
    }
    Ok(())
}
