//! Delete a document by id

use crate::app::{DeleteArgs, OutputFormat};
use crate::AppContext;
use anyhow::Result;
use datalens_core::DataLensError;

pub async fn run(args: DeleteArgs, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    if !ctx.index.delete_document(&args.id) {
        return Err(DataLensError::DocumentNotFound(args.id).into());
    }
    ctx.index.save(&ctx.config.index.snapshot_path)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "id": args.id, "deleted": true }))
        }
        OutputFormat::Cli => println!("Deleted '{}'", args.id),
    }
    Ok(())
}
