//! Semantic search over the indexed corpus

use crate::app::{OutputFormat, SearchArgs};
use crate::AppContext;
use anyhow::Result;
use datalens_core::MetadataFilter;

pub async fn run(args: SearchArgs, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let filter = if args.filters.is_empty() {
        None
    } else {
        Some(MetadataFilter::parse_pairs(&args.filters)?)
    };

    // Over-fetch when a second selection pass will narrow the list
    let fetch = if args.rerank || args.diversify.is_some() {
        args.top_k * 3
    } else {
        args.top_k
    };

    let mut results = ctx
        .index
        .search(&args.query, fetch, filter.as_ref())
        .await?;

    if let Some(ref key) = args.diversify {
        results = ctx.reranker.diversity_rerank(results, key, args.top_k);
    } else if args.rerank {
        results = ctx
            .reranker
            .rerank(results, Some(&args.query), Some(args.top_k), None);
    } else {
        results.truncate(args.top_k);
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<_> = results.iter().map(|r| r.to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Cli => {
            if results.is_empty() {
                println!("No results");
                return Ok(());
            }
            for (rank, result) in results.iter().enumerate() {
                let chunk_type = result
                    .metadata
                    .chunk_type
                    .map(|ct| format!(" [{}]", ct))
                    .unwrap_or_default();
                println!(
                    "{:2}. {:.4}  {}{}",
                    rank + 1,
                    result.score,
                    result.document_id,
                    chunk_type
                );
                println!("      {}", truncate(&result.content, 100));
            }
        }
    }
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
