//! Show index, cache, and latency status

use crate::app::OutputFormat;
use crate::AppContext;
use anyhow::Result;

pub async fn run(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let fallback = ctx.provider.is_fallback().await;
    let model = ctx.provider.model_name().await;
    let dimension = ctx.provider.dimension().await;
    let stats = ctx.tracker.all_stats();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "index": {
                        "documents": ctx.index.count(),
                        "snapshot_path": ctx.config.index.snapshot_path,
                    },
                    "cache": {
                        "entries": ctx.cache.len(),
                        "similarity_threshold": ctx.config.cache.similarity_threshold,
                        "max_entries": ctx.config.cache.max_entries,
                    },
                    "embedding": {
                        "model": model,
                        "dimension": dimension,
                        "fallback": fallback,
                    },
                    "latency": stats,
                }))?
            );
        }
        OutputFormat::Cli => {
            println!("Index:     {} documents", ctx.index.count());
            println!(
                "Cache:     {} entries (threshold {}, capacity {})",
                ctx.cache.len(),
                ctx.config.cache.similarity_threshold,
                ctx.config.cache.max_entries
            );
            println!(
                "Embedding: {} ({} dims{})",
                model,
                dimension,
                if fallback { ", deterministic fallback" } else { "" }
            );
            if !stats.is_empty() {
                println!("Latency:");
                for (op, s) in &stats {
                    println!(
                        "  {:12} count={} mean={:.1}ms p95={:.1}ms",
                        op, s.count, s.mean_ms, s.p95_ms
                    );
                }
            }
        }
    }
    Ok(())
}
