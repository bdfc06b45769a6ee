//! DataLens CLI
//!
//! Semantic retrieval and caching for natural-language analytics.

use clap::Parser;
use datalens_core::error::exit_codes;
use datalens_core::{
    Config, DataLensError, EmbeddingProvider, LatencyTracker, Reranker, SemanticCache, VectorIndex,
};
use std::sync::Arc;

mod app;
mod commands;

use app::{Cli, Commands};

/// Components built once at startup and passed into commands
pub struct AppContext {
    pub config: Config,
    pub provider: Arc<EmbeddingProvider>,
    pub index: VectorIndex,
    pub reranker: Reranker,
    pub cache: SemanticCache,
    pub tracker: Arc<LatencyTracker>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<DataLensError>()
            .map(DataLensError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    let config = Config::load()?;
    let tracker = LatencyTracker::shared();
    let sink: Arc<dyn datalens_core::LatencySink> = tracker.clone();

    let provider = Arc::new(EmbeddingProvider::with_sink(
        config.embedding.clone(),
        Arc::clone(&sink),
    ));
    let index = VectorIndex::with_sink(Arc::clone(&provider), Arc::clone(&sink))
        .with_ann_threshold(config.index.ann_build_threshold);
    let reranker = Reranker::with_sink(config.rerank.clone(), Arc::clone(&sink));
    let cache = SemanticCache::open_with_sink(
        Arc::clone(&provider),
        config.cache.clone(),
        Arc::clone(&sink),
    )?;

    // Restore the corpus from the last snapshot; a missing file is a
    // fresh index
    index.load(&config.index.snapshot_path)?;

    let ctx = AppContext {
        config,
        provider,
        index,
        reranker,
        cache,
        tracker,
    };

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &ctx, cli.format).await,
        Commands::Search(args) => commands::search::run(args, &ctx, cli.format).await,
        Commands::Delete(args) => commands::delete::run(args, &ctx, cli.format).await,
        Commands::Status => commands::status::run(&ctx, cli.format).await,
        Commands::Cache(args) => commands::cache::run(args, &ctx, cli.format).await,
    }
}
