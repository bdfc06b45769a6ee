//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "datalens")]
#[command(
    author,
    version,
    about = "Semantic retrieval and caching engine for natural-language analytics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest pre-chunked documents from a JSON file
    Ingest(IngestArgs),

    /// Semantic search over the indexed corpus
    Search(SearchArgs),

    /// Delete a document by id
    Delete(DeleteArgs),

    /// Show index, cache, and latency status
    Status,

    /// Inspect or clear the semantic cache
    Cache(CacheArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Path to a JSON array of {id, content, metadata?, embedding?}
    pub file: PathBuf,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Natural-language query
    pub query: String,

    /// Maximum number of results
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Metadata equality filters, e.g. --filter chunk_type=metric
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Apply the boost-based reranker to the candidates
    #[arg(long)]
    pub rerank: bool,

    /// Diversify results across this metadata key instead of reranking
    #[arg(long, value_name = "KEY", conflicts_with = "rerank")]
    pub diversify: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Document id to remove
    pub id: String,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show entry count and configuration
    Stats,
    /// Drop all cached entries
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Cli,
    /// JSON output
    Json,
}
