//! DataLens Core Library
//!
//! Semantic retrieval and caching engine for natural-language analytics.
//!
//! # Features
//! - Embedding generation via external services with a deterministic
//!   offline fallback
//! - Exact cosine nearest-neighbor search with an HNSW accelerated path
//!   for large corpora
//! - Boost-based and diversity-based result reranking
//! - Similarity-keyed semantic cache that short-circuits repeated
//!   question answering

pub mod cache;
pub mod config;
pub mod embed;
pub mod error;
pub mod index;
pub mod metadata;
pub mod rerank;
pub mod telemetry;

pub use cache::{CacheEntry, CacheHit, SemanticCache};
pub use config::{CacheConfig, Config, EmbeddingServiceConfig, IndexConfig, RerankConfig};
pub use embed::{EmbeddingBackend, EmbeddingProvider, FallbackEmbedder, HttpEmbedder};
pub use error::{DataLensError, Error, Result};
pub use index::{
    cosine_similarity, Document, DocumentInput, SearchResult, VectorIndex,
};
pub use metadata::{ChunkType, DocMetadata, MetadataFilter, MetadataValue};
pub use rerank::Reranker;
pub use telemetry::{LatencySink, LatencyStats, LatencyTracker, NoopSink, Operation, TracingSink};

/// Default data directory name
pub const DATA_DIR_NAME: &str = "datalens";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "datalens";
