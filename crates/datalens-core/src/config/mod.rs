//! Configuration management

use crate::error::Result;
use crate::metadata::ChunkType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingServiceConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Semantic cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Reranker configuration
    #[serde(default)]
    pub rerank: RerankConfig,
}

/// Embedding service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingServiceConfig {
    /// Base URL of the embedding service (OpenAI-compatible /v1/embeddings).
    /// When unset or unreachable, the provider degrades to the deterministic
    /// hash-based fallback.
    #[serde(default)]
    pub url: Option<String>,

    /// Model name for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension. Used directly by the fallback backend and as a
    /// sanity check against the real backend's first response.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Batch size for bulk embedding
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATALENS_EMBEDDING_URL").ok(),
            model: default_embedding_model(),
            dimension: std::env::var("DATALENS_EMBEDDING_DIMS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_dimension),
            api_key: std::env::var("DATALENS_EMBEDDING_API_KEY").ok(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String {
    std::env::var("DATALENS_EMBEDDING_MODEL")
        .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string())
}

fn default_dimension() -> usize {
    384
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    32
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Snapshot file path
    #[serde(default = "default_index_path")]
    pub snapshot_path: PathBuf,

    /// Minimum corpus size before the HNSW index is built.
    /// Below this, brute-force exact scoring is fast enough.
    #[serde(default = "default_ann_threshold")]
    pub ann_build_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_index_path(),
            ann_build_threshold: default_ann_threshold(),
        }
    }
}

fn default_index_path() -> PathBuf {
    data_dir().join("index.json")
}

fn default_ann_threshold() -> usize {
    1000
}

/// Semantic cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backing file path
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Minimum cosine similarity for a cache hit. 0.95 is a strict
    /// near-duplicate bound, not a loose paraphrase bound.
    #[serde(default = "default_cache_threshold")]
    pub similarity_threshold: f32,

    /// Maximum number of entries; the oldest entry is evicted first
    #[serde(default = "default_cache_capacity")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            similarity_threshold: default_cache_threshold(),
            max_entries: default_cache_capacity(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    data_dir().join("semantic_cache.json")
}

fn default_cache_threshold() -> f32 {
    0.95
}

fn default_cache_capacity() -> usize {
    512
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Score multipliers by chunk type
    #[serde(default = "default_boosts")]
    pub boosts: HashMap<ChunkType, f32>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            boosts: default_boosts(),
        }
    }
}

/// Reference boost table: metric and example chunks over raw column chunks
pub fn default_boosts() -> HashMap<ChunkType, f32> {
    HashMap::from([
        (ChunkType::Metric, 1.3),
        (ChunkType::Table, 1.2),
        (ChunkType::Query, 1.1),
        (ChunkType::Column, 1.0),
        (ChunkType::Relationship, 0.9),
    ])
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::DATA_DIR_NAME)
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.cache.similarity_threshold, 0.95);
        assert_eq!(config.cache.max_entries, 512);
        assert_eq!(config.index.ann_build_threshold, 1000);
        assert_eq!(config.rerank.boosts[&ChunkType::Metric], 1.3);
        assert_eq!(config.rerank.boosts[&ChunkType::Relationship], 0.9);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.cache.similarity_threshold,
            config.cache.similarity_threshold
        );
        assert_eq!(parsed.rerank.boosts.len(), config.rerank.boosts.len());
    }
}
