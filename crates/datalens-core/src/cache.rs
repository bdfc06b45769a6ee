//! Semantic cache
//!
//! Keyed by embedding similarity rather than exact text: a lookup embeds
//! the query and linear-scans cosine similarity against every stored
//! entry, returning the prior answer when the best match clears the
//! configured threshold. Short-circuits the expensive SQL-generation and
//! answer pipeline for near-duplicate questions.

use crate::config::CacheConfig;
use crate::embed::EmbeddingProvider;
use crate::error::{DataLensError, Result};
use crate::index::cosine_similarity;
use crate::telemetry::{LatencySink, NoopSink, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// A cached question/answer record. Append-only; never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub generated_query: String,
    pub result_payload: serde_json::Value,
    pub answer: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A cache hit with the similarity that produced it
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub similarity: f32,
}

/// Similarity-keyed answer cache with JSON persistence
pub struct SemanticCache {
    provider: Arc<EmbeddingProvider>,
    entries: RwLock<Vec<CacheEntry>>,
    path: PathBuf,
    similarity_threshold: f32,
    max_entries: usize,
    sink: Arc<dyn LatencySink>,
}

impl SemanticCache {
    /// Open the cache, loading any persisted entries.
    ///
    /// A missing backing file is a fresh cache; a corrupt one fails loudly.
    pub fn open(provider: Arc<EmbeddingProvider>, config: CacheConfig) -> Result<Self> {
        Self::open_with_sink(provider, config, Arc::new(NoopSink))
    }

    pub fn open_with_sink(
        provider: Arc<EmbeddingProvider>,
        config: CacheConfig,
        sink: Arc<dyn LatencySink>,
    ) -> Result<Self> {
        let entries = Self::load_entries(&config.path)?;
        if !entries.is_empty() {
            tracing::info!(count = entries.len(), "loaded semantic cache");
        }

        Ok(Self {
            provider,
            entries: RwLock::new(entries),
            path: config.path,
            similarity_threshold: config.similarity_threshold,
            max_entries: config.max_entries.max(1),
            sink,
        })
    }

    fn load_entries(path: &std::path::Path) -> Result<Vec<CacheEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| DataLensError::CorruptSnapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Find a semantically near-duplicate prior answer. Never mutates state.
    ///
    /// Returns a hit only when the best cosine similarity clears the
    /// configured threshold.
    pub async fn lookup(&self, query: &str) -> Result<Option<CacheHit>> {
        if self.len() == 0 {
            return Ok(None);
        }

        let start = Instant::now();
        let query_vec = self.provider.embed_one(query).await?;

        let hit = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .iter()
                .map(|entry| (entry, cosine_similarity(&query_vec, &entry.embedding)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .filter(|(_, similarity)| *similarity >= self.similarity_threshold)
                .map(|(entry, similarity)| CacheHit {
                    entry: entry.clone(),
                    similarity,
                })
        };

        if let Some(ref hit) = hit {
            tracing::debug!(
                query,
                cached_query = %hit.entry.query,
                similarity = hit.similarity,
                "semantic cache hit"
            );
        }

        self.sink.record(
            Operation::CacheLookup,
            start.elapsed(),
            None,
            &[("hit", hit.is_some().to_string())],
        );

        Ok(hit)
    }

    /// Store a successful downstream answer.
    ///
    /// A no-op when a near-duplicate entry already exists; the duplicate
    /// check and the append happen under one write lock, so concurrent
    /// stores of the same query insert exactly once. At capacity the oldest
    /// entry is evicted first. A failed persistence write is logged and the
    /// in-memory entry kept; the next successful store rewrites the full
    /// file.
    pub async fn store(
        &self,
        query: &str,
        generated_query: &str,
        result_payload: serde_json::Value,
        answer: &str,
    ) -> Result<bool> {
        let start = Instant::now();
        let embedding = self.provider.embed_one(query).await?;

        let entry = CacheEntry {
            query: query.to_string(),
            generated_query: generated_query.to_string(),
            result_payload,
            answer: answer.to_string(),
            embedding,
            created_at: Utc::now(),
        };

        let stored = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

            let duplicate = entries.iter().any(|existing| {
                cosine_similarity(&entry.embedding, &existing.embedding)
                    >= self.similarity_threshold
            });
            if duplicate {
                false
            } else {
                if entries.len() >= self.max_entries {
                    let evicted = entries.remove(0);
                    tracing::debug!(query = %evicted.query, "evicted oldest cache entry");
                }
                entries.push(entry);

                if let Err(e) = self.persist(&entries) {
                    tracing::warn!(
                        error = %e,
                        path = %self.path.display(),
                        "failed to persist semantic cache; entry kept in memory"
                    );
                }
                true
            }
        };

        if stored {
            tracing::debug!(query, "cached new query");
        }

        self.sink
            .record(Operation::CacheStore, start.elapsed(), None, &[]);

        Ok(stored)
    }

    /// Full rewrite of the backing file; bounded by `max_entries`
    fn persist(&self, entries: &[CacheEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries and remove the backing file
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use tempfile::TempDir;

    fn test_cache(dir: &TempDir, threshold: f32, max_entries: usize) -> SemanticCache {
        let config = CacheConfig {
            path: dir.path().join("cache.json"),
            similarity_threshold: threshold,
            max_entries,
        };
        SemanticCache::open(Arc::new(EmbeddingProvider::fallback_only(64)), config).unwrap()
    }

    #[tokio::test]
    async fn test_self_similarity_hit() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir, 0.95, 512);

        cache
            .store(
                "total revenue by region",
                "SELECT region, SUM(revenue) FROM sales GROUP BY region",
                serde_json::json!({"rows": 4}),
                "Revenue was highest in EMEA.",
            )
            .await
            .unwrap();

        let hit = cache.lookup("total revenue by region").await.unwrap().unwrap();
        assert!((hit.similarity - 1.0).abs() < 1e-5);
        assert_eq!(hit.entry.answer, "Revenue was highest in EMEA.");

        // Unrelated text stays below the strict threshold
        assert!(cache
            .lookup("completely unrelated text")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_store_is_noop_on_near_duplicate() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir, 0.95, 512);

        let stored = cache
            .store("q1", "SELECT 1", serde_json::json!(null), "one")
            .await
            .unwrap();
        assert!(stored);

        let stored_again = cache
            .store("q1", "SELECT 2", serde_json::json!(null), "two")
            .await
            .unwrap();
        assert!(!stored_again);
        assert_eq!(cache.len(), 1);

        // Original answer wins
        let hit = cache.lookup("q1").await.unwrap().unwrap();
        assert_eq!(hit.entry.answer, "one");
    }

    #[tokio::test]
    async fn test_concurrent_stores_insert_once() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(test_cache(&dir, 0.95, 512));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&cache);
                tokio::spawn(async move {
                    c.store("same question", "SELECT 1", serde_json::json!(null), "a")
                        .await
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(EmbeddingProvider::fallback_only(64));
        let config = CacheConfig {
            path: dir.path().join("cache.json"),
            similarity_threshold: 0.95,
            max_entries: 512,
        };

        {
            let cache = SemanticCache::open(Arc::clone(&provider), config.clone()).unwrap();
            cache
                .store("monthly churn", "SELECT ...", serde_json::json!([1, 2]), "2%")
                .await
                .unwrap();
        }

        let reopened = SemanticCache::open(provider, config).unwrap();
        assert_eq!(reopened.len(), 1);
        let hit = reopened.lookup("monthly churn").await.unwrap().unwrap();
        assert_eq!(hit.entry.answer, "2%");
        assert_eq!(hit.entry.result_payload, serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_corrupt_backing_file_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let config = CacheConfig {
            path,
            similarity_threshold: 0.95,
            max_entries: 512,
        };
        let err = SemanticCache::open(Arc::new(EmbeddingProvider::fallback_only(64)), config)
            .err()
            .unwrap();
        assert!(matches!(err, DataLensError::CorruptSnapshot { .. }));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir, 0.95, 2);

        cache
            .store("first query", "s1", serde_json::json!(null), "a1")
            .await
            .unwrap();
        cache
            .store("second query", "s2", serde_json::json!(null), "a2")
            .await
            .unwrap();
        cache
            .store("third query", "s3", serde_json::json!(null), "a3")
            .await
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("first query").await.unwrap().is_none());
        assert!(cache.lookup("third query").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lookup_never_mutates() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir, 0.95, 512);
        cache
            .store("q", "s", serde_json::json!(null), "a")
            .await
            .unwrap();

        for _ in 0..3 {
            let _ = cache.lookup("q").await.unwrap();
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_backing_file() {
        let dir = TempDir::new().unwrap();
        let cache = test_cache(&dir, 0.95, 512);
        cache
            .store("q", "s", serde_json::json!(null), "a")
            .await
            .unwrap();

        let path = dir.path().join("cache.json");
        assert!(path.exists());
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!path.exists());
    }
}
