//! Embedding provider with guarded lazy backend initialization
//!
//! The first embed call initializes the backend exactly once, even under
//! concurrent first use. If the configured HTTP service is unreachable the
//! provider degrades to the deterministic fallback instead of failing;
//! callers can observe the degradation via [`EmbeddingProvider::is_fallback`].

use super::{EmbeddingBackend, FallbackEmbedder, HttpEmbedder};
use crate::config::EmbeddingServiceConfig;
use crate::error::Result;
use crate::telemetry::{LatencySink, NoopSink, Operation};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

/// Text-to-vector provider used by the index and the semantic cache
pub struct EmbeddingProvider {
    config: EmbeddingServiceConfig,
    backend: OnceCell<Arc<dyn EmbeddingBackend>>,
    sink: Arc<dyn LatencySink>,
}

impl EmbeddingProvider {
    pub fn new(config: EmbeddingServiceConfig) -> Self {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    pub fn with_sink(config: EmbeddingServiceConfig, sink: Arc<dyn LatencySink>) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
            sink,
        }
    }

    /// Provider pinned to the deterministic fallback; used in tests and
    /// offline operation
    pub fn fallback_only(dimension: usize) -> Self {
        let provider = Self::new(EmbeddingServiceConfig {
            url: None,
            dimension,
            ..Default::default()
        });
        provider
            .backend
            .set(Arc::new(FallbackEmbedder::new(dimension)))
            .ok();
        provider
    }

    /// Provider over an injected backend
    pub fn with_backend(backend: Arc<dyn EmbeddingBackend>) -> Self {
        let provider = Self::new(EmbeddingServiceConfig::default());
        provider.backend.set(backend).ok();
        provider
    }

    async fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        self.backend
            .get_or_init(|| async {
                if self.config.url.is_some() {
                    match HttpEmbedder::connect(&self.config).await {
                        Ok(embedder) => {
                            tracing::info!(
                                model = %embedder.model_name(),
                                dimension = embedder.dimension(),
                                "embedding service connected"
                            );
                            return Arc::new(embedder) as Arc<dyn EmbeddingBackend>;
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                "embedding service unavailable, using deterministic fallback"
                            );
                        }
                    }
                }
                Arc::new(FallbackEmbedder::new(self.config.dimension))
            })
            .await
    }

    /// Embed a list of texts, processing in fixed-size batches
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let backend = self.backend().await;
        let start = Instant::now();

        let batch_size = self.config.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            embeddings.extend(backend.embed_batch(batch).await?);
        }

        self.sink.record(
            Operation::Embedding,
            start.elapsed(),
            None,
            &[
                ("count", texts.len().to_string()),
                ("model", backend.model_name().to_string()),
            ],
        );

        Ok(embeddings)
    }

    /// Embed a single text
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed(std::slice::from_ref(&text.to_string())).await?;
        Ok(embeddings.remove(0))
    }

    /// Embedding dimension (initializes the backend if needed)
    pub async fn dimension(&self) -> usize {
        self.backend().await.dimension()
    }

    /// Whether the provider degraded to the deterministic fallback
    /// (initializes the backend if needed)
    pub async fn is_fallback(&self) -> bool {
        self.backend().await.is_fallback()
    }

    /// Backend model name (initializes the backend if needed)
    pub async fn model_name(&self) -> String {
        self.backend().await.model_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fallback_only_is_observable() {
        let provider = EmbeddingProvider::fallback_only(32);
        assert!(provider.is_fallback().await);
        assert_eq!(provider.dimension().await, 32);
    }

    #[tokio::test]
    async fn test_batching_preserves_order_and_count() {
        let config = EmbeddingServiceConfig {
            url: None,
            dimension: 16,
            batch_size: 4,
            ..Default::default()
        };
        let provider = EmbeddingProvider::new(config);

        let texts: Vec<String> = (0..11).map(|i| format!("text {}", i)).collect();
        let embeddings = provider.embed(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 11);

        // Batched output must match one-at-a-time output
        for (text, embedding) in texts.iter().zip(&embeddings) {
            assert_eq!(&provider.embed_one(text).await.unwrap(), embedding);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_url_degrades_to_fallback() {
        let config = EmbeddingServiceConfig {
            url: None,
            dimension: 8,
            ..Default::default()
        };
        let provider = EmbeddingProvider::new(config);
        let _ = provider.embed_one("trigger init").await.unwrap();
        assert!(provider.is_fallback().await);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let provider = Arc::new(EmbeddingProvider::new(EmbeddingServiceConfig {
            url: None,
            dimension: 8,
            ..Default::default()
        }));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let p = Arc::clone(&provider);
                tokio::spawn(async move { p.embed_one(&format!("query {}", i)).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert!(provider.is_fallback().await);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = EmbeddingProvider::fallback_only(8);
        let out = provider.embed(&[]).await.unwrap();
        assert!(out.is_empty());
    }
}
