//! Embedding backend trait

use crate::error::Result;
use async_trait::async_trait;

/// A backend that turns text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts, one vector per input
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedding dimension
    fn dimension(&self) -> usize;

    /// Model name
    fn model_name(&self) -> &str;

    /// Whether this is the degraded deterministic fallback rather than a
    /// real embedding model
    fn is_fallback(&self) -> bool {
        false
    }
}
