//! Deterministic fallback embedder
//!
//! Used when no embedding service is reachable. Derives a pseudo-random
//! unit vector from a blake3 hash of the input text, so the same text
//! always maps to the same vector within and across processes. Vectors
//! carry no semantic signal; they only make offline operation and tests
//! deterministic.

use super::EmbeddingBackend;
use crate::error::Result;
use async_trait::async_trait;

pub const FALLBACK_MODEL_NAME: &str = "fallback-blake3";

/// Hash-seeded deterministic embedder
pub struct FallbackEmbedder {
    dimension: usize,
}

impl FallbackEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let seed = blake3::hash(text.as_bytes());
        let mut first8 = [0u8; 8];
        first8.copy_from_slice(&seed.as_bytes()[..8]);
        let mut state = u64::from_le_bytes(first8);

        let mut vec: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state = splitmix64(state);
                // Map the top 24 bits to [-1, 1)
                let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
                unit * 2.0 - 1.0
            })
            .collect();

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

/// SplitMix64 step; enough statistical quality for synthetic vectors
fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[async_trait]
impl EmbeddingBackend for FallbackEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        FALLBACK_MODEL_NAME
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = FallbackEmbedder::new(64);
        let a = embedder
            .embed_batch(&["total revenue by region".to_string()])
            .await
            .unwrap();
        let b = embedder
            .embed_batch(&["total revenue by region".to_string()])
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_distinct_texts_distinct_vectors() {
        let embedder = FallbackEmbedder::new(64);
        let vecs = embedder
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(vecs[0], vecs[1]);
    }

    #[tokio::test]
    async fn test_unit_norm() {
        let embedder = FallbackEmbedder::new(384);
        let vecs = embedder.embed_batch(&["hello".to_string()]).await.unwrap();
        let norm: f32 = vecs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(vecs[0].len(), 384);
    }
}
