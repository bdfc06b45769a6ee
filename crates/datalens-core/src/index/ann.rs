//! HNSW accelerated backend for nearest-neighbor search
//!
//! Built over pre-normalized vectors, so inner product equals cosine
//! similarity. Candidates are re-scored exactly by the caller; the backend
//! only changes latency, not ordering.

use instant_distance::{Builder, HnswMap, Search};

/// Wrapper for f32 vectors implementing instant_distance::Point
#[derive(Clone)]
struct EmbeddingPoint {
    values: Vec<f32>,
}

impl instant_distance::Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Vectors are unit-length, so cosine distance = 1 - dot
        1.0 - super::similarity::dot(&self.values, &other.values)
    }
}

/// HNSW map from normalized vectors to corpus positions
pub(crate) struct AnnIndex {
    map: HnswMap<EmbeddingPoint, usize>,
    len: usize,
}

impl AnnIndex {
    /// Build from pre-normalized vectors; position i maps back to the
    /// document at position i
    pub(crate) fn build(normalized: &[Vec<f32>]) -> Self {
        let (points, positions): (Vec<EmbeddingPoint>, Vec<usize>) = normalized
            .iter()
            .enumerate()
            .map(|(pos, values)| {
                (
                    EmbeddingPoint {
                        values: values.clone(),
                    },
                    pos,
                )
            })
            .unzip();

        let len = points.len();
        let map = Builder::default().build(points, positions);
        tracing::debug!(count = len, "built HNSW index");
        Self { map, len }
    }

    /// Find up to k nearest neighbors of a normalized query vector.
    /// Returns (position, cosine_similarity) pairs.
    pub(crate) fn search(&self, query_normalized: &[f32], k: usize) -> Vec<(usize, f32)> {
        let query_point = EmbeddingPoint {
            values: query_normalized.to_vec(),
        };
        let mut search = Search::default();

        self.map
            .search(&query_point, &mut search)
            .take(k)
            .map(|item| (*item.value, 1.0 - item.distance))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_build_and_search_orthogonal() {
        let vectors: Vec<Vec<f32>> = (0..4).map(|i| unit(4, i)).collect();
        let ann = AnnIndex::build(&vectors);
        assert_eq!(ann.len(), 4);

        let results = ann.search(&unit(4, 2), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 2);
        assert!((results[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_search_returns_at_most_k() {
        let vectors: Vec<Vec<f32>> = (0..8).map(|i| unit(8, i)).collect();
        let ann = AnnIndex::build(&vectors);
        assert!(ann.search(&unit(8, 0), 3).len() <= 3);
    }
}
