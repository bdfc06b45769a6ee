//! Result reranking
//!
//! A second scoring pass over vector-search candidates using signals beyond
//! raw similarity: per-chunk-type boosts and lexical overlap with the query.
//! Purely functional over its input; never touches the index.

use crate::config::{default_boosts, RerankConfig};
use crate::index::SearchResult;
use crate::metadata::{ChunkType, MetadataValue};
use crate::telemetry::{LatencySink, NoopSink, Operation};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Metadata keys stamped onto reranked results for auditability
pub const ORIGINAL_SCORE_KEY: &str = "original_score";
pub const ORIGINAL_RANK_KEY: &str = "original_rank";

/// Boost-based reranker with configurable per-type weights
pub struct Reranker {
    boosts: HashMap<ChunkType, f32>,
    sink: Arc<dyn LatencySink>,
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new(RerankConfig::default())
    }
}

impl Reranker {
    pub fn new(config: RerankConfig) -> Self {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    pub fn with_sink(config: RerankConfig, sink: Arc<dyn LatencySink>) -> Self {
        let mut boosts = default_boosts();
        boosts.extend(config.boosts);
        Self { boosts, sink }
    }

    /// Adjust the boost factor for a chunk type
    pub fn set_boost_factor(&mut self, chunk_type: ChunkType, factor: f32) {
        self.boosts.insert(chunk_type, factor);
    }

    /// Re-rank results by `original_score × type_boost × lexical_boost`.
    ///
    /// The pre-rerank score and rank are preserved in each result's
    /// extension metadata. Sort is stable, descending by final score.
    pub fn rerank(
        &self,
        results: Vec<SearchResult>,
        query: Option<&str>,
        top_k: Option<usize>,
        boosts: Option<&HashMap<ChunkType, f32>>,
    ) -> Vec<SearchResult> {
        if results.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        let boosts = boosts.unwrap_or(&self.boosts);

        let mut scored: Vec<(SearchResult, usize, f32)> = results
            .into_iter()
            .enumerate()
            .map(|(original_rank, result)| {
                let type_boost = result
                    .metadata
                    .chunk_type
                    .and_then(|ct| boosts.get(&ct).copied())
                    .unwrap_or(1.0);
                let lexical_boost = query.map_or(1.0, |q| lexical_boost(q, &result.content));
                let final_score = result.score * type_boost * lexical_boost;
                (result, original_rank, final_score)
            })
            .collect();

        // Stable sort keeps the original order between equal final scores
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut reranked: Vec<SearchResult> = scored
            .into_iter()
            .map(|(mut result, original_rank, final_score)| {
                result.metadata.extra.insert(
                    ORIGINAL_SCORE_KEY.to_string(),
                    MetadataValue::Float(result.score as f64),
                );
                result.metadata.extra.insert(
                    ORIGINAL_RANK_KEY.to_string(),
                    MetadataValue::Int(original_rank as i64),
                );
                result.score = final_score;
                result
            })
            .collect();

        if let Some(k) = top_k {
            reranked.truncate(k);
        }

        self.sink.record(
            Operation::Reranking,
            start.elapsed(),
            None,
            &[("count", reranked.len().to_string())],
        );

        reranked
    }

    /// Alternative selection policy: group results by a metadata key and
    /// pick round-robin across groups until `top_k` is filled. Guarantees
    /// representation from every non-empty group when `top_k` is at least
    /// the group count. Not composed with the boost-based rerank.
    pub fn diversity_rerank(
        &self,
        results: Vec<SearchResult>,
        diversity_key: &str,
        top_k: usize,
    ) -> Vec<SearchResult> {
        if results.is_empty() || top_k == 0 {
            return Vec::new();
        }

        // Group in first-seen order so output stays deterministic
        let mut group_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<SearchResult>> = HashMap::new();
        for result in results {
            let key = result
                .metadata
                .get(diversity_key)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "other".to_string());
            if !groups.contains_key(&key) {
                group_order.push(key.clone());
            }
            groups.entry(key).or_default().push(result);
        }

        let mut diversified = Vec::with_capacity(top_k);
        let mut round = 0;
        'outer: loop {
            let mut added = false;
            for key in &group_order {
                let group = &groups[key];
                if round < group.len() {
                    diversified.push(group[round].clone());
                    added = true;
                    if diversified.len() >= top_k {
                        break 'outer;
                    }
                }
            }
            if !added {
                break;
            }
            round += 1;
        }

        diversified
    }
}

/// Lexical overlap boost between query and content.
///
/// Exact substring containment wins outright; otherwise discrete tiers by
/// the number of shared whitespace-delimited words.
fn lexical_boost(query: &str, content: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    if content_lower.contains(&query_lower) {
        return 1.3;
    }

    let query_words: std::collections::HashSet<&str> = query_lower.split_whitespace().collect();
    let content_words: std::collections::HashSet<&str> = content_lower.split_whitespace().collect();
    let overlap = query_words.intersection(&content_words).count();

    match overlap {
        0 => 1.0,
        1 => 1.05,
        2 => 1.1,
        _ => 1.2,
    }
}
