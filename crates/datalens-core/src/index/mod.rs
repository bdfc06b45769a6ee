//! Vector index
//!
//! Owns the corpus of indexed documents and answers nearest-neighbor
//! queries. Exact cosine scoring over the full corpus by default; once the
//! corpus reaches the configured threshold an HNSW index over
//! pre-normalized vectors accelerates candidate generation, with exact
//! re-scoring so ordering is unchanged.
//!
//! Mutations (insert, delete, load) hold the write lock across both the
//! data change and the index rebuild, so readers never observe a partially
//! rebuilt structure.

mod ann;
mod similarity;
mod snapshot;

pub use similarity::{cosine_similarity, l2_normalize};

use crate::embed::EmbeddingProvider;
use crate::error::{DataLensError, Result};
use crate::metadata::{DocMetadata, MetadataFilter};
use crate::telemetry::{LatencySink, NoopSink, Operation};
use ann::AnnIndex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// A document in the index. Immutable after insertion; replaced only via
/// delete + re-add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: DocMetadata,
}

/// Ingestion input; missing embeddings are computed from content
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: DocMetadata,
}

impl DocumentInput {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: None,
            metadata: DocMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A single search result; a transient projection, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: String,
    pub content: String,
    pub score: f32,
    pub metadata: DocMetadata,
}

impl SearchResult {
    /// JSON projection with display rounding of the score
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "document_id": self.document_id,
            "content": self.content,
            "score": (self.score as f64 * 10_000.0).round() / 10_000.0,
            "metadata": self.metadata,
        })
    }
}

/// Corpus state guarded by the index lock
#[derive(Default)]
struct IndexState {
    /// Documents in insertion order; position is the stable tie-break key
    documents: Vec<Document>,
    id_to_pos: HashMap<String, usize>,
    /// L2-normalized embeddings, parallel to `documents`
    normalized: Vec<Vec<f32>>,
    /// Fixed at first insert
    dimension: Option<usize>,
    ann: Option<AnnIndex>,
}

impl IndexState {
    fn rebuild(&mut self, ann_build_threshold: usize) {
        if self.documents.len() >= ann_build_threshold {
            self.ann = Some(AnnIndex::build(&self.normalized));
        } else {
            self.ann = None;
        }
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.id_to_pos.clear();
        self.normalized.clear();
        self.dimension = None;
        self.ann = None;
    }
}

/// In-memory vector index with snapshot persistence
pub struct VectorIndex {
    provider: Arc<EmbeddingProvider>,
    state: RwLock<IndexState>,
    ann_build_threshold: usize,
    sink: Arc<dyn LatencySink>,
}

impl VectorIndex {
    pub fn new(provider: Arc<EmbeddingProvider>) -> Self {
        Self::with_sink(provider, Arc::new(NoopSink))
    }

    pub fn with_sink(provider: Arc<EmbeddingProvider>, sink: Arc<dyn LatencySink>) -> Self {
        Self {
            provider,
            state: RwLock::new(IndexState::default()),
            ann_build_threshold: crate::config::IndexConfig::default().ann_build_threshold,
            sink,
        }
    }

    /// Override the corpus size at which the HNSW index is built
    pub fn with_ann_threshold(mut self, threshold: usize) -> Self {
        self.ann_build_threshold = threshold;
        self
    }

    /// Add documents to the index, embedding content for every input that
    /// lacks a precomputed vector. Returns the number of documents added.
    ///
    /// Duplicate ids (within the batch or against the corpus) are rejected
    /// with [`DataLensError::DuplicateId`] before any document is inserted.
    pub async fn add_documents(&self, inputs: Vec<DocumentInput>) -> Result<usize> {
        if inputs.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();

        // Embed outside the lock; validation reruns under the write lock
        let to_embed: Vec<String> = inputs
            .iter()
            .filter(|input| input.embedding.is_none())
            .map(|input| input.content.clone())
            .collect();
        let mut computed = self.provider.embed(&to_embed).await?.into_iter();

        let mut documents = Vec::with_capacity(inputs.len());
        for input in inputs {
            let embedding = match input.embedding {
                Some(embedding) => embedding,
                None => computed
                    .next()
                    .ok_or_else(|| DataLensError::Embedding("embedding batch too short".into()))?,
            };
            documents.push(Document {
                id: input.id,
                content: input.content,
                embedding,
                metadata: input.metadata,
            });
        }

        let count = documents.len();
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

            let mut batch_ids = HashSet::new();
            for doc in &documents {
                if state.id_to_pos.contains_key(&doc.id) || !batch_ids.insert(doc.id.clone()) {
                    return Err(DataLensError::DuplicateId(doc.id.clone()));
                }
            }

            let expected = state
                .dimension
                .or_else(|| documents.first().map(|d| d.embedding.len()));
            for doc in &documents {
                if Some(doc.embedding.len()) != expected {
                    return Err(DataLensError::DimensionMismatch {
                        expected: expected.unwrap_or(0),
                        actual: doc.embedding.len(),
                    });
                }
            }
            state.dimension = expected;

            for doc in documents {
                let mut normalized = doc.embedding.clone();
                l2_normalize(&mut normalized);
                let pos = state.documents.len();
                state.id_to_pos.insert(doc.id.clone(), pos);
                state.documents.push(doc);
                state.normalized.push(normalized);
            }
            state.rebuild(self.ann_build_threshold);
        }

        self.sink.record(
            Operation::Retrieval,
            start.elapsed(),
            None,
            &[
                ("action", "add_documents".to_string()),
                ("count", count.to_string()),
            ],
        );

        Ok(count)
    }

    /// Nearest-neighbor search. Returns at most `top_k` results sorted
    /// descending by cosine similarity, ties broken by insertion order.
    /// An empty corpus yields an empty list.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 || self.count() == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed_one(query).await?;
        self.search_vector(&query_vec, top_k, filter)
    }

    /// Nearest-neighbor search with a precomputed query vector.
    /// The query must match the corpus dimension or the call fails with
    /// [`DataLensError::DimensionMismatch`].
    pub fn search_vector(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();

        let mut query_vec = query.to_vec();
        l2_normalize(&mut query_vec);

        let results = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());

            if let Some(expected) = state.dimension {
                if query.len() != expected {
                    return Err(DataLensError::DimensionMismatch {
                        expected,
                        actual: query.len(),
                    });
                }
            }

            let scored = match &state.ann {
                Some(ann) => {
                    let mut scored = Self::search_ann(&state, ann, &query_vec, top_k, filter);
                    // The HNSW backend cannot filter natively; if over-fetching
                    // starved the result set, fall back to the exact scan so we
                    // never return fewer than the available matches.
                    if filter.is_some() && scored.len() < top_k {
                        scored = Self::search_exact(&state, &query_vec, top_k, filter);
                    }
                    scored
                }
                None => Self::search_exact(&state, &query_vec, top_k, filter),
            };

            scored
                .into_iter()
                .map(|(pos, score)| {
                    let doc = &state.documents[pos];
                    SearchResult {
                        document_id: doc.id.clone(),
                        content: doc.content.clone(),
                        score,
                        metadata: doc.metadata.clone(),
                    }
                })
                .collect::<Vec<_>>()
        };

        self.sink.record(
            Operation::Retrieval,
            start.elapsed(),
            None,
            &[
                ("action", "search".to_string()),
                ("top_k", top_k.to_string()),
                ("results", results.len().to_string()),
            ],
        );

        Ok(results)
    }

    /// Exact scan: filter before scoring, then sort
    fn search_exact(
        state: &IndexState,
        query_normalized: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = state
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| filter.map_or(true, |f| f.matches(&doc.metadata)))
            .map(|(pos, _)| (pos, similarity::dot(query_normalized, &state.normalized[pos])))
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }

    /// Accelerated path: over-fetch 3x, re-sort with the exact comparator.
    /// The extra candidates absorb HNSW recall misses near the top-k
    /// boundary; filtered queries that still come up short fall back to the
    /// exact scan in the caller.
    fn search_ann(
        state: &IndexState,
        ann: &AnnIndex,
        query_normalized: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<(usize, f32)> {
        let fetch = top_k.saturating_mul(3);
        let mut scored: Vec<(usize, f32)> = ann
            .search(query_normalized, fetch.min(ann.len()))
            .into_iter()
            .filter(|(pos, _)| {
                filter.map_or(true, |f| f.matches(&state.documents[*pos].metadata))
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(top_k);
        scored
    }

    /// Remove a document by id. Returns false if the id was absent.
    /// Remaps all positions and rebuilds the search structure.
    pub fn delete_document(&self, id: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let Some(pos) = state.id_to_pos.remove(id) else {
            return false;
        };

        state.documents.remove(pos);
        state.normalized.remove(pos);
        state.id_to_pos = state
            .documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (doc.id.clone(), i))
            .collect();
        if state.documents.is_empty() {
            state.dimension = None;
        }
        state.rebuild(self.ann_build_threshold);

        tracing::debug!(id, "deleted document");
        true
    }

    /// Get a document by id
    pub fn get_document(&self, id: &str) -> Option<Document> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .id_to_pos
            .get(id)
            .map(|&pos| state.documents[pos].clone())
    }

    /// Number of documents in the index
    pub fn count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .documents
            .len()
    }

    /// Remove all documents
    pub fn clear(&self) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Persist the full corpus (ids, content, raw vectors, metadata) as one
    /// snapshot file
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let snap = snapshot::Snapshot {
            version: snapshot::SNAPSHOT_VERSION,
            dimension: state.dimension,
            documents: state.documents.clone(),
        };
        snapshot::write_snapshot(path, &snap)?;
        tracing::info!(path = %path.display(), count = snap.documents.len(), "saved index snapshot");
        Ok(())
    }

    /// Restore from a snapshot, fully replacing in-memory state.
    /// Returns false (a no-op) when the file is missing; a corrupt file
    /// fails loudly with [`DataLensError::CorruptSnapshot`].
    pub fn load(&self, path: &Path) -> Result<bool> {
        let Some(snap) = snapshot::read_snapshot(path)? else {
            return Ok(false);
        };

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.clear();
        state.dimension = snap.dimension;
        for doc in snap.documents {
            let mut normalized = doc.embedding.clone();
            l2_normalize(&mut normalized);
            let pos = state.documents.len();
            state.id_to_pos.insert(doc.id.clone(), pos);
            state.documents.push(doc);
            state.normalized.push(normalized);
        }
        state.rebuild(self.ann_build_threshold);

        tracing::info!(path = %path.display(), count = state.documents.len(), "loaded index snapshot");
        Ok(true)
    }
}

/// Descending by score, ties broken by insertion position
fn sort_by_score(scored: &mut [(usize, f32)]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}
