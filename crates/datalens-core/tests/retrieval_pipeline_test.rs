//! Integration tests for the full retrieval pipeline:
//! ingest -> search -> rerank -> cache store/lookup, plus snapshot
//! round-trips. Uses the deterministic fallback embedder so results are
//! stable without external services.

use datalens_core::{
    CacheConfig, ChunkType, DocMetadata, DocumentInput, EmbeddingBackend, EmbeddingProvider,
    MetadataFilter, Reranker, SemanticCache, VectorIndex,
};
use std::sync::Arc;
use tempfile::TempDir;

fn provider() -> Arc<EmbeddingProvider> {
    Arc::new(EmbeddingProvider::fallback_only(64))
}

fn schema_docs() -> Vec<DocumentInput> {
    vec![
        DocumentInput::new("tbl_orders", "orders table: one row per customer order")
            .with_metadata(DocMetadata::with_chunk_type(ChunkType::Table)),
        DocumentInput::new("col_orders_total", "orders.total: order amount in USD")
            .with_metadata(DocMetadata::with_chunk_type(ChunkType::Column)),
        DocumentInput::new("metric_revenue", "total revenue: sum of orders.total")
            .with_metadata(DocMetadata::with_chunk_type(ChunkType::Metric)),
        DocumentInput::new("query_revenue_region", "total revenue by region")
            .with_metadata(DocMetadata::with_chunk_type(ChunkType::Query)),
    ]
}

#[tokio::test]
async fn test_ingest_search_rerank() {
    let index = VectorIndex::new(provider());
    assert_eq!(index.add_documents(schema_docs()).await.unwrap(), 4);

    let results = index
        .search("total revenue by region", 4, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let reranker = Reranker::default();
    let reranked = reranker.rerank(results, Some("total revenue by region"), Some(2), None);
    assert_eq!(reranked.len(), 2);
    // The example query chunk contains the search phrase verbatim and gets
    // both the type boost and the substring boost
    assert_eq!(reranked[0].document_id, "query_revenue_region");
}

#[tokio::test]
async fn test_filtered_search_respects_top_k() {
    let index = VectorIndex::new(provider());
    index.add_documents(schema_docs()).await.unwrap();

    let filter = MetadataFilter::new().with("chunk_type", "table");
    let results = index.search("orders", 10, Some(&filter)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document_id, "tbl_orders");
}

#[tokio::test]
async fn test_snapshot_roundtrip_preserves_ordering_and_scores() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");

    let index = VectorIndex::new(provider());
    index.add_documents(schema_docs()).await.unwrap();
    let before = index.search("revenue by region", 4, None).await.unwrap();

    index.save(&path).unwrap();

    let fresh = VectorIndex::new(provider());
    assert!(fresh.load(&path).unwrap());
    assert_eq!(fresh.count(), 4);

    let after = fresh.search("revenue by region", 4, None).await.unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.document_id, a.document_id);
        assert!((b.score - a.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn test_load_missing_file_is_noop() {
    let dir = TempDir::new().unwrap();
    let index = VectorIndex::new(provider());
    index.add_documents(schema_docs()).await.unwrap();

    assert!(!index.load(&dir.path().join("nothing_here.json")).unwrap());
    // Existing state untouched
    assert_eq!(index.count(), 4);
}

#[tokio::test]
async fn test_load_corrupt_file_fails_loudly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, b"not a snapshot").unwrap();

    let index = VectorIndex::new(provider());
    let err = index.load(&path).unwrap_err();
    assert!(matches!(
        err,
        datalens_core::DataLensError::CorruptSnapshot { .. }
    ));
}

#[tokio::test]
async fn test_load_replaces_existing_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.json");

    let index = VectorIndex::new(provider());
    index.add_documents(schema_docs()).await.unwrap();
    index.save(&path).unwrap();

    let other = VectorIndex::new(provider());
    other
        .add_documents(vec![DocumentInput::new("stale", "stale doc")])
        .await
        .unwrap();

    assert!(other.load(&path).unwrap());
    assert_eq!(other.count(), 4);
    assert!(other.get_document("stale").is_none());
    assert!(other.get_document("tbl_orders").is_some());
}

#[tokio::test]
async fn test_cache_short_circuits_pipeline() {
    let dir = TempDir::new().unwrap();
    let cache = SemanticCache::open(
        provider(),
        CacheConfig {
            path: dir.path().join("cache.json"),
            similarity_threshold: 0.95,
            max_entries: 512,
        },
    )
    .unwrap();

    // Miss on a cold cache
    assert!(cache.lookup("total revenue by region").await.unwrap().is_none());

    cache
        .store(
            "total revenue by region",
            "SELECT c.region, SUM(o.total) FROM orders o JOIN customers c USING (customer_id) GROUP BY 1",
            serde_json::json!({"rows": [["EMEA", 1200.0], ["APAC", 800.0]]}),
            "EMEA leads with $1,200 in revenue.",
        )
        .await
        .unwrap();

    // Identical text hits with similarity 1.0
    let hit = cache
        .lookup("total revenue by region")
        .await
        .unwrap()
        .expect("identical query must hit");
    assert!((hit.similarity - 1.0).abs() < 1e-5);
    assert!(hit.entry.generated_query.starts_with("SELECT"));

    // Unrelated text misses
    assert!(cache
        .lookup("completely unrelated text")
        .await
        .unwrap()
        .is_none());
}

/// Backend with hand-picked vectors, for exercising the threshold boundary
struct FixtureBackend;

#[async_trait::async_trait]
impl EmbeddingBackend for FixtureBackend {
    async fn embed_batch(&self, texts: &[String]) -> datalens_core::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| match t.as_str() {
                "anchor" => vec![1.0, 0.0],
                // cos = 0.94 against the anchor, just under a 0.95 threshold
                "near miss" => {
                    let angle = 0.94f32.acos();
                    vec![angle.cos(), angle.sin()]
                }
                // cos = 0.96, just over
                "near hit" => {
                    let angle = 0.96f32.acos();
                    vec![angle.cos(), angle.sin()]
                }
                _ => vec![0.0, 1.0],
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "fixture"
    }
}

#[tokio::test]
async fn test_cache_threshold_boundary() {
    let dir = TempDir::new().unwrap();
    let cache = SemanticCache::open(
        Arc::new(EmbeddingProvider::with_backend(Arc::new(FixtureBackend))),
        CacheConfig {
            path: dir.path().join("cache.json"),
            similarity_threshold: 0.95,
            max_entries: 512,
        },
    )
    .unwrap();

    cache
        .store("anchor", "SELECT 1", serde_json::json!(null), "answer")
        .await
        .unwrap();

    // Strictly below the threshold: no hit
    assert!(cache.lookup("near miss").await.unwrap().is_none());

    // Above the threshold: hit
    let hit = cache.lookup("near hit").await.unwrap().unwrap();
    assert!(hit.similarity >= 0.95);
    assert_eq!(hit.entry.query, "anchor");
}

#[tokio::test]
async fn test_diversity_rerank_covers_groups_end_to_end() {
    let index = VectorIndex::new(provider());
    index.add_documents(schema_docs()).await.unwrap();

    let results = index.search("orders revenue", 4, None).await.unwrap();
    let reranker = Reranker::default();
    let diversified = reranker.diversity_rerank(results, "chunk_type", 4);

    let types: std::collections::HashSet<_> = diversified
        .iter()
        .filter_map(|r| r.metadata.chunk_type)
        .collect();
    assert_eq!(types.len(), 4);
}
