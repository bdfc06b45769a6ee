//! Latency telemetry
//!
//! Fire-and-forget per-operation latency events. Components record into an
//! injected [`LatencySink`] after each add/search/lookup/store call; sinks
//! must never fail or block the caller.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operations tracked by the retrieval core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Embedding,
    Retrieval,
    Reranking,
    CacheLookup,
    CacheStore,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Retrieval => "retrieval",
            Self::Reranking => "reranking",
            Self::CacheLookup => "cache_lookup",
            Self::CacheStore => "cache_store",
        }
    }
}

/// Latency event sink
pub trait LatencySink: Send + Sync {
    /// Record one measurement. Must not fail; implementations swallow errors.
    fn record(
        &self,
        operation: Operation,
        duration: Duration,
        trace_id: Option<&str>,
        metadata: &[(&str, String)],
    );
}

/// Sink that drops every event
#[derive(Debug, Default)]
pub struct NoopSink;

impl LatencySink for NoopSink {
    fn record(&self, _: Operation, _: Duration, _: Option<&str>, _: &[(&str, String)]) {}
}

/// Sink that logs events at debug level via `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl LatencySink for TracingSink {
    fn record(
        &self,
        operation: Operation,
        duration: Duration,
        trace_id: Option<&str>,
        metadata: &[(&str, String)],
    ) {
        tracing::debug!(
            operation = operation.as_str(),
            duration_ms = duration.as_secs_f64() * 1000.0,
            trace_id = trace_id.unwrap_or("-"),
            ?metadata,
            "latency"
        );
    }
}

/// Single latency measurement
#[derive(Debug, Clone)]
pub struct LatencyRecord {
    pub operation: Operation,
    pub duration_ms: f64,
    pub trace_id: Option<String>,
}

/// Aggregated latency statistics for one operation
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub operation: Operation,
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub total_ms: f64,
}

/// In-memory sink with percentile aggregation
///
/// Backs the CLI `status` output and tests. Unbounded; intended for
/// process-lifetime diagnostics, not long-running metric export.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    records: Mutex<Vec<LatencyRecord>>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle, ready for injection into components
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn records_for(&self, operation: Operation) -> Vec<LatencyRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|r| r.operation == operation)
            .cloned()
            .collect()
    }

    pub fn records_for_trace(&self, trace_id: &str) -> Vec<LatencyRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|r| r.trace_id.as_deref() == Some(trace_id))
            .cloned()
            .collect()
    }

    /// Aggregate stats for one operation, `None` if nothing was recorded
    pub fn stats(&self, operation: Operation) -> Option<LatencyStats> {
        let durations: Vec<f64> = self
            .records_for(operation)
            .iter()
            .map(|r| r.duration_ms)
            .collect();
        if durations.is_empty() {
            return None;
        }

        let mut sorted = durations.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let total: f64 = durations.iter().sum();

        Some(LatencyStats {
            operation,
            count: durations.len(),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            mean_ms: total / durations.len() as f64,
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            total_ms: total,
        })
    }

    /// Stats for every operation that has at least one record
    pub fn all_stats(&self) -> HashMap<&'static str, LatencyStats> {
        let mut result = HashMap::new();
        for op in [
            Operation::Embedding,
            Operation::Retrieval,
            Operation::Reranking,
            Operation::CacheLookup,
            Operation::CacheStore,
        ] {
            if let Some(stats) = self.stats(op) {
                result.insert(op.as_str(), stats);
            }
        }
        result
    }

    pub fn reset(&self) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl LatencySink for LatencyTracker {
    fn record(
        &self,
        operation: Operation,
        duration: Duration,
        trace_id: Option<&str>,
        _metadata: &[(&str, String)],
    ) {
        let record = LatencyRecord {
            operation,
            duration_ms: duration.as_secs_f64() * 1000.0,
            trace_id: trace_id.map(String::from),
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

/// Linear-interpolated percentile over a pre-sorted slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let k = (sorted.len() - 1) as f64 * (pct / 100.0);
    let f = k.floor() as usize;
    let c = f + 1;
    if c >= sorted.len() {
        return sorted[sorted.len() - 1];
    }
    sorted[f] + (sorted[c] - sorted[f]) * (k - f as f64)
}
