//! Brute-force linear scan.
//!
//! Exhaustively scores every candidate document and keeps the top `k`.
//! This is the correctness baseline for the HNSW graph, the index behind
//! flat collections, and the `force_flat` escape hatch.

use serde_json::{Map, Value};

use vanta_core::{metric, DistanceMetric};

use crate::types::SearchHit;

/// One candidate document offered to the scan.
#[derive(Debug, Clone, Copy)]
pub struct DocRef<'a> {
    /// Document identifier.
    pub id: &'a str,
    /// Dense vector.
    pub vector: &'a [f64],
    /// Raw metadata.
    pub metadata: &'a Map<String, Value>,
}

/// Scores every candidate and returns the top `k` with the comparison count.
///
/// Results are sorted by descending unified score; ties break by id so the
/// ordering is deterministic.
#[must_use]
pub fn top_k<'a>(
    query: &[f64],
    metric: DistanceMetric,
    k: usize,
    docs: impl IntoIterator<Item = DocRef<'a>>,
) -> (Vec<SearchHit>, u64) {
    let mut comparisons = 0u64;
    let mut hits: Vec<SearchHit> = docs
        .into_iter()
        .map(|doc| {
            comparisons += 1;
            SearchHit {
                id: doc.id.to_string(),
                vector: doc.vector.to_vec(),
                metadata: doc.metadata.clone(),
                score: metric::score(query, doc.vector, metric),
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(k);
    (hits, comparisons)
}
