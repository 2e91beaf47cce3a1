//! Collections couple a document store with an optional HNSW graph.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use vanta_core::{DistanceMetric, EngineError, EngineResult};
use vanta_index::{HnswGraph, HnswParams};

/// Index backing a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// HNSW graph with a brute-force escape hatch.
    Hnsw,
    /// Brute-force only.
    Flat,
}

impl IndexType {
    /// Returns the canonical lowercase string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hnsw => "hnsw",
            Self::Flat => "flat",
        }
    }
}

impl Default for IndexType {
    fn default() -> Self {
        Self::Hnsw
    }
}

impl FromStr for IndexType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hnsw" => Ok(Self::Hnsw),
            "flat" => Ok(Self::Flat),
            _ => Err(()),
        }
    }
}

/// A stored vector document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the collection.
    pub id: String,
    /// Dense vector; length equals the collection dimension.
    pub vector: Vec<f64>,
    /// Raw metadata, including reserved keys.
    pub metadata: Map<String, Value>,
}

/// Operation counters for one collection.
#[derive(Debug, Default)]
pub struct CollectionStats {
    inserts: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
}

impl CollectionStats {
    pub(crate) fn count_inserts(&self, n: u64) {
        self.inserts.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn count_deletes(&self, n: u64) {
        self.deletes.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn count_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> CollectionCounters {
        CollectionCounters {
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`CollectionStats`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CollectionCounters {
    pub inserts: u64,
    pub deletes: u64,
    pub queries: u64,
}

/// Serializable summary of a collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub index_type: IndexType,
    pub count: usize,
    pub stats: CollectionCounters,
    pub created_at: DateTime<Utc>,
}

/// A named document store with its index.
///
/// Invariant: for HNSW collections the graph indexes exactly the ids present
/// in `documents`.
pub(crate) struct Collection {
    pub(crate) name: String,
    pub(crate) dimension: usize,
    pub(crate) metric: DistanceMetric,
    pub(crate) index_type: IndexType,
    pub(crate) documents: HashMap<String, Document>,
    pub(crate) hnsw: Option<HnswGraph>,
    pub(crate) stats: CollectionStats,
    pub(crate) created_at: DateTime<Utc>,
}

impl Collection {
    pub(crate) fn new(
        name: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
        index_type: IndexType,
        params: HnswParams,
    ) -> Self {
        let hnsw = match index_type {
            IndexType::Hnsw => Some(HnswGraph::new(dimension, metric, params)),
            IndexType::Flat => None,
        };
        Self {
            name: name.into(),
            dimension,
            metric,
            index_type,
            documents: HashMap::new(),
            hnsw,
            stats: CollectionStats::default(),
            created_at: Utc::now(),
        }
    }

    /// Stores a document, replacing any existing one with the same id.
    pub(crate) fn insert(&mut self, doc: Document) -> EngineResult<()> {
        if doc.vector.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: doc.vector.len(),
            });
        }
        if let Some(graph) = self.hnsw.as_mut() {
            graph.insert(doc.id.clone(), doc.vector.clone(), doc.metadata.clone())?;
        }
        self.documents.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Removes a document from the store and the graph.
    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let removed = self.documents.remove(id).is_some();
        if let Some(graph) = self.hnsw.as_mut() {
            graph.remove(id);
        }
        removed
    }

    pub(crate) fn count(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            index_type: self.index_type,
            count: self.count(),
            stats: self.stats.snapshot(),
            created_at: self.created_at,
        }
    }
}
