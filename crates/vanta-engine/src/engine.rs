//! The engine orchestrates collections: lifecycle, inserts, deletes, the
//! filter-aware query path, TTL sweeping, and audit emission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vanta_core::{
    is_expired, now_millis, parse_ttl, AuditAction, AuditEntry, AuditLog, DistanceMetric,
    EngineError, EngineResult, Filter, VantaConfig, TTL_DURATION_KEY, TTL_EXPIRES_KEY,
};
use vanta_index::{brute_force, DocRef, HnswParams, HnswSnapshot, HnswStats};

use crate::collection::{Collection, CollectionInfo, Document, IndexType};
use crate::sweeper::SweeperHandle;
use crate::tenant::TenantScope;

/// Actor name used for unscoped engine operations.
pub(crate) const ENGINE_ACTOR: &str = "engine";

/// Options for creating a collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Vector dimension; every document must match it.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Index backing the collection.
    pub index_type: IndexType,
    /// HNSW parameter overrides; engine defaults apply when absent.
    pub hnsw: Option<HnswParams>,
}

impl CollectionOptions {
    /// Creates options with the default metric and index type.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            metric: DistanceMetric::default(),
            index_type: IndexType::default(),
            hnsw: None,
        }
    }

    /// Sets the distance metric (builder pattern).
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the index type (builder pattern).
    #[must_use]
    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Overrides the HNSW parameters (builder pattern).
    #[must_use]
    pub fn with_hnsw(mut self, params: HnswParams) -> Self {
        self.hnsw = Some(params);
        self
    }
}

/// One document offered to a batch insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    /// Caller-supplied id; minted when absent.
    pub id: Option<String>,
    /// Dense vector.
    pub vector: Vec<f64>,
    /// Caller metadata.
    pub metadata: Option<Map<String, Value>>,
    /// Time-to-live: milliseconds or a duration string such as `"30s"`.
    pub ttl: Option<Value>,
}

impl InsertRequest {
    /// Creates a request carrying only a vector.
    #[must_use]
    pub fn new(vector: Vec<f64>) -> Self {
        Self {
            id: None,
            vector,
            metadata: None,
            ttl: None,
        }
    }

    /// Sets the document id (builder pattern).
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the metadata (builder pattern).
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the TTL (builder pattern).
    #[must_use]
    pub fn with_ttl(mut self, ttl: impl Into<Value>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }
}

/// Options for a query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Number of results to return.
    pub top_k: usize,
    /// Metadata filter applied after retrieval.
    pub filter: Option<Filter>,
    /// Bypass the HNSW graph and scan exhaustively.
    pub force_flat: bool,
    /// Beam-width override for HNSW search.
    pub ef_search: Option<usize>,
    /// Include stored vectors in the results.
    pub include_vectors: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            filter: None,
            force_flat: false,
            ef_search: None,
            include_vectors: true,
        }
    }
}

impl QueryOptions {
    /// Creates options returning `top_k` results.
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    /// Sets the metadata filter (builder pattern).
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Forces the brute-force path (builder pattern).
    #[must_use]
    pub fn with_force_flat(mut self, force_flat: bool) -> Self {
        self.force_flat = force_flat;
        self
    }

    /// Overrides the search beam width (builder pattern).
    #[must_use]
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    /// Controls whether stored vectors are returned (builder pattern).
    #[must_use]
    pub fn with_include_vectors(mut self, include_vectors: bool) -> Self {
        self.include_vectors = include_vectors;
        self
    }
}

/// Retrieval path a query took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    Hnsw,
    Flat,
}

impl QueryMethod {
    /// Returns the canonical lowercase string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hnsw => "hnsw",
            Self::Flat => "flat",
        }
    }
}

/// One query match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    /// Document identifier.
    pub id: String,
    /// Unified similarity score; higher is more similar.
    pub score: f64,
    /// Stored vector, when requested.
    pub vector: Option<Vec<f64>>,
    /// Stored metadata.
    pub metadata: Map<String, Value>,
}

/// Result of a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Matches sorted by descending score.
    pub results: Vec<QueryHit>,
    /// Wall-clock latency in milliseconds.
    pub elapsed_ms: f64,
    /// Score evaluations performed.
    pub comparisons: u64,
    /// Collection size at query time.
    pub total: usize,
    /// Retrieval path taken.
    pub method: QueryMethod,
}

/// Embedded multi-collection vector engine.
///
/// Every public method is one critical section over the collection map:
/// writers are exclusive, queries share a read lock.
pub struct VectorEngine {
    collections: RwLock<HashMap<String, Collection>>,
    audit: AuditLog,
    config: VantaConfig,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl VectorEngine {
    /// Creates an engine from configuration. The TTL sweeper is not started
    /// until [`VectorEngine::start_sweeper`] is called.
    #[must_use]
    pub fn new(config: VantaConfig) -> Arc<Self> {
        Arc::new(Self {
            collections: RwLock::new(HashMap::new()),
            audit: AuditLog::new(config.engine.audit_capacity),
            config,
            sweeper: Mutex::new(None),
        })
    }

    /// Creates an engine with default configuration.
    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Self::new(VantaConfig::default())
    }

    /// Returns the audit log, shared with higher layers.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &VantaConfig {
        &self.config
    }

    fn default_hnsw_params(&self) -> HnswParams {
        HnswParams::new(
            self.config.index.hnsw_m,
            self.config.index.hnsw_ef_construction,
            self.config.index.hnsw_ef_search,
        )
    }

    /// Creates a collection.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on an empty name or zero dimension,
    /// `CollectionExists` when the name is taken.
    pub fn create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> EngineResult<CollectionInfo> {
        if name.is_empty() {
            return Err(EngineError::invalid_argument("collection name must be non-empty"));
        }
        if options.dimension == 0 {
            return Err(EngineError::invalid_argument("dimension must be > 0"));
        }

        let params = options.hnsw.unwrap_or_else(|| self.default_hnsw_params());
        let info = {
            let mut collections = self.collections.write();
            if collections.contains_key(name) {
                return Err(EngineError::collection_exists(name));
            }
            let collection = Collection::new(
                name,
                options.dimension,
                options.metric,
                options.index_type,
                params,
            );
            let info = collection.info();
            collections.insert(name.to_string(), collection);
            info
        };

        info!(
            collection = name,
            dimension = info.dimension,
            metric = info.metric.as_str(),
            index_type = info.index_type.as_str(),
            "created collection"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::CreateCollection, ENGINE_ACTOR).with_collection(name),
        );
        Ok(info)
    }

    /// Drops a collection, releasing its documents and graph.
    pub fn drop_collection(&self, name: &str) -> bool {
        let dropped = self.collections.write().remove(name).is_some();
        if dropped {
            info!(collection = name, "dropped collection");
            self.audit.record(
                AuditEntry::new(AuditAction::DropCollection, ENGINE_ACTOR).with_collection(name),
            );
        }
        dropped
    }

    /// Lists every collection, ordered by name.
    #[must_use]
    pub fn list_collections(&self) -> Vec<CollectionInfo> {
        let collections = self.collections.read();
        let mut infos: Vec<CollectionInfo> = collections.values().map(Collection::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Returns a collection summary, when present.
    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<CollectionInfo> {
        self.collections.read().get(name).map(Collection::info)
    }

    /// Returns the graph statistics of an HNSW collection, `None` for flat.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` when the collection does not exist.
    pub fn index_stats(&self, name: &str) -> EngineResult<Option<HnswStats>> {
        let collections = self.collections.read();
        let collection = collections
            .get(name)
            .ok_or_else(|| EngineError::collection_not_found(name))?;
        Ok(collection.hnsw.as_ref().map(|g| g.stats()))
    }

    /// Serializes the HNSW graph of a collection.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` for missing collections and `InvalidArgument`
    /// for flat ones.
    pub fn export_collection(&self, name: &str) -> EngineResult<HnswSnapshot> {
        let collections = self.collections.read();
        let collection = collections
            .get(name)
            .ok_or_else(|| EngineError::collection_not_found(name))?;
        collection
            .hnsw
            .as_ref()
            .map(|g| g.snapshot())
            .ok_or_else(|| {
                EngineError::invalid_argument(format!("collection `{name}` has no HNSW index"))
            })
    }

    /// Recreates a collection from a snapshot.
    ///
    /// # Errors
    ///
    /// `CollectionExists` when the name is taken; serialization errors when
    /// the snapshot is inconsistent.
    pub fn import_collection(
        &self,
        name: &str,
        snapshot: HnswSnapshot,
    ) -> EngineResult<CollectionInfo> {
        if name.is_empty() {
            return Err(EngineError::invalid_argument("collection name must be non-empty"));
        }
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(EngineError::collection_exists(name));
        }

        let dimension = snapshot.dimension;
        let metric = snapshot.metric;
        let documents: HashMap<String, Document> = snapshot
            .nodes
            .iter()
            .map(|node| {
                (
                    node.id.clone(),
                    Document {
                        id: node.id.clone(),
                        vector: node.vector.clone(),
                        metadata: node.metadata.clone(),
                    },
                )
            })
            .collect();
        let graph = vanta_index::HnswGraph::from_snapshot(snapshot)?;

        let mut collection = Collection::new(
            name,
            dimension,
            metric,
            IndexType::Hnsw,
            graph.params().clone(),
        );
        collection.documents = documents;
        collection.hnsw = Some(graph);
        let info = collection.info();
        collections.insert(name.to_string(), collection);
        drop(collections);

        info!(collection = name, count = info.count, "imported collection");
        self.audit.record(
            AuditEntry::new(AuditAction::CreateCollection, ENGINE_ACTOR)
                .with_collection(name)
                .with_document_count(info.count)
                .with_details(json!({"imported": true})),
        );
        Ok(info)
    }

    /// Inserts a batch of documents, returning their ids in request order.
    ///
    /// Re-inserting an existing id replaces the document (delete + insert).
    ///
    /// # Errors
    ///
    /// `CollectionNotFound`, `InvalidArgument` (empty id),
    /// `InvalidVector`, `DimensionMismatch`, `InvalidTtl`. The batch is
    /// validated up front; a rejected batch leaves the collection unchanged.
    pub fn insert(&self, name: &str, requests: Vec<InsertRequest>) -> EngineResult<Vec<String>> {
        self.insert_with_actor(ENGINE_ACTOR, name, requests)
    }

    pub(crate) fn insert_with_actor(
        &self,
        actor: &str,
        name: &str,
        requests: Vec<InsertRequest>,
    ) -> EngineResult<Vec<String>> {
        let start = Instant::now();
        let now = now_millis();

        let ids = {
            let mut collections = self.collections.write();
            let collection = collections
                .get_mut(name)
                .ok_or_else(|| EngineError::collection_not_found(name))?;

            // Validate the whole batch before touching the stores.
            let mut documents = Vec::with_capacity(requests.len());
            for request in requests {
                documents.push(build_document(collection.dimension, request, now)?);
            }

            let mut ids = Vec::with_capacity(documents.len());
            for doc in documents {
                ids.push(doc.id.clone());
                collection.insert(doc)?;
            }
            collection.stats.count_inserts(ids.len() as u64);
            ids
        };

        debug!(collection = name, count = ids.len(), actor, "inserted documents");
        self.audit.record(
            AuditEntry::new(AuditAction::Insert, actor)
                .with_collection(name)
                .with_document_count(ids.len())
                .with_duration_ms(start.elapsed().as_secs_f64() * 1000.0),
        );
        Ok(ids)
    }

    /// Deletes documents by id, returning how many were actually removed.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` when the collection does not exist.
    pub fn delete(&self, name: &str, ids: &[String]) -> EngineResult<usize> {
        self.delete_with_actor(ENGINE_ACTOR, name, ids)
    }

    pub(crate) fn delete_with_actor(
        &self,
        actor: &str,
        name: &str,
        ids: &[String],
    ) -> EngineResult<usize> {
        let removed = {
            let mut collections = self.collections.write();
            let collection = collections
                .get_mut(name)
                .ok_or_else(|| EngineError::collection_not_found(name))?;
            let removed = ids.iter().filter(|id| collection.remove(id)).count();
            collection.stats.count_deletes(removed as u64);
            removed
        };

        debug!(collection = name, requested = ids.len(), removed, actor, "deleted documents");
        self.audit.record(
            AuditEntry::new(AuditAction::Delete, actor)
                .with_collection(name)
                .with_document_count(removed),
        );
        Ok(removed)
    }

    /// Runs a k-NN query.
    ///
    /// HNSW collections over-fetch when a filter is present
    /// (`top_k · overfetch_factor`, capped at the collection size), apply the
    /// filter to the over-fetched pool, hide expired documents, and truncate.
    /// Flat collections filter first and scan the remainder.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound`, `DimensionMismatch`.
    pub fn query(
        &self,
        name: &str,
        vector: &[f64],
        options: &QueryOptions,
    ) -> EngineResult<QueryResponse> {
        self.query_with_actor(ENGINE_ACTOR, name, vector, options)
    }

    pub(crate) fn query_with_actor(
        &self,
        actor: &str,
        name: &str,
        vector: &[f64],
        options: &QueryOptions,
    ) -> EngineResult<QueryResponse> {
        let start = Instant::now();
        let now = now_millis();

        let response = {
            let collections = self.collections.read();
            let collection = collections
                .get(name)
                .ok_or_else(|| EngineError::collection_not_found(name))?;
            if vector.len() != collection.dimension {
                return Err(EngineError::DimensionMismatch {
                    expected: collection.dimension,
                    actual: vector.len(),
                });
            }
            collection.stats.count_query();
            let total = collection.count();

            match (&collection.hnsw, options.force_flat) {
                (Some(graph), false) => {
                    let fetch_k = match &options.filter {
                        Some(_) => (options.top_k * self.config.query.overfetch_factor).min(total),
                        None => options.top_k,
                    };
                    let ef = options
                        .ef_search
                        .unwrap_or(graph.params().ef_search)
                        .max(fetch_k);
                    let mut hits = graph.search(vector, fetch_k, Some(ef))?;
                    let comparisons = graph.last_comparisons();

                    if let Some(filter) = &options.filter {
                        hits.retain(|h| filter.matches(&h.metadata));
                    }
                    hits.retain(|h| !is_expired(&h.metadata, now));
                    hits.truncate(options.top_k);

                    QueryResponse {
                        results: to_query_hits(hits, options.include_vectors),
                        elapsed_ms: 0.0,
                        comparisons,
                        total,
                        method: QueryMethod::Hnsw,
                    }
                }
                _ => {
                    let candidates = collection.documents.values().filter(|doc| {
                        options
                            .filter
                            .as_ref()
                            .is_none_or(|f| f.matches(&doc.metadata))
                            && !is_expired(&doc.metadata, now)
                    });
                    let (hits, comparisons) = brute_force::top_k(
                        vector,
                        collection.metric,
                        options.top_k,
                        candidates.map(|doc| DocRef {
                            id: &doc.id,
                            vector: &doc.vector,
                            metadata: &doc.metadata,
                        }),
                    );
                    QueryResponse {
                        results: to_query_hits(hits, options.include_vectors),
                        elapsed_ms: 0.0,
                        comparisons,
                        total,
                        method: QueryMethod::Flat,
                    }
                }
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let response = QueryResponse {
            elapsed_ms,
            ..response
        };

        debug!(
            collection = name,
            results = response.results.len(),
            comparisons = response.comparisons,
            method = response.method.as_str(),
            actor,
            "query completed"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::Query, actor)
                .with_collection(name)
                .with_document_count(response.results.len())
                .with_duration_ms(elapsed_ms)
                .with_details(json!({
                    "method": response.method.as_str(),
                    "top_k": options.top_k,
                })),
        );
        Ok(response)
    }

    /// Opens a tenant-scoped view over a collection.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` when the collection does not exist,
    /// `InvalidArgument` on an empty tenant id.
    pub fn tenant(
        self: &Arc<Self>,
        name: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> EngineResult<TenantScope> {
        let name = name.into();
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() {
            return Err(EngineError::invalid_argument("tenant id must be non-empty"));
        }
        if !self.collections.read().contains_key(&name) {
            return Err(EngineError::collection_not_found(&name));
        }
        Ok(TenantScope::new(Arc::clone(self), name, tenant_id))
    }

    /// Retains only ids whose stored `_tenant_id` equals `tenant_id`.
    pub(crate) fn owned_ids(
        &self,
        name: &str,
        tenant_id: &str,
        ids: &[String],
    ) -> EngineResult<Vec<String>> {
        let collections = self.collections.read();
        let collection = collections
            .get(name)
            .ok_or_else(|| EngineError::collection_not_found(name))?;
        Ok(ids
            .iter()
            .filter(|id| {
                collection.documents.get(id.as_str()).is_some_and(|doc| {
                    doc.metadata.get(vanta_core::TENANT_ID_KEY).and_then(Value::as_str)
                        == Some(tenant_id)
                })
            })
            .cloned()
            .collect())
    }

    /// Runs one TTL sweep pass over every collection.
    ///
    /// A failing collection is logged and skipped; the sweep continues.
    /// Returns the number of documents removed.
    pub fn sweep_expired(&self) -> usize {
        let names: Vec<String> = self.collections.read().keys().cloned().collect();
        let mut total = 0;
        for name in names {
            match self.sweep_collection(&name) {
                Ok(swept) => total += swept,
                Err(err) => warn!(collection = %name, error = %err, "TTL sweep failed"),
            }
        }
        total
    }

    fn sweep_collection(&self, name: &str) -> EngineResult<usize> {
        let now = now_millis();
        let swept = {
            let mut collections = self.collections.write();
            let collection = collections
                .get_mut(name)
                .ok_or_else(|| EngineError::collection_not_found(name))?;
            let expired: Vec<String> = collection
                .documents
                .values()
                .filter(|doc| is_expired(&doc.metadata, now))
                .map(|doc| doc.id.clone())
                .collect();
            for id in &expired {
                collection.remove(id);
            }
            collection.stats.count_deletes(expired.len() as u64);
            expired.len()
        };

        if swept > 0 {
            debug!(collection = name, swept, "TTL sweep removed expired documents");
            self.audit.record(
                AuditEntry::new(AuditAction::TtlSweep, ENGINE_ACTOR)
                    .with_collection(name)
                    .with_document_count(swept),
            );
        }
        Ok(swept)
    }

    /// Starts the periodic TTL sweeper, if configured and not yet running.
    pub fn start_sweeper(self: &Arc<Self>) {
        let interval_secs = self.config.engine.sweep_interval_secs;
        if interval_secs == 0 {
            return;
        }
        self.start_sweeper_with_interval(std::time::Duration::from_secs(interval_secs));
    }

    /// Starts the periodic TTL sweeper with an explicit interval.
    pub fn start_sweeper_with_interval(self: &Arc<Self>, interval: std::time::Duration) {
        let mut slot = self.sweeper.lock();
        if slot.is_none() {
            *slot = Some(SweeperHandle::spawn(Arc::clone(self), interval));
        }
    }

    /// Stops the TTL sweeper. Idempotent; safe to call without a sweeper.
    pub async fn close(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

fn to_query_hits(hits: Vec<vanta_index::SearchHit>, include_vectors: bool) -> Vec<QueryHit> {
    hits.into_iter()
        .map(|hit| QueryHit {
            id: hit.id,
            score: hit.score,
            vector: include_vectors.then_some(hit.vector),
            metadata: hit.metadata,
        })
        .collect()
}

fn build_document(dimension: usize, request: InsertRequest, now: i64) -> EngineResult<Document> {
    let InsertRequest {
        id,
        vector,
        metadata,
        ttl,
    } = request;

    if vector.is_empty() {
        return Err(EngineError::invalid_vector("vector must be non-empty"));
    }
    if let Some(component) = vector.iter().find(|v| !v.is_finite()) {
        return Err(EngineError::invalid_vector(format!(
            "vector contains non-finite component {component}"
        )));
    }
    if vector.len() != dimension {
        return Err(EngineError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }

    let id = match id {
        Some(id) if id.is_empty() => {
            return Err(EngineError::invalid_argument("document id must be non-empty"))
        }
        Some(id) => id,
        None => Uuid::now_v7().to_string(),
    };

    let mut metadata = metadata.unwrap_or_default();
    if let Some(ttl) = ttl {
        let duration = parse_ttl(&ttl)?;
        metadata.insert(TTL_EXPIRES_KEY.to_string(), json!(now + duration));
        metadata.insert(TTL_DURATION_KEY.to_string(), ttl);
    }

    Ok(Document {
        id,
        vector,
        metadata,
    })
}
