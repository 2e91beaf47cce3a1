//! Tenant-scoped access.
//!
//! A [`TenantScope`] is the only surface multi-tenant callers should touch.
//! It enforces soft isolation by tagging every insert with the tenant id,
//! conjoining a tenant-equality predicate into every query filter, and
//! checking ownership before deletes. No path through the scope can read,
//! mutate, or remove a foreign document, even against crafted filters or
//! foreign ids.

use std::sync::Arc;

use serde_json::{json, Map};

use vanta_core::{Condition, EngineResult, Filter, TENANT_ID_KEY};

use crate::engine::{InsertRequest, QueryOptions, QueryResponse, VectorEngine};

/// A non-owning view of one collection restricted to one tenant.
pub struct TenantScope {
    engine: Arc<VectorEngine>,
    collection: String,
    tenant_id: String,
}

impl TenantScope {
    pub(crate) fn new(engine: Arc<VectorEngine>, collection: String, tenant_id: String) -> Self {
        Self {
            engine,
            collection,
            tenant_id,
        }
    }

    /// Returns the tenant id this scope enforces.
    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Returns the collection this scope targets.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Inserts documents, force-tagging each with this tenant's id.
    ///
    /// The tenant id overwrites any `_tenant_id` the caller supplied.
    ///
    /// # Errors
    ///
    /// Propagates every engine insert error.
    pub fn insert(&self, mut requests: Vec<InsertRequest>) -> EngineResult<Vec<String>> {
        for request in &mut requests {
            request
                .metadata
                .get_or_insert_with(Map::new)
                .insert(TENANT_ID_KEY.to_string(), json!(self.tenant_id));
        }
        self.engine
            .insert_with_actor(&self.tenant_id, &self.collection, requests)
    }

    /// Queries with a forced tenant-equality predicate.
    ///
    /// Any `_tenant_id` condition in the caller's filter is replaced.
    ///
    /// # Errors
    ///
    /// Propagates every engine query error.
    pub fn query(&self, vector: &[f64], options: QueryOptions) -> EngineResult<QueryResponse> {
        let mut options = options;
        let mut filter = options.filter.take().unwrap_or_default();
        filter.set(TENANT_ID_KEY, Condition::Eq(json!(self.tenant_id)));
        options.filter = Some(filter);
        self.engine
            .query_with_actor(&self.tenant_id, &self.collection, vector, &options)
    }

    /// Deletes the subset of `ids` owned by this tenant.
    ///
    /// Foreign and unknown ids are silently skipped; the returned count
    /// covers only documents actually removed.
    ///
    /// # Errors
    ///
    /// `CollectionNotFound` when the collection has been dropped.
    pub fn delete(&self, ids: &[String]) -> EngineResult<usize> {
        let owned = self
            .engine
            .owned_ids(&self.collection, &self.tenant_id, ids)?;
        if owned.is_empty() {
            return Ok(0);
        }
        self.engine
            .delete_with_actor(&self.tenant_id, &self.collection, &owned)
    }
}
