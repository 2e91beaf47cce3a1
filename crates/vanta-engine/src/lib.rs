//! VantaDB engine: collections, queries, tenancy, and TTL lifecycle.
//!
//! The engine owns every collection and routes operations to the HNSW graph
//! or the brute-force scan, applying over-fetch, metadata post-filtering,
//! and TTL hiding on the query path. Multi-tenant callers go through
//! [`TenantScope`]; a background task sweeps expired documents.

mod collection;
mod engine;
mod sweeper;
mod tenant;

pub use collection::{CollectionCounters, CollectionInfo, Document, IndexType};
pub use engine::{
    CollectionOptions, InsertRequest, QueryHit, QueryMethod, QueryOptions, QueryResponse,
    VectorEngine,
};
pub use tenant::TenantScope;
