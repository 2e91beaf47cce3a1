//! Core domain types for the VantaDB vector engine.

pub mod audit;
pub mod config;
pub mod error;
pub mod filter;
pub mod metric;
pub mod ttl;

pub use audit::{AuditAction, AuditEntry, AuditLog, AuditQuery, AuditStats};
pub use config::{EngineSettings, IndexSettings, QuerySettings, VantaConfig};
pub use error::{EngineError, EngineResult};
pub use filter::{Condition, Filter};
pub use metric::DistanceMetric;
pub use ttl::{
    is_expired, now_millis, parse_ttl, TENANT_ID_KEY, TTL_DURATION_KEY, TTL_EXPIRES_KEY,
};
