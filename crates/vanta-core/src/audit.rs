//! Append-only audit log.
//!
//! Entries live in a fixed-capacity ring: when the log is full the oldest
//! entry is dropped to make room. Ids are monotonic across the life of the
//! log, so dropped history is detectable from gaps.

use std::collections::{BTreeMap, VecDeque};

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineResult;
use crate::ttl::now_millis;

/// Action recorded by an audit entry.
///
/// The engine logs the fixed set below; higher layers record their own
/// action names through [`AuditAction::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditAction {
    CreateCollection,
    DropCollection,
    Insert,
    Delete,
    Query,
    TtlSweep,
    Custom(String),
}

impl AuditAction {
    /// Returns the canonical snake_case string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateCollection => "create_collection",
            Self::DropCollection => "drop_collection",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::TtlSweep => "ttl_sweep",
            Self::Custom(name) => name,
        }
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

impl From<String> for AuditAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create_collection" => Self::CreateCollection,
            "drop_collection" => Self::DropCollection,
            "insert" => Self::Insert,
            "delete" => Self::Delete,
            "query" => Self::Query,
            "ttl_sweep" => Self::TtlSweep,
            _ => Self::Custom(s),
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic identifier assigned by the log.
    pub id: u64,
    /// Event time as epoch milliseconds.
    pub timestamp: i64,
    /// Event time in RFC 3339 form.
    pub iso_time: String,
    /// What happened.
    pub action: AuditAction,
    /// Who did it (`engine`, a tenant id, or a higher-layer actor).
    pub actor: String,
    /// Collection the action touched, when applicable.
    pub collection: Option<String>,
    /// Number of documents affected.
    pub document_count: usize,
    /// Operation latency in milliseconds, when measured.
    pub duration_ms: Option<f64>,
    /// Free-form context.
    pub details: Option<Value>,
}

impl AuditEntry {
    /// Creates an entry timestamped now; the id is assigned on record.
    #[must_use]
    pub fn new(action: AuditAction, actor: impl Into<String>) -> Self {
        let timestamp = now_millis();
        Self {
            id: 0,
            timestamp,
            iso_time: iso_time(timestamp),
            action,
            actor: actor.into(),
            collection: None,
            document_count: 0,
            duration_ms: None,
            details: None,
        }
    }

    /// Sets the collection name (builder pattern).
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets the affected document count (builder pattern).
    #[must_use]
    pub fn with_document_count(mut self, count: usize) -> Self {
        self.document_count = count;
        self
    }

    /// Sets the measured latency (builder pattern).
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attaches free-form context (builder pattern).
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

fn iso_time(timestamp_millis: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Filter for querying retained audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Only entries with this action.
    pub action: Option<AuditAction>,
    /// Only entries by this actor.
    pub actor: Option<String>,
    /// Only entries touching this collection.
    pub collection: Option<String>,
    /// Only entries at or after this epoch-ms timestamp.
    pub since: Option<i64>,
    /// Only entries at or before this epoch-ms timestamp.
    pub until: Option<i64>,
    /// Maximum number of entries returned (newest first).
    pub limit: Option<usize>,
}

/// Aggregate counts over the retained entries.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    /// Number of retained entries.
    pub total: usize,
    /// Per-action counts.
    pub by_action: BTreeMap<String, u64>,
    /// Per-actor counts.
    pub by_actor: BTreeMap<String, u64>,
}

struct AuditState {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
}

/// Bounded, append-only audit log.
pub struct AuditLog {
    capacity: usize,
    state: Mutex<AuditState>,
}

impl AuditLog {
    /// Default retention capacity.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Creates a log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(AuditState {
                entries: VecDeque::new(),
                next_id: 1,
            }),
        }
    }

    /// Records an entry, returning its assigned id.
    pub fn record(&self, mut entry: AuditEntry) -> u64 {
        let mut state = self.state.lock();
        entry.id = state.next_id;
        state.next_id += 1;
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        let id = entry.id;
        state.entries.push_back(entry);
        id
    }

    /// Returns matching entries, newest first.
    #[must_use]
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let state = self.state.lock();
        let limit = query.limit.unwrap_or(usize::MAX);
        state
            .entries
            .iter()
            .rev()
            .filter(|e| query.action.as_ref().is_none_or(|a| &e.action == a))
            .filter(|e| query.actor.as_deref().is_none_or(|a| e.actor == a))
            .filter(|e| {
                query
                    .collection
                    .as_deref()
                    .is_none_or(|c| e.collection.as_deref() == Some(c))
            })
            .filter(|e| query.since.is_none_or(|t| e.timestamp >= t))
            .filter(|e| query.until.is_none_or(|t| e.timestamp <= t))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns aggregate counts over the retained entries.
    #[must_use]
    pub fn stats(&self) -> AuditStats {
        let state = self.state.lock();
        let mut by_action = BTreeMap::new();
        let mut by_actor = BTreeMap::new();
        for entry in &state.entries {
            *by_action.entry(entry.action.as_str().to_string()).or_insert(0) += 1;
            *by_actor.entry(entry.actor.clone()).or_insert(0) += 1;
        }
        AuditStats {
            total: state.entries.len(),
            by_action,
            by_actor,
        }
    }

    /// Serializes the retained entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when an entry cannot be encoded.
    pub fn export_json(&self) -> EngineResult<String> {
        let state = self.state.lock();
        let entries: Vec<&AuditEntry> = state.entries.iter().collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` when nothing has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
