//! Agent memory facades.
//!
//! Episodic, semantic, and procedural memory are preconfigured collections
//! written through a tenant scope keyed by the agent id, so agents sharing
//! an engine never see each other's memories. Episodic records expire by
//! default; knowledge and procedures persist until deleted.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use vanta_core::{now_millis, AuditAction, AuditEntry};
use vanta_engine::{CollectionOptions, InsertRequest, QueryHit, QueryOptions, VectorEngine};

use crate::embedding::EmbeddingProvider;
use crate::error::TextResult;

/// Memory subsystem selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Event timeline; records default to the configured TTL.
    Episodic,
    /// Long-lived knowledge facts.
    Semantic,
    /// Learned procedures and patterns.
    Procedural,
}

impl MemoryKind {
    /// All subsystems, in initialization order.
    pub const ALL: [Self; 3] = [Self::Episodic, Self::Semantic, Self::Procedural];

    /// Returns the backing collection name.
    #[must_use]
    pub const fn collection_name(&self) -> &'static str {
        match self {
            Self::Episodic => "memory_episodic",
            Self::Semantic => "memory_semantic",
            Self::Procedural => "memory_procedural",
        }
    }
}

/// Unified memory interface for one agent.
pub struct AgentMemory {
    engine: Arc<VectorEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    agent_id: String,
    episodic_ttl: Option<Value>,
}

impl AgentMemory {
    /// Default expiry for episodic records.
    pub const DEFAULT_EPISODIC_TTL: &'static str = "30d";

    /// Creates the facade, creating the three memory collections at the
    /// embedder's dimension when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates collection-creation failures.
    pub fn new(
        engine: Arc<VectorEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        agent_id: impl Into<String>,
    ) -> TextResult<Self> {
        for kind in MemoryKind::ALL {
            let name = kind.collection_name();
            if engine.get_collection(name).is_none() {
                engine.create_collection(name, CollectionOptions::new(embedder.dimension()))?;
            }
        }
        Ok(Self {
            engine,
            embedder,
            agent_id: agent_id.into(),
            episodic_ttl: Some(json!(Self::DEFAULT_EPISODIC_TTL)),
        })
    }

    /// Overrides the default episodic TTL; `None` disables expiry.
    #[must_use]
    pub fn with_episodic_ttl(mut self, ttl: Option<Value>) -> Self {
        self.episodic_ttl = ttl;
        self
    }

    /// Returns the agent id this facade writes as.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Embeds and stores a memory; returns its id.
    ///
    /// The text and recording time are kept in metadata alongside the
    /// caller's fields. An explicit `ttl` wins over the subsystem default.
    ///
    /// # Errors
    ///
    /// Propagates embedding and insert failures.
    pub async fn record(
        &self,
        kind: MemoryKind,
        text: &str,
        mut metadata: Map<String, Value>,
        ttl: Option<Value>,
    ) -> TextResult<String> {
        let vectors = self.embedder.embed(&[text.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::TextError::Embedding("provider returned no vectors".into()))?;

        metadata.insert("text".to_string(), json!(text));
        metadata.insert("recorded_at".to_string(), json!(now_millis()));

        let mut request = InsertRequest::new(vector).with_metadata(metadata);
        let ttl = ttl.or_else(|| match kind {
            MemoryKind::Episodic => self.episodic_ttl.clone(),
            _ => None,
        });
        if let Some(ttl) = ttl {
            request = request.with_ttl(ttl);
        }

        let scope = self
            .engine
            .tenant(kind.collection_name(), &self.agent_id)?;
        let ids = scope.insert(vec![request])?;
        let id = ids
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::TextError::Embedding("insert returned no id".into()))?;

        self.engine.audit().record(
            AuditEntry::new(AuditAction::Custom("memory_record".into()), &self.agent_id)
                .with_collection(kind.collection_name())
                .with_document_count(1),
        );
        Ok(id)
    }

    /// Embeds a cue and recalls the most similar memories of one kind.
    ///
    /// # Errors
    ///
    /// Propagates embedding and query failures.
    pub async fn recall(
        &self,
        kind: MemoryKind,
        cue: &str,
        top_k: usize,
    ) -> TextResult<Vec<QueryHit>> {
        let vectors = self.embedder.embed(&[cue.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::TextError::Embedding("provider returned no vectors".into()))?;

        let scope = self
            .engine
            .tenant(kind.collection_name(), &self.agent_id)?;
        let response = scope.query(&vector, QueryOptions::new(top_k).with_include_vectors(false))?;

        self.engine.audit().record(
            AuditEntry::new(AuditAction::Custom("memory_recall".into()), &self.agent_id)
                .with_collection(kind.collection_name())
                .with_document_count(response.results.len()),
        );
        Ok(response.results)
    }

    /// Deletes memories by id, skipping anything another agent owns.
    ///
    /// # Errors
    ///
    /// Propagates engine delete failures.
    pub fn forget(&self, kind: MemoryKind, ids: &[String]) -> TextResult<usize> {
        let scope = self
            .engine
            .tenant(kind.collection_name(), &self.agent_id)?;
        Ok(scope.delete(ids)?)
    }
}
