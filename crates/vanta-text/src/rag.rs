//! Retrieval-augmented generation pipeline.
//!
//! A thin orchestrator over the chunker, an embedding provider, and one
//! collection: ingest chunks and embeds text, retrieve embeds a question and
//! queries. Both log their own audit actions through the engine's log.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use vanta_core::{AuditAction, AuditEntry, Filter};
use vanta_engine::{CollectionOptions, InsertRequest, QueryOptions, QueryResponse, VectorEngine};

use crate::chunker::{chunk_text, ChunkOptions};
use crate::embedding::EmbeddingProvider;
use crate::error::{TextError, TextResult};

/// Audit actor used by the pipeline.
const RAG_ACTOR: &str = "rag";

/// Chunk-embed-insert / embed-query orchestrator over one collection.
pub struct RagPipeline {
    engine: Arc<VectorEngine>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
    chunking: ChunkOptions,
}

impl RagPipeline {
    /// Creates a pipeline, creating the collection at the embedder's declared
    /// dimension when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates collection-creation failures.
    pub fn new(
        engine: Arc<VectorEngine>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> TextResult<Self> {
        let collection = collection.into();
        if engine.get_collection(&collection).is_none() {
            engine.create_collection(&collection, CollectionOptions::new(embedder.dimension()))?;
        }
        Ok(Self {
            engine,
            embedder,
            collection,
            chunking: ChunkOptions::default(),
        })
    }

    /// Overrides the chunking parameters (builder pattern).
    #[must_use]
    pub fn with_chunking(mut self, chunking: ChunkOptions) -> Self {
        self.chunking = chunking;
        self
    }

    /// Returns the collection this pipeline writes to.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Chunks, embeds, and inserts a document; returns the chunk ids.
    ///
    /// Each chunk carries the base metadata plus `source`, `chunk_index`,
    /// `char_start`, and `char_end` provenance fields.
    ///
    /// # Errors
    ///
    /// Propagates embedding and insert failures.
    pub async fn ingest(
        &self,
        source: &str,
        text: &str,
        base_metadata: Map<String, Value>,
    ) -> TextResult<Vec<String>> {
        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_reconciled(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(TextError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let requests: Vec<InsertRequest> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut metadata = base_metadata.clone();
                metadata.insert("source".to_string(), json!(source));
                metadata.insert("chunk_index".to_string(), json!(chunk.index));
                metadata.insert("char_start".to_string(), json!(chunk.char_start));
                metadata.insert("char_end".to_string(), json!(chunk.char_end));
                InsertRequest::new(vector).with_metadata(metadata)
            })
            .collect();

        let ids = self.engine.insert(&self.collection, requests)?;
        debug!(collection = %self.collection, source, chunks = ids.len(), "ingested document");
        self.engine.audit().record(
            AuditEntry::new(AuditAction::Custom("rag_ingest".into()), RAG_ACTOR)
                .with_collection(&self.collection)
                .with_document_count(ids.len())
                .with_details(json!({"source": source})),
        );
        Ok(ids)
    }

    /// Embeds a question and queries the collection.
    ///
    /// # Errors
    ///
    /// Propagates embedding and query failures.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<Filter>,
    ) -> TextResult<QueryResponse> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| TextError::Embedding("provider returned no vectors".into()))?;

        let mut options = QueryOptions::new(top_k).with_include_vectors(false);
        if let Some(filter) = filter {
            options = options.with_filter(filter);
        }
        let response = self.engine.query(&self.collection, &vector, &options)?;

        self.engine.audit().record(
            AuditEntry::new(AuditAction::Custom("rag_retrieve".into()), RAG_ACTOR)
                .with_collection(&self.collection)
                .with_document_count(response.results.len())
                .with_duration_ms(response.elapsed_ms),
        );
        Ok(response)
    }

    /// Embeds the batch, re-creating an empty collection when the provider's
    /// first real output disagrees with its declared dimension.
    async fn embed_reconciled(&self, texts: &[String]) -> TextResult<Vec<Vec<f64>>> {
        let vectors = self.embedder.embed(texts).await?;
        let Some(actual) = vectors.first().map(Vec::len) else {
            return Ok(vectors);
        };

        let info = self
            .engine
            .get_collection(&self.collection)
            .ok_or_else(|| vanta_core::EngineError::collection_not_found(&self.collection))?;
        if actual != info.dimension && info.count == 0 {
            debug!(
                collection = %self.collection,
                declared = info.dimension,
                actual,
                "recreating empty collection at the embedder's actual dimension"
            );
            self.engine.drop_collection(&self.collection);
            self.engine.create_collection(
                &self.collection,
                CollectionOptions::new(actual)
                    .with_metric(info.metric)
                    .with_index_type(info.index_type),
            )?;
        }
        Ok(vectors)
    }
}
