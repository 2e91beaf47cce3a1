//! Embedding provider contract.
//!
//! The engine treats embedding as an opaque `text -> vector` function; only
//! the declared dimension and provider name are inspected. The mock provider
//! generates deterministic vectors so the whole stack is testable without ML
//! dependencies.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::{TextError, TextResult};

/// Trait for embedding model providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Declared output dimension.
    fn dimension(&self) -> usize;

    /// Provider name for observability.
    fn provider(&self) -> &str;

    /// Embeds a batch of texts, one vector per input, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or inputs are unusable.
    async fn embed(&self, texts: &[String]) -> TextResult<Vec<Vec<f64>>>;
}

/// Mock embedding provider for tests and offline development.
///
/// Embeddings are seeded from a hash of the input text and expanded with a
/// linear congruential generator, then L2 normalized, so equal inputs always
/// embed identically.
pub struct MockEmbeddingProvider {
    name: String,
    dimension: usize,
}

impl MockEmbeddingProvider {
    /// Default dimension.
    pub const DEFAULT_DIMENSION: usize = 64;

    /// Creates a mock provider with the default dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(Self::DEFAULT_DIMENSION)
    }

    /// Creates a mock provider with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            name: format!("mock-embed-{dimension}"),
            dimension: dimension.max(1),
        }
    }

    fn generate(&self, text: &str) -> Vec<f64> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            // Map the high bits into [-1, 1).
            embedding.push(((state >> 16) & 0xFFFF) as f64 / 32_768.0 - 1.0);
        }
        vanta_core::metric::normalize(&embedding)
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: &[String]) -> TextResult<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Err(TextError::Embedding("no inputs to embed".into()));
        }
        Ok(texts.iter().map(|t| self.generate(t)).collect())
    }
}
