use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single nearest-neighbor match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document identifier.
    pub id: String,
    /// The stored vector.
    pub vector: Vec<f64>,
    /// The stored metadata.
    pub metadata: Map<String, Value>,
    /// Unified similarity score; higher is more similar.
    pub score: f64,
}
