//! Vector index implementations for VantaDB.
//!
//! - [`HnswGraph`]: layered ANN graph for approximate nearest neighbor search
//! - [`brute_force`]: exhaustive linear scan (correctness baseline and the
//!   index behind flat collections)

pub mod brute_force;
mod hnsw;
mod types;

pub use brute_force::DocRef;
pub use hnsw::{HnswGraph, HnswParams, HnswSnapshot, HnswStats, NodeSnapshot};
pub use types::SearchHit;
