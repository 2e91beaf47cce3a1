//! Text surface for VantaDB: embedding contract, chunker, RAG pipeline, and
//! agent memory facades.

pub mod chunker;
mod embedding;
mod error;
mod memory;
mod rag;

pub use chunker::{chunk_text, Chunk, ChunkOptions};
pub use embedding::{EmbeddingProvider, MockEmbeddingProvider};
pub use error::{TextError, TextResult};
pub use memory::{AgentMemory, MemoryKind};
pub use rag::RagPipeline;
