use thiserror::Error;

use vanta_core::EngineError;

/// Error type for the text/RAG surface.
#[derive(Debug, Error)]
pub enum TextError {
    /// The embedding provider failed or returned malformed output.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// An underlying engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenient result alias for text operations.
pub type TextResult<T> = Result<T, TextError>;
