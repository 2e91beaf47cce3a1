use thiserror::Error;

/// Canonical error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Collection already exists and cannot be created again.
    #[error("collection `{name}` already exists")]
    CollectionExists {
        /// Name that conflicts.
        name: String,
    },

    /// Collection was not found in the engine.
    #[error("collection `{name}` was not found")]
    CollectionNotFound {
        /// Name of the missing collection.
        name: String,
    },

    /// Caller supplied an unusable argument (empty name, unknown metric, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable explanation.
        message: String,
    },

    /// Vector length does not match the collection dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension declared by the collection.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Vector is missing, empty, or contains non-finite components.
    #[error("invalid vector: {message}")]
    InvalidVector {
        /// Human-readable explanation.
        message: String,
    },

    /// TTL value could not be parsed.
    #[error("invalid TTL: {value}")]
    InvalidTtl {
        /// The rejected TTL value, rendered for diagnostics.
        value: String,
    },

    /// Filter expression is malformed.
    #[error("filter error: {message}")]
    Filter {
        /// Human-readable explanation.
        message: String,
    },

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Creates a `CollectionExists` variant.
    #[must_use]
    pub fn collection_exists(name: impl Into<String>) -> Self {
        Self::CollectionExists { name: name.into() }
    }

    /// Creates a `CollectionNotFound` variant.
    #[must_use]
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates an `InvalidArgument` variant.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an `InvalidVector` variant.
    #[must_use]
    pub fn invalid_vector(message: impl Into<String>) -> Self {
        Self::InvalidVector {
            message: message.into(),
        }
    }

    /// Creates an `InvalidTtl` variant.
    #[must_use]
    pub fn invalid_ttl(value: impl Into<String>) -> Self {
        Self::InvalidTtl {
            value: value.into(),
        }
    }

    /// Creates a `Filter` variant.
    #[must_use]
    pub fn filter(message: impl Into<String>) -> Self {
        Self::Filter {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenient result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
