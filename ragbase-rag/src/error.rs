//! Error types for the `ragbase-rag` crate.

use thiserror::Error;

/// Errors that can occur in ingestion, indexing and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A single document could not be read, chunked or embedded.
    #[error("Ingestion error ({source_ref}): {message}")]
    IngestionError {
        /// The document that failed.
        source_ref: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's length disagrees with the dimension the index was built with.
    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the namespace was created with.
        expected: usize,
        /// The dimension that was supplied.
        actual: usize,
    },

    /// A configuration validation error or invalid caller argument.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The index could not be queried.
    #[error("Retrieval error: {0}")]
    RetrievalError(String),
}

impl RagError {
    /// Whether this error is fatal configuration rather than a transient or
    /// per-document failure. Configuration errors are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. } | Self::ConfigError(_))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
