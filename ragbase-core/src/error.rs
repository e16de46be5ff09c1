//! Error types for language-model providers.

use thiserror::Error;

/// Errors reported by an [`Llm`](crate::Llm) implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request could not be sent or the provider rejected it.
    #[error("Model request failed ({provider}): {message}")]
    Request {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The response stream broke off before the model signalled completion.
    #[error("Model stream failed ({provider}): {message}")]
    Stream {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The model is missing or misconfigured.
    #[error("Model configuration error: {0}")]
    Config(String),
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
