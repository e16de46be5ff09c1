//! Error types for the conversational chain.

use ragbase_core::ModelError;
use ragbase_rag::RagError;
use ragbase_session::SessionError;
use thiserror::Error;

/// What the user sees when a request could not be processed.
///
/// Distinct from [`NOT_FOUND_ANSWER`](crate::NOT_FOUND_ANSWER), which is a
/// valid answer rather than a failure.
pub const ERROR_MESSAGE: &str = "I apologize, but I encountered an error processing your request.";

/// Errors that end an answer stream.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Embedder/index dimension mismatch or missing model configuration.
    /// Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The index could not be queried.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The language model failed before or during generation.
    #[error("Generation failed: {0}")]
    Generation(#[from] ModelError),

    /// The session history could not be read or written.
    #[error("Session history error: {0}")]
    Session(#[from] SessionError),
}

impl ChainError {
    /// Human-readable text to show instead of an answer.
    pub fn user_message(&self) -> &'static str {
        ERROR_MESSAGE
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<RagError> for ChainError {
    fn from(err: RagError) -> Self {
        if err.is_configuration() {
            Self::Configuration(err.to_string())
        } else {
            Self::Retrieval(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
