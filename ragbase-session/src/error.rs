use ragbase_core::Role;
use thiserror::Error;

/// Errors returned by a [`HistoryStore`](crate::HistoryStore).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session id must not be empty")]
    EmptySessionId,

    /// Histories hold only user and assistant turns.
    #[error("cannot store a {0} message in session history")]
    InvalidRole(Role),

    #[error("session '{session_id}' reached its limit of {limit} messages")]
    ConversationLimitReached { session_id: String, limit: usize },
}

pub type Result<T> = std::result::Result<T, SessionError>;
