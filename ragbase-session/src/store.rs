//! The history store seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbase_core::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings shared by history store implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStoreConfig {
    /// Refuse appends once a session holds this many messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
}

impl HistoryStoreConfig {
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }
}

/// A snapshot of one session's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only, per-session message logs.
///
/// A session springs into existence, empty, the first time it is read or
/// written. Appends to one session are applied one at a time in the order
/// they were issued; appends to different sessions never wait on each other.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The session's messages in chronological order.
    async fn get_history(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Add one message to the end of a session's history.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidRole`](crate::SessionError::InvalidRole) for a system message.
    /// - [`SessionError::ConversationLimitReached`](crate::SessionError::ConversationLimitReached)
    ///   when the configured limit is hit.
    async fn append(&self, session_id: &str, role: Role, content: String) -> Result<()>;

    /// Every known session, ordered by id.
    async fn sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Drop a session's messages. The session itself stays known.
    async fn clear(&self, session_id: &str) -> Result<()>;
}
