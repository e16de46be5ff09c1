//! Process-lifetime history store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbase_core::{Message, Role};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::store::{HistoryStore, HistoryStoreConfig, SessionSummary};

#[derive(Debug)]
struct SessionLog {
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionLog {
    fn new() -> Self {
        let now = Utc::now();
        Self { messages: Vec::new(), created_at: now, updated_at: now }
    }
}

/// A [`HistoryStore`] held in memory.
///
/// The session map is behind a read-write lock that is only held long enough
/// to find or create an entry. Each session then has its own mutex, so a
/// slow writer in one session never blocks another. Tokio's mutex hands out
/// the lock in request order, which keeps same-session appends in call order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryStore {
    config: HistoryStoreConfig,
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<SessionLog>>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryStoreConfig) -> Self {
        Self { config, sessions: Arc::default() }
    }

    async fn session(&self, session_id: &str) -> Result<Arc<Mutex<SessionLog>>> {
        if session_id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }
        if let Some(log) = self.sessions.read().await.get(session_id) {
            return Ok(log.clone());
        }
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "created session");
            Arc::new(Mutex::new(SessionLog::new()))
        });
        Ok(log.clone())
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_history(&self, session_id: &str) -> Result<Vec<Message>> {
        let log = self.session(session_id).await?;
        let log = log.lock().await;
        Ok(log.messages.clone())
    }

    async fn append(&self, session_id: &str, role: Role, content: String) -> Result<()> {
        if role == Role::System {
            return Err(SessionError::InvalidRole(role));
        }
        let log = self.session(session_id).await?;
        let mut log = log.lock().await;
        if let Some(limit) = self.config.max_messages {
            if log.messages.len() >= limit {
                warn!(session_id, limit, "conversation limit reached");
                return Err(SessionError::ConversationLimitReached {
                    session_id: session_id.to_string(),
                    limit,
                });
            }
        }
        log.messages.push(Message::new(role, content));
        log.updated_at = Utc::now();
        debug!(session_id, role = %role, message_count = log.messages.len(), "appended message");
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let entries: Vec<(String, Arc<Mutex<SessionLog>>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, log)| (id.clone(), log.clone()))
            .collect();

        let mut summaries = Vec::with_capacity(entries.len());
        for (session_id, log) in entries {
            let log = log.lock().await;
            summaries.push(SessionSummary {
                session_id,
                message_count: log.messages.len(),
                created_at: log.created_at,
                updated_at: log.updated_at,
            });
        }
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(summaries)
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let log = self.session(session_id).await?;
        let mut log = log.lock().await;
        log.messages.clear();
        log.updated_at = Utc::now();
        debug!(session_id, "cleared session");
        Ok(())
    }
}
