//! The per-answer state machine.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error};

/// Where one answer stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    Start,
    Retrieving,
    ContextReady,
    Generating,
    Done,
    Failed,
}

impl ChainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal step.
    ///
    /// `Start → Generating` is the context-free path taken when there is no
    /// index to retrieve from.
    pub fn can_transition_to(self, next: ChainState) -> bool {
        use ChainState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Start, Retrieving | Generating)
            | (Retrieving, ContextReady)
            | (ContextReady, Generating)
            | (Generating, Done) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Retrieving => "retrieving",
            Self::ContextReady => "context_ready",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives a [`ChainState`] and publishes it to the stream's owner.
pub(crate) struct StateTracker {
    session_id: String,
    tx: watch::Sender<ChainState>,
}

impl StateTracker {
    pub(crate) fn new(session_id: String) -> (Self, watch::Receiver<ChainState>) {
        let (tx, rx) = watch::channel(ChainState::Start);
        (Self { session_id, tx }, rx)
    }

    pub(crate) fn current(&self) -> ChainState {
        *self.tx.borrow()
    }

    pub(crate) fn to(&self, next: ChainState) {
        let from = self.current();
        if !from.can_transition_to(next) {
            error!(session_id = %self.session_id, %from, to = %next, "illegal chain transition");
            debug_assert!(false, "illegal chain transition {from} -> {next}");
            return;
        }
        debug!(session_id = %self.session_id, %from, to = %next, "chain transition");
        self.tx.send_replace(next);
    }
}
