//! Events produced by an answer stream.

use ragbase_rag::RetrievalResult;
use serde::{Deserialize, Serialize};

/// One item of an answer stream.
///
/// At most one `Sources` event is produced per answer and it always comes
/// before every `Token`. Concatenating the `Token` texts in order gives the
/// full answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The chunks the answer is grounded on, most relevant first.
    Sources(RetrievalResult),
    /// The next piece of answer text.
    Token(String),
}

impl StreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Sources(_) => "sources",
            Self::Token(_) => "token",
        }
    }

    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(text) => Some(text),
            Self::Sources(_) => None,
        }
    }
}
