//! Index namespaces: logically isolated collections inside one vector store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The namespace used when ingestion is not scoped to a user or upload set.
pub const DEFAULT_NAMESPACE: &str = "default";

/// An opaque, validated namespace name.
///
/// Namespaces are never merged: every store operation is scoped to exactly one.
/// How a namespace maps to storage is decided by the store, not by callers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for an empty or whitespace-only name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RagError::ConfigError("namespace must not be empty".to_string()));
        }
        Ok(Self(name))
    }

    /// The namespace holding one user's documents.
    pub fn for_user(user_id: impl fmt::Display) -> Self {
        Self(format!("user_{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = RagError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(value: Namespace) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_names() {
        assert!(Namespace::new("  ").is_err());
        assert!(Namespace::new("docs").is_ok());
    }

    #[test]
    fn user_namespace_is_prefixed() {
        assert_eq!(Namespace::for_user(42).as_str(), "user_42");
    }

    #[test]
    fn deserializing_validates() {
        assert!(serde_json::from_str::<Namespace>(r#""""#).is_err());
        let ns: Namespace = serde_json::from_str(r#""team""#).unwrap();
        assert_eq!(ns.as_str(), "team");
    }
}
