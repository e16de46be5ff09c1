//! Chain configuration.

use ragbase_core::GenerationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::prompt::{CONTEXT_PLACEHOLDER, SYSTEM_PROMPT};

/// What to do when retrieval succeeds but finds nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Ask the model anyway with an empty context; the system prompt tells it
    /// to reply that the document does not cover the question.
    #[default]
    Grounded,
    /// Reply with the fixed not-found sentence without calling the model.
    NotFound,
    /// Answer from the question and history alone, as when no index exists.
    ContextFree,
}

/// Settings for a [`ConversationalChain`](crate::ConversationalChain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Must contain the `{context}` placeholder.
    pub system_prompt: String,
    pub empty_context: EmptyContextPolicy,
    /// Overrides the retriever's `top_k` when set.
    pub top_k: Option<usize>,
    pub generation: Option<GenerationConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            empty_context: EmptyContextPolicy::default(),
            top_k: None,
            generation: None,
        }
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.system_prompt.contains(CONTEXT_PLACEHOLDER) {
            return Err(ChainError::Configuration(format!(
                "system_prompt must contain the {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        if self.top_k == Some(0) {
            return Err(ChainError::Configuration("top_k must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_empty_context(mut self, policy: EmptyContextPolicy) -> Self {
        self.empty_context = policy;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = Some(generation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_grounded() {
        let config = ChainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.empty_context, EmptyContextPolicy::Grounded);
    }

    #[test]
    fn prompt_without_placeholder_is_rejected() {
        let config = ChainConfig::default().with_system_prompt("Answer well.");
        assert!(config.validate().unwrap_err().is_configuration());
        assert!(ChainConfig::default().with_top_k(0).validate().is_err());
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let config: ChainConfig =
            serde_json::from_str(r#"{"empty_context":"context_free","top_k":2}"#).unwrap();
        assert_eq!(config.empty_context, EmptyContextPolicy::ContextFree);
        assert_eq!(config.top_k, Some(2));
        assert_eq!(config.system_prompt, SYSTEM_PROMPT);
    }
}
