//! # ragbase-model
//!
//! Language-model providers implementing [`ragbase_core::Llm`].
//!
//! - [`MockLlm`]: scripted token streams with injectable failures, for tests
//! - `OllamaClient`: a local Ollama server (feature `ollama`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragbase_model::ollama::{OllamaClient, OllamaConfig};
//!
//! let model = OllamaClient::new(OllamaConfig::from_env())?;
//! ```

pub mod mock;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use mock::MockLlm;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaClient, OllamaConfig};
