//! Ollama provider for RagBase.
//!
//! Talks to a local Ollama server over its HTTP API:
//! - `POST /api/chat` with `stream: true` for token streaming (newline-delimited JSON)
//! - `POST /api/chat` with `stream: false` for one-shot generation
//!
//! # Example
//!
//! ```rust,ignore
//! use ragbase_model::ollama::{OllamaClient, OllamaConfig};
//!
//! let client = OllamaClient::new(OllamaConfig::new("llama3.1:8b").with_temperature(0.0))?;
//! let mut stream = client.generate_stream(request).await?;
//! ```

mod client;
mod config;
mod convert;

pub use client::OllamaClient;
pub use config::{DEFAULT_MODEL, DEFAULT_OLLAMA_HOST, OllamaConfig};
