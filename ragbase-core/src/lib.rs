//! # ragbase-core
//!
//! Types shared by every RagBase crate:
//!
//! - [`Message`] and [`Role`]: role-tagged conversation turns
//! - [`Llm`]: the language-model seam (streaming and batch generation)
//! - [`ModelError`]: failures reported by model providers

pub mod error;
pub mod llm;
pub mod message;

pub use error::{ModelError, Result};
pub use llm::{GenerationConfig, Llm, LlmRequest, TextStream};
pub use message::{Message, Role};
