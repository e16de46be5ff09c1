//! # ragbase-chain
//!
//! Retrieval-augmented, multi-turn answer streaming.
//!
//! A [`ConversationalChain`] ties together a [`Retriever`](ragbase_rag::Retriever),
//! a language model and a [`HistoryStore`](ragbase_session::HistoryStore). Each
//! question produces an [`AnswerStream`] of [`StreamEvent`]s: the retrieved
//! sources first, then the answer token by token.
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use ragbase_chain::{ConversationalChain, StreamEvent};
//!
//! let chain = ConversationalChain::builder()
//!     .llm(llm)
//!     .retriever(retriever)
//!     .history(history)
//!     .build()?;
//!
//! let mut answer = chain.ask("What is social control?", "session-1", Some(&index)).await?;
//! while let Some(event) = answer.next().await {
//!     match event {
//!         Ok(StreamEvent::Sources(sources)) => show_sources(&sources),
//!         Ok(StreamEvent::Token(text)) => print!("{text}"),
//!         Err(e) => eprintln!("{}", e.user_message()),
//!     }
//! }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod prompt;
pub mod state;

pub use chain::{
    AnswerStream, CollectedAnswer, ConversationalChain, ConversationalChainBuilder,
    collect_answer,
};
pub use config::{ChainConfig, EmptyContextPolicy};
pub use error::{ChainError, ERROR_MESSAGE, Result};
pub use event::StreamEvent;
pub use prompt::{NOT_FOUND_ANSWER, SYSTEM_PROMPT};
pub use state::ChainState;
