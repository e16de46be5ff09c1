//! # ragbase-session
//!
//! Append-only conversation history, keyed by session id.
//!
//! [`HistoryStore`] is the seam the conversational chain and the presentation
//! layer share; [`InMemoryHistoryStore`] keeps histories for the life of the
//! process.

pub mod error;
pub mod inmemory;
pub mod store;

pub use error::{Result, SessionError};
pub use inmemory::InMemoryHistoryStore;
pub use store::{HistoryStore, HistoryStoreConfig, SessionSummary};
