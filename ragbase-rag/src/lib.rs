//! # ragbase-rag
//!
//! Document ingestion, vector indexing and retrieval for RagBase.
//!
//! ## Overview
//!
//! Documents flow through [`IngestionPipeline`] (extract → chunk → embed →
//! store) into a namespaced [`VectorStore`]. Questions flow through
//! [`Retriever`] (embed → search → rank → filter) and the results are turned
//! into a prompt context block by [`format_context`].
//!
//! - [`Chunker`] implementations: [`FixedSizeChunker`], [`RecursiveChunker`]
//! - [`EmbeddingProvider`] implementations: [`HashingEmbeddingProvider`] and,
//!   with the `ollama` feature, `ollama::OllamaEmbeddingProvider`
//! - [`VectorStore`] implementations: [`InMemoryVectorStore`], [`FileVectorStore`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragbase_rag::*;
//!
//! let embedder = Arc::new(HashingEmbeddingProvider::new(256));
//! let pipeline = IngestionPipeline::builder()
//!     .embedding_provider(embedder.clone())
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest(&[Document::from_text("notes.txt", text)], None).await?;
//! let retriever = Retriever::new(embedder, RagConfig::default());
//! let hits = retriever.retrieve_default("What is social control?", &report.handle).await?;
//! println!("{}", format_context(&hits));
//! ```

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod file_store;
pub mod inmemory;
pub mod loader;
pub mod namespace;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{ConflictPolicy, RagConfig, RagConfigBuilder};
pub use context::{CHUNK_SEPARATOR, format_context, remove_links};
pub use document::{Chunk, ChunkId, Document, EmbeddedChunk, RetrievalResult, SearchResult};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use file_store::FileVectorStore;
pub use inmemory::InMemoryVectorStore;
pub use loader::{
    AutoExtractor, DOCUMENT_EXTENSIONS, PlainTextExtractor, TextExtractor, discover_documents,
};
#[cfg(feature = "pdf")]
pub use loader::PdfExtractor;
pub use namespace::{DEFAULT_NAMESPACE, Namespace};
pub use pipeline::{
    DocumentReport, IngestionFailure, IngestionPipeline, IngestionPipelineBuilder,
    IngestionReport, VectorIndexHandle,
};
pub use retriever::Retriever;
pub use vectorstore::{NamespaceInfo, UpsertStats, VectorStore};
