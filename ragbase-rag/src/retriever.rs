//! Question → ranked chunks.

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::{EmbeddingProvider, check_dimensions};
use crate::error::{RagError, Result};
use crate::pipeline::VectorIndexHandle;

/// Embeds questions and searches a [`VectorIndexHandle`].
///
/// The embedding provider must be configured exactly as it was for
/// ingestion. A dimension disagreement is a configuration error, never a
/// retrieval failure.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    config: RagConfig,
}

impl Retriever {
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, config: RagConfig) -> Self {
        Self { embedding_provider, config }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Retrieve with the configured `top_k`.
    pub async fn retrieve_default(
        &self,
        question: &str,
        index: &VectorIndexHandle,
    ) -> Result<RetrievalResult> {
        self.retrieve(question, index, self.config.top_k).await
    }

    /// Return up to `k` chunks most similar to `question`.
    ///
    /// Results are ordered by descending score, ties broken by
    /// `(source_ref, ordinal)`, and never repeat a chunk identity. Chunks
    /// scoring below the configured similarity threshold are dropped. An
    /// empty namespace yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k` is zero.
    /// - [`RagError::DimensionMismatch`] if the embedder and index disagree.
    /// - [`RagError::RetrievalError`] if embedding the question or searching fails.
    pub async fn retrieve(
        &self,
        question: &str,
        index: &VectorIndexHandle,
        k: usize,
    ) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be at least 1".to_string()));
        }
        let dimensions = self.embedding_provider.dimensions();
        if dimensions != index.dimensions() {
            error!(
                namespace = %index.namespace(),
                expected = index.dimensions(),
                actual = dimensions,
                "embedder does not match index"
            );
            return Err(RagError::DimensionMismatch {
                expected: index.dimensions(),
                actual: dimensions,
            });
        }

        let query = self.embedding_provider.embed(question).await.map_err(|e| {
            if e.is_configuration() {
                return e;
            }
            error!(namespace = %index.namespace(), error = %e, "query embedding failed");
            RagError::RetrievalError(format!("query embedding failed: {e}"))
        })?;
        check_dimensions(index.dimensions(), &query)?;

        let hits = index.store().search(index.namespace(), &query, k).await.map_err(|e| {
            if e.is_configuration() {
                return e;
            }
            error!(namespace = %index.namespace(), error = %e, "vector search failed");
            RagError::RetrievalError(format!(
                "search failed in namespace '{}': {e}",
                index.namespace()
            ))
        })?;

        let threshold = self.config.similarity_threshold;
        let hits = hits.into_iter().filter(|hit| hit.score >= threshold).collect();
        let result = RetrievalResult::from_hits(hits);
        debug!(namespace = %index.namespace(), k, hit_count = result.len(), "retrieval completed");
        Ok(result)
    }
}
