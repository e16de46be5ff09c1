//! Ingestion pipeline orchestrator.
//!
//! The [`IngestionPipeline`] runs extract → chunk → embed → store for a batch
//! of documents into one [`Namespace`], composing a [`TextExtractor`], a
//! [`Chunker`], an [`EmbeddingProvider`] and a [`VectorStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragbase_rag::{IngestionPipeline, InMemoryVectorStore, HashingEmbeddingProvider, Namespace};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest(&documents, Some(&Namespace::for_user(42))).await?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.source_ref, failure.message);
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, EmbeddedChunk};
use crate::embedding::{EmbeddingProvider, check_dimensions};
use crate::error::{RagError, Result};
use crate::loader::{AutoExtractor, TextExtractor};
use crate::namespace::Namespace;
use crate::vectorstore::{UpsertStats, VectorStore};

/// A handle to one opened namespace of a vector store.
///
/// Handles are cheap to clone and are what the retriever and the
/// conversational chain read from.
#[derive(Clone)]
pub struct VectorIndexHandle {
    namespace: Namespace,
    dimensions: usize,
    store: Arc<dyn VectorStore>,
}

impl VectorIndexHandle {
    pub fn new(namespace: Namespace, dimensions: usize, store: Arc<dyn VectorStore>) -> Self {
        Self { namespace, dimensions, store }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The embedding dimension the namespace was created with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Number of chunks currently in the namespace.
    pub async fn len(&self) -> Result<usize> {
        self.store.len(&self.namespace).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl fmt::Debug for VectorIndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndexHandle")
            .field("namespace", &self.namespace)
            .field("dimensions", &self.dimensions)
            .field("backend", &self.store.backend())
            .finish()
    }
}

/// What happened to one successfully ingested document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub source_ref: String,
    pub chunk_count: usize,
    pub stats: UpsertStats,
}

/// A document that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionFailure {
    pub source_ref: String,
    pub message: String,
}

/// The outcome of one [`IngestionPipeline::ingest`] run.
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub handle: VectorIndexHandle,
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<IngestionFailure>,
}

impl IngestionReport {
    /// Some documents were ingested and some failed.
    pub fn is_partial(&self) -> bool {
        !self.documents.is_empty() && !self.failures.is_empty()
    }

    /// Every document in the batch failed.
    pub fn is_complete_failure(&self) -> bool {
        self.documents.is_empty() && !self.failures.is_empty()
    }

    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|doc| doc.chunk_count).sum()
    }

    pub fn stats(&self) -> UpsertStats {
        let mut total = UpsertStats::default();
        for doc in &self.documents {
            total += doc.stats;
        }
        total
    }
}

/// The ingestion pipeline.
///
/// Documents in a batch are processed in order. A document that cannot be
/// read, chunked or embedded is recorded in
/// [`IngestionReport::failures`] and the rest of the batch continues.
/// Configuration errors (such as an embedder whose dimension disagrees with
/// the namespace) abort the run.
///
/// Runs targeting the same namespace are serialized; runs targeting
/// different namespaces proceed in parallel.
pub struct IngestionPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    extractor: Arc<dyn TextExtractor>,
    write_locks: Mutex<HashMap<Namespace, Arc<Mutex<()>>>>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    async fn write_lock(&self, namespace: &Namespace) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks.entry(namespace.clone()).or_default().clone()
    }

    /// Forget the namespace's lock once no other run holds or awaits it.
    /// Clones are only handed out under the map lock, so the count is stable
    /// while it is held.
    async fn release_write_lock(&self, namespace: &Namespace, lock: Arc<Mutex<()>>) {
        let mut locks = self.write_locks.lock().await;
        drop(lock);
        if locks.get(namespace).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(namespace);
        }
    }

    /// Ingest a batch of documents into `namespace` (or the default namespace).
    ///
    /// Re-ingesting chunks that already exist is resolved by the configured
    /// [`ConflictPolicy`](crate::ConflictPolicy); either way the chunk count
    /// does not grow.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] or [`RagError::ConfigError`] if
    /// the embedder and the namespace disagree, and
    /// [`RagError::VectorStoreError`] if the namespace cannot be opened.
    /// Per-document failures are reported, not returned.
    pub async fn ingest(
        &self,
        documents: &[Document],
        namespace: Option<&Namespace>,
    ) -> Result<IngestionReport> {
        let namespace = namespace.cloned().unwrap_or_default();
        let lock = self.write_lock(&namespace).await;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(documents, namespace.clone()).await
        };
        self.release_write_lock(&namespace, lock).await;
        result
    }

    async fn ingest_locked(
        &self,
        documents: &[Document],
        namespace: Namespace,
    ) -> Result<IngestionReport> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.open_namespace(&namespace, dimensions).await.map_err(|e| {
            error!(namespace = %namespace, error = %e, "failed to open namespace");
            e
        })?;

        let mut reports = Vec::with_capacity(documents.len());
        let mut failures = Vec::new();
        for document in documents {
            match self.ingest_document(&namespace, dimensions, document).await {
                Ok(report) => reports.push(report),
                Err(e) if e.is_configuration() => {
                    error!(
                        namespace = %namespace,
                        source_ref = %document.source_ref,
                        error = %e,
                        "ingestion aborted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        namespace = %namespace,
                        source_ref = %document.source_ref,
                        error = %e,
                        "document skipped"
                    );
                    failures.push(IngestionFailure {
                        source_ref: document.source_ref.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let report = IngestionReport {
            handle: VectorIndexHandle::new(namespace, dimensions, self.vector_store.clone()),
            documents: reports,
            failures,
        };
        let stats = report.stats();
        info!(
            namespace = %report.handle.namespace(),
            documents = report.documents.len(),
            failed = report.failures.len(),
            inserted = stats.inserted,
            replaced = stats.replaced,
            skipped = stats.skipped,
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_document(
        &self,
        namespace: &Namespace,
        dimensions: usize,
        document: &Document,
    ) -> Result<DocumentReport> {
        let source_ref = document.source_ref.as_str();
        let text = self.extractor.extract(document)?;

        let chunks = self.chunker.chunk(source_ref, &text);
        if chunks.is_empty() {
            return Err(RagError::IngestionError {
                source_ref: source_ref.to_string(),
                message: "document produced no chunks".to_string(),
            });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            if e.is_configuration() {
                return e;
            }
            RagError::IngestionError {
                source_ref: source_ref.to_string(),
                message: format!("embedding failed: {e}"),
            }
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::IngestionError {
                source_ref: source_ref.to_string(),
                message: format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }
        for embedding in &embeddings {
            check_dimensions(dimensions, embedding)?;
        }

        let chunk_count = chunks.len();
        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();

        let stats = self
            .vector_store
            .upsert(namespace, embedded, self.config.conflict_policy)
            .await
            .map_err(|e| {
                if e.is_configuration() {
                    return e;
                }
                RagError::IngestionError {
                    source_ref: source_ref.to_string(),
                    message: format!("upsert failed: {e}"),
                }
            })?;

        debug!(namespace = %namespace, source_ref, chunk_count, "ingested document");
        Ok(DocumentReport { source_ref: source_ref.to_string(), chunk_count, stats })
    }

    /// Open a handle to an existing namespace.
    ///
    /// Returns `None` if nothing was ever ingested into it, which callers
    /// treat as "no documents uploaded".
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the namespace was built with
    /// a different embedder dimension.
    pub async fn open(&self, namespace: &Namespace) -> Result<Option<VectorIndexHandle>> {
        let Some(info) = self.vector_store.namespace_info(namespace).await? else {
            return Ok(None);
        };
        let dimensions = self.embedding_provider.dimensions();
        if info.dimensions != dimensions {
            return Err(RagError::DimensionMismatch { expected: info.dimensions, actual: dimensions });
        }
        Ok(Some(VectorIndexHandle::new(
            info.namespace,
            info.dimensions,
            self.vector_store.clone(),
        )))
    }

    /// Delete a namespace and everything ingested into it.
    pub async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        let lock = self.write_lock(namespace).await;
        let result = {
            let _guard = lock.lock().await;
            self.vector_store.delete_namespace(namespace).await.map_err(|e| {
                error!(namespace = %namespace, error = %e, "failed to delete namespace");
                e
            })
        };
        self.release_write_lock(namespace, lock).await;
        result
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `embedding_provider` and `vector_store` are required. The chunker defaults
/// to a [`RecursiveChunker`] sized from the config, and the extractor to
/// [`AutoExtractor`] (plain text and PDF).
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl IngestionPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Build the [`IngestionPipeline`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        if embedding_provider.dimensions() == 0 {
            return Err(RagError::ConfigError(
                "embedding provider reports zero dimensions".to_string(),
            ));
        }
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(AutoExtractor));

        Ok(IngestionPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            extractor,
            write_locks: Mutex::new(HashMap::new()),
        })
    }
}
