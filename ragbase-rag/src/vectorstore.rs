//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConflictPolicy;
use crate::document::{EmbeddedChunk, SearchResult};
use crate::error::Result;
use crate::namespace::Namespace;

/// What a namespace currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub namespace: Namespace,
    /// The embedding dimension fixed when the namespace was created.
    pub dimensions: usize,
    pub chunk_count: usize,
}

/// The outcome of one [`VectorStore::upsert`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub inserted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for UpsertStats {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.replaced += rhs.replaced;
        self.skipped += rhs.skipped;
    }
}

/// A storage backend for chunk embeddings with similarity search.
///
/// Stores manage isolated [`Namespace`]s. Each namespace is created on first
/// [`open_namespace`](VectorStore::open_namespace) with a fixed embedding
/// dimension; every later write or query must use that dimension.
///
/// Implementations must make each `upsert` atomic with respect to other
/// writers of the same namespace, and allow concurrent `search` calls.
///
/// # Example
///
/// ```rust,ignore
/// use ragbase_rag::{ConflictPolicy, InMemoryVectorStore, Namespace, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let ns = Namespace::new("docs")?;
/// store.open_namespace(&ns, 384).await?;
/// store.upsert(&ns, chunks, ConflictPolicy::Skip).await?;
/// let results = store.search(&ns, &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name, used in logs and errors.
    fn backend(&self) -> &str;

    /// Create the namespace if needed and return its current state.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if the namespace exists with a different dimension.
    async fn open_namespace(&self, namespace: &Namespace, dimensions: usize)
    -> Result<NamespaceInfo>;

    /// Describe a namespace, or `None` if nothing was ever written to it.
    async fn namespace_info(&self, namespace: &Namespace) -> Result<Option<NamespaceInfo>>;

    /// Write chunks into an opened namespace, resolving identity conflicts by `policy`.
    async fn upsert(
        &self,
        namespace: &Namespace,
        chunks: Vec<EmbeddedChunk>,
        policy: ConflictPolicy,
    ) -> Result<UpsertStats>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score, ties broken by
    /// `(source_ref, ordinal)`. A namespace that does not exist yields no results.
    async fn search(
        &self,
        namespace: &Namespace,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Delete a namespace and all its data. No-op if it does not exist.
    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Number of chunks stored in a namespace; zero if it does not exist.
    async fn len(&self, namespace: &Namespace) -> Result<usize> {
        Ok(self.namespace_info(namespace).await?.map_or(0, |info| info.chunk_count))
    }
}
