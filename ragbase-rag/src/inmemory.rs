//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and single-process deployments. The
//! [`Collection`] type holding one namespace is shared with the file-backed
//! store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::ConflictPolicy;
use crate::document::{ChunkId, EmbeddedChunk, SearchResult, rank_order};
use crate::embedding::check_dimensions;
use crate::error::Result;
use crate::namespace::Namespace;
use crate::vectorstore::{NamespaceInfo, UpsertStats, VectorStore};

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// The chunks of one namespace, keyed by chunk identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Collection {
    pub(crate) dimensions: usize,
    #[serde(with = "chunk_list")]
    pub(crate) chunks: BTreeMap<ChunkId, EmbeddedChunk>,
}

impl Collection {
    pub(crate) fn new(dimensions: usize) -> Self {
        Self { dimensions, chunks: BTreeMap::new() }
    }

    pub(crate) fn info(&self, namespace: &Namespace) -> NamespaceInfo {
        NamespaceInfo {
            namespace: namespace.clone(),
            dimensions: self.dimensions,
            chunk_count: self.chunks.len(),
        }
    }

    /// Validate every vector first so a bad batch leaves the collection untouched.
    pub(crate) fn upsert(
        &mut self,
        chunks: Vec<EmbeddedChunk>,
        policy: ConflictPolicy,
    ) -> Result<UpsertStats> {
        for chunk in &chunks {
            check_dimensions(self.dimensions, &chunk.embedding)?;
        }

        let mut stats = UpsertStats::default();
        for chunk in chunks {
            let id = chunk.chunk.id();
            match (self.chunks.contains_key(&id), policy) {
                (false, _) => {
                    self.chunks.insert(id, chunk);
                    stats.inserted += 1;
                }
                (true, ConflictPolicy::Skip) => stats.skipped += 1,
                (true, ConflictPolicy::Replace) => {
                    self.chunks.insert(id, chunk);
                    stats.replaced += 1;
                }
            }
        }
        Ok(stats)
    }

    pub(crate) fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        check_dimensions(self.dimensions, embedding)?;

        let mut scored: Vec<SearchResult> = self
            .chunks
            .values()
            .map(|stored| SearchResult {
                chunk: stored.chunk.clone(),
                score: cosine_similarity(&stored.embedding, embedding),
            })
            .collect();

        scored.sort_by(rank_order);
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Persist the chunk map as a plain list; identities are recomputed on load.
mod chunk_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::document::{ChunkId, EmbeddedChunk};

    pub fn serialize<S: Serializer>(
        chunks: &BTreeMap<ChunkId, EmbeddedChunk>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&EmbeddedChunk> = chunks.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ChunkId, EmbeddedChunk>, D::Error> {
        let list = Vec::<EmbeddedChunk>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|chunk| (chunk.chunk.id(), chunk)).collect())
    }
}

/// An in-memory vector store using cosine similarity for search.
///
/// Namespaces are stored as a map of namespace → [`Collection`]. All
/// operations are async-safe via `tokio::sync::RwLock`: searches share the
/// lock, and each upsert holds it exclusively for the whole batch.
///
/// # Example
///
/// ```rust,ignore
/// use ragbase_rag::{InMemoryVectorStore, Namespace, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.open_namespace(&Namespace::new("docs")?, 384).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<Namespace, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_opened(namespace: &Namespace) -> crate::error::RagError {
    crate::error::RagError::VectorStoreError {
        backend: "InMemory".to_string(),
        message: format!("namespace '{namespace}' has not been opened"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        "InMemory"
    }

    async fn open_namespace(
        &self,
        namespace: &Namespace,
        dimensions: usize,
    ) -> Result<NamespaceInfo> {
        let mut namespaces = self.namespaces.write().await;
        let collection =
            namespaces.entry(namespace.clone()).or_insert_with(|| Collection::new(dimensions));
        if collection.dimensions != dimensions {
            return Err(crate::error::RagError::DimensionMismatch {
                expected: collection.dimensions,
                actual: dimensions,
            });
        }
        Ok(collection.info(namespace))
    }

    async fn namespace_info(&self, namespace: &Namespace) -> Result<Option<NamespaceInfo>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).map(|collection| collection.info(namespace)))
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        chunks: Vec<EmbeddedChunk>,
        policy: ConflictPolicy,
    ) -> Result<UpsertStats> {
        let mut namespaces = self.namespaces.write().await;
        let collection = namespaces.get_mut(namespace).ok_or_else(|| not_opened(namespace))?;
        collection.upsert(chunks, policy)
    }

    async fn search(
        &self,
        namespace: &Namespace,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let namespaces = self.namespaces.read().await;
        match namespaces.get(namespace) {
            Some(collection) => collection.search(embedding, top_k),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.remove(namespace);
        Ok(())
    }
}
