//! Data types for documents, chunks, and search results.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A source document: raw bytes plus the name it was uploaded under.
///
/// Documents are consumed by ingestion and not retained afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable path or name identifying the source.
    pub source_ref: String,
    /// The raw uploaded bytes.
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(source_ref: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { source_ref: source_ref.into(), bytes: bytes.into() }
    }

    /// Build a document from text already in memory.
    pub fn from_text(source_ref: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source_ref, text.into().into_bytes())
    }

    /// Read a document persisted by the upload collaborator.
    ///
    /// The path, as given, becomes the `source_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestionError`] naming the path if it cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source_ref = path.display().to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| RagError::IngestionError {
            source_ref: source_ref.clone(),
            message: format!("failed to read file: {e}"),
        })?;
        Ok(Self { source_ref, bytes })
    }
}

/// The identity of a chunk inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub source_ref: String,
    pub ordinal: usize,
}

/// A bounded contiguous slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// Position within the source, starting at 0.
    pub ordinal: usize,
    /// The document this chunk was cut from.
    pub source_ref: String,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        ChunkId { source_ref: self.source_ref.clone(), ordinal: self.ordinal }
    }
}

/// A [`Chunk`] with its vector embedding attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Ranking used everywhere results are ordered: score descending, then
/// `source_ref` and `ordinal` ascending so ties are deterministic.
pub(crate) fn rank_order(a: &SearchResult, b: &SearchResult) -> std::cmp::Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.source_ref.cmp(&b.chunk.source_ref))
        .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
}

/// Retrieved chunks, most relevant first, with no repeated chunk identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// Rank `hits` and drop repeated chunk identities, keeping the best-scored copy.
    pub fn from_hits(mut hits: Vec<SearchResult>) -> Self {
        hits.sort_by(rank_order);
        let mut seen = std::collections::HashSet::new();
        hits.retain(|hit| seen.insert(hit.chunk.id()));
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> &[SearchResult] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<SearchResult> {
        self.hits
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, ordinal: usize, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk { text: format!("{source}-{ordinal}"), ordinal, source_ref: source.into() },
            score,
        }
    }

    #[test]
    fn from_hits_orders_by_score_then_identity() {
        let result = RetrievalResult::from_hits(vec![
            hit("b.txt", 0, 0.5),
            hit("a.txt", 1, 0.5),
            hit("a.txt", 0, 0.5),
            hit("c.txt", 3, 0.9),
        ]);
        let order: Vec<_> =
            result.chunks().map(|c| (c.source_ref.as_str(), c.ordinal)).collect();
        assert_eq!(order, vec![("c.txt", 3), ("a.txt", 0), ("a.txt", 1), ("b.txt", 0)]);
    }

    #[test]
    fn from_hits_drops_duplicates_keeping_best_score() {
        let result =
            RetrievalResult::from_hits(vec![hit("a.txt", 0, 0.2), hit("a.txt", 0, 0.8)]);
        assert_eq!(result.len(), 1);
        assert!((result.hits()[0].score - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn from_path_names_missing_file() {
        let err = Document::from_path("/definitely/not/here.txt").await.unwrap_err();
        match err {
            RagError::IngestionError { source_ref, .. } => {
                assert_eq!(source_ref, "/definitely/not/here.txt")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
