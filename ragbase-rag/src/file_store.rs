//! A vector store persisted as one JSON snapshot per namespace.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<sanitized-namespace>_<12 hex of sha256(namespace)>/index.json
//! ```
//!
//! Snapshots are written to a temporary file and renamed into place, so a
//! crash mid-write leaves the previous snapshot intact. Namespaces are loaded
//! lazily on first access and then served from memory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::ConflictPolicy;
use crate::document::{EmbeddedChunk, SearchResult};
use crate::error::{RagError, Result};
use crate::inmemory::Collection;
use crate::namespace::Namespace;
use crate::vectorstore::{NamespaceInfo, UpsertStats, VectorStore};

const BACKEND: &str = "File";
const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_TMP: &str = "index.json.tmp";
const SNAPSHOT_VERSION: u32 = 1;
const MAX_DIR_PREFIX: usize = 48;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    namespace: Namespace,
    collection: Collection,
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> RagError {
    error!(path = %path.display(), error = %e, "file vector store {action} failed");
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("failed to {action} {}: {e}", path.display()),
    }
}

/// Map a namespace to a directory name that is filesystem-safe and collision-free.
pub fn storage_key(namespace: &Namespace) -> String {
    let sanitized: String = namespace
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_DIR_PREFIX)
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_str().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{sanitized}_{}", &hash[..12])
}

/// A [`VectorStore`] that survives process restarts.
///
/// All namespaces live under one root directory. Writes to a namespace are
/// serialized by the store; a failed write leaves both memory and disk at the
/// previous snapshot.
#[derive(Debug)]
pub struct FileVectorStore {
    root: PathBuf,
    loaded: RwLock<HashMap<Namespace, Collection>>,
}

impl FileVectorStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| io_error("create", &root, e))?;
        Ok(Self { root, loaded: RwLock::new(HashMap::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(storage_key(namespace))
    }

    async fn read_snapshot(&self, namespace: &Namespace) -> Result<Option<Collection>> {
        let path = self.namespace_dir(namespace).join(SNAPSHOT_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, e)),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = %path.display(), error = %e, "corrupt vector store snapshot");
            RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("corrupt snapshot {}: {e}", path.display()),
            }
        })?;
        if snapshot.namespace != *namespace {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "snapshot {} belongs to namespace '{}', not '{namespace}'",
                    path.display(),
                    snapshot.namespace
                ),
            });
        }
        debug!(
            namespace = %namespace,
            chunks = snapshot.collection.chunks.len(),
            "loaded vector store snapshot"
        );
        Ok(Some(snapshot.collection))
    }

    async fn write_snapshot(&self, namespace: &Namespace, collection: &Collection) -> Result<()> {
        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| io_error("create", &dir, e))?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            namespace: namespace.clone(),
            collection: collection.clone(),
        };
        let json = serde_json::to_vec(&snapshot).map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to serialize snapshot: {e}"),
        })?;

        let tmp = dir.join(SNAPSHOT_TMP);
        let path = dir.join(SNAPSHOT_FILE);
        tokio::fs::write(&tmp, json).await.map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| io_error("rename", &path, e))?;
        Ok(())
    }

    /// Make sure the namespace is in memory if it exists on disk.
    async fn ensure_loaded(&self, namespace: &Namespace) -> Result<bool> {
        if self.loaded.read().await.contains_key(namespace) {
            return Ok(true);
        }
        let mut loaded = self.loaded.write().await;
        if loaded.contains_key(namespace) {
            return Ok(true);
        }
        match self.read_snapshot(namespace).await? {
            Some(collection) => {
                loaded.insert(namespace.clone(), collection);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn open_namespace(
        &self,
        namespace: &Namespace,
        dimensions: usize,
    ) -> Result<NamespaceInfo> {
        self.ensure_loaded(namespace).await?;
        let mut loaded = self.loaded.write().await;
        if let Some(collection) = loaded.get(namespace) {
            if collection.dimensions != dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: collection.dimensions,
                    actual: dimensions,
                });
            }
            return Ok(collection.info(namespace));
        }
        let collection = Collection::new(dimensions);
        self.write_snapshot(namespace, &collection).await?;
        let info = collection.info(namespace);
        loaded.insert(namespace.clone(), collection);
        Ok(info)
    }

    async fn namespace_info(&self, namespace: &Namespace) -> Result<Option<NamespaceInfo>> {
        self.ensure_loaded(namespace).await?;
        let loaded = self.loaded.read().await;
        Ok(loaded.get(namespace).map(|collection| collection.info(namespace)))
    }

    async fn upsert(
        &self,
        namespace: &Namespace,
        chunks: Vec<EmbeddedChunk>,
        policy: ConflictPolicy,
    ) -> Result<UpsertStats> {
        self.ensure_loaded(namespace).await?;
        let mut loaded = self.loaded.write().await;
        let current = loaded.get(namespace).ok_or_else(|| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("namespace '{namespace}' has not been opened"),
        })?;

        let mut next = current.clone();
        let stats = next.upsert(chunks, policy)?;
        if stats.inserted > 0 || stats.replaced > 0 {
            self.write_snapshot(namespace, &next).await?;
            loaded.insert(namespace.clone(), next);
        }
        Ok(stats)
    }

    async fn search(
        &self,
        namespace: &Namespace,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if !self.ensure_loaded(namespace).await? {
            return Ok(Vec::new());
        }
        let loaded = self.loaded.read().await;
        match loaded.get(namespace) {
            Some(collection) => collection.search(embedding, top_k),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        let mut loaded = self.loaded.write().await;
        loaded.remove(namespace);
        let dir = self.namespace_dir(namespace);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &dir, e)),
        }
    }
}
