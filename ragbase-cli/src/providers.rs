//! Builds the embedder, model, store and pipeline from command-line flags.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ragbase_core::Llm;
use ragbase_model::{OllamaClient, OllamaConfig};
use ragbase_rag::ollama::{OllamaEmbeddingConfig, OllamaEmbeddingProvider};
use ragbase_rag::{
    EmbeddingProvider, FileVectorStore, HashingEmbeddingProvider, IngestionPipeline, RagConfig,
};
use tracing::info;

use crate::cli::{EmbedderKind, ModelArgs};

/// Embedding length used by the hashing embedder unless overridden.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

pub fn embedder(args: &ModelArgs) -> Result<Arc<dyn EmbeddingProvider>> {
    match args.embedder {
        EmbedderKind::Hashing => {
            let dimensions = args.dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS);
            Ok(Arc::new(HashingEmbeddingProvider::new(dimensions)))
        }
        EmbedderKind::Ollama => {
            let mut config = OllamaEmbeddingConfig::from_env();
            if let Some(model) = &args.embed_model {
                config.model = model.clone();
            }
            if let Some(dimensions) = args.dimensions {
                config = config.with_dimensions(dimensions);
            }
            info!(model = %config.model, base_url = %config.base_url, "using Ollama embeddings");
            Ok(Arc::new(OllamaEmbeddingProvider::new(config)?))
        }
    }
}

pub fn llm(args: &ModelArgs) -> Result<Arc<dyn Llm>> {
    let mut config = OllamaConfig::from_env();
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }
    info!(model = %config.model, base_url = %config.base_url, "using Ollama chat model");
    Ok(Arc::new(OllamaClient::new(config)?))
}

pub async fn pipeline(
    store_dir: &Path,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RagConfig,
) -> Result<IngestionPipeline> {
    let store = FileVectorStore::open(store_dir)
        .await
        .with_context(|| format!("cannot open index at {}", store_dir.display()))?;
    let pipeline = IngestionPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(Arc::new(store))
        .build()?;
    Ok(pipeline)
}
