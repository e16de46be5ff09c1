//! Ollama embedding provider using the local `/api/embed` endpoint.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default Ollama server address.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// The default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// The dimensionality of `nomic-embed-text`.
pub const DEFAULT_EMBED_DIMENSIONS: usize = 768;

const PROVIDER: &str = "Ollama";

/// Settings for [`OllamaEmbeddingProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// The vector length the model produces. Checked against every response.
    pub dimensions: usize,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            dimensions: DEFAULT_EMBED_DIMENSIONS,
        }
    }
}

impl OllamaEmbeddingConfig {
    /// Read `OLLAMA_HOST` and `OLLAMA_EMBED_MODEL`, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.base_url = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_EMBED_MODEL") {
            config.model = model;
        }
        config
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use ragbase_rag::ollama::{OllamaEmbeddingConfig, OllamaEmbeddingProvider};
///
/// let provider = OllamaEmbeddingProvider::new(OllamaEmbeddingConfig::from_env())?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    config: OllamaEmbeddingConfig,
}

impl OllamaEmbeddingProvider {
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the model name is empty or the
    /// dimension is zero.
    pub fn new(config: OllamaEmbeddingConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(RagError::ConfigError("Ollama embedding model must not be empty".into()));
        }
        if config.dimensions == 0 {
            return Err(RagError::ConfigError("Ollama embedding dimensions must be > 0".into()));
        }
        Ok(Self { client: reqwest::Client::new(), config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "server returned no embeddings".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.config.model, "embedding batch");

        let request_body = EmbedRequest { model: &self.config.model, input: texts.to_vec() };
        let response =
            self.client.post(self.endpoint()).json(&request_body).send().await.map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: PROVIDER.into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("server returned {status}: {detail}"),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        for embedding in &parsed.embeddings {
            if embedding.len() != self.config.dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: embedding.len(),
                });
            }
        }
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}
