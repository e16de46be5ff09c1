//! Ollama client implementation.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use ragbase_core::{Llm, LlmRequest, ModelError, Result, TextStream};
use tracing::{debug, error};

use super::config::OllamaConfig;
use super::convert::{self, ChatChunk, LineBuffer};

const PROVIDER: &str = "Ollama";

fn request_error(message: String) -> ModelError {
    ModelError::Request { provider: PROVIDER.to_string(), message }
}

fn stream_error(message: String) -> ModelError {
    ModelError::Stream { provider: PROVIDER.to_string(), message }
}

/// Decode one NDJSON line into the text it carries and whether it is the last.
fn decode_line(line: &[u8]) -> Result<(Option<String>, bool)> {
    let chunk: ChatChunk = serde_json::from_slice(line)
        .map_err(|e| stream_error(format!("invalid stream line: {e}")))?;
    if let Some(message) = chunk.error {
        return Err(stream_error(message));
    }
    let text = chunk.message.map(|m| m.content).filter(|content| !content.is_empty());
    Ok((text, chunk.done))
}

/// Ollama client for a local or remote Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if no model name is configured.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(ModelError::Config("Ollama model name must not be empty".to_string()));
        }
        Ok(Self { client: reqwest::Client::new(), config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn send(&self, request: &LlmRequest, stream: bool) -> Result<reqwest::Response> {
        let body = convert::chat_request(&self.config.model, request, self.config.temperature, stream);
        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            message_count = body.messages.len(),
            stream,
            "sending chat request"
        );

        let response =
            self.client.post(self.config.chat_url()).json(&body).send().await.map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                request_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(request_error(format!("server returned {status}: {detail}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl Llm for OllamaClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream> {
        let response = self.send(&request, true).await?;

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut done = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| {
                    error!(provider = PROVIDER, error = %e, "stream interrupted");
                    stream_error(format!("stream interrupted: {e}"))
                })?;
                for line in lines.push(&chunk) {
                    let (text, finished) = decode_line(&line)?;
                    if let Some(text) = text {
                        yield text;
                    }
                    done |= finished;
                }
                if done {
                    break;
                }
            }

            if !done {
                if let Some(line) = lines.finish() {
                    let (text, finished) = decode_line(&line)?;
                    if let Some(text) = text {
                        yield text;
                    }
                    done = finished;
                }
            }
            if !done {
                Err::<(), _>(stream_error("stream ended before the model finished".to_string()))?;
            }
        };

        Ok(Box::pin(stream))
    }

    async fn generate(&self, request: LlmRequest) -> Result<String> {
        let response = self.send(&request, false).await?;
        let chunk: ChatChunk = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            request_error(format!("failed to parse response: {e}"))
        })?;
        if let Some(message) = chunk.error {
            return Err(request_error(message));
        }
        Ok(chunk.message.map(|m| m.content).unwrap_or_default())
    }
}
