//! The language-model seam.
//!
//! Providers implement [`Llm`]. The conversational chain only ever talks to
//! this trait, so tests swap in a scripted model and production wires up a
//! real backend.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// An ordered stream of text increments produced by a model.
///
/// The stream ends when the model signals completion. An `Err` item is
/// terminal; consumers stop reading after it.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters passed through to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// A role-tagged message sequence to send to a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub config: Option<GenerationConfig>,
}

impl LlmRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, config: None }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// A language model that can generate text from a message sequence.
#[async_trait]
pub trait Llm: Send + Sync {
    /// The model name, used in logs.
    fn name(&self) -> &str;

    /// Start a streaming generation.
    ///
    /// Each item is the next increment of generated text, in generation order.
    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream>;

    /// Generate the full answer in one call.
    ///
    /// The default implementation drains [`generate_stream`](Llm::generate_stream).
    /// Backends with a native non-streaming endpoint should override it.
    async fn generate(&self, request: LlmRequest) -> Result<String> {
        let mut stream = self.generate_stream(request).await?;
        let mut text = String::new();
        while let Some(piece) = stream.next().await {
            text.push_str(&piece?);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    struct Fixed(Vec<Result<String>>);

    #[async_trait]
    impl Llm for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate_stream(&self, _request: LlmRequest) -> Result<TextStream> {
            let items: Vec<Result<String>> = self
                .0
                .iter()
                .map(|r| match r {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(ModelError::Config(e.to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn default_generate_concatenates_stream() {
        let llm = Fixed(vec![Ok("Hello".into()), Ok(", ".into()), Ok("world".into())]);
        let text = llm.generate(LlmRequest::default()).await.unwrap();
        assert_eq!(text, "Hello, world");
    }

    #[tokio::test]
    async fn default_generate_surfaces_stream_error() {
        let llm = Fixed(vec![Ok("partial".into()), Err(ModelError::Config("boom".into()))]);
        assert!(llm.generate(LlmRequest::default()).await.is_err());
    }
}
