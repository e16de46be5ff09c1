//! Wire types for the Ollama chat API and NDJSON framing.

use ragbase_core::{GenerationConfig, LlmRequest, Message};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub(crate) struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// One line of a streamed (or the whole of a non-streamed) chat response.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

fn to_chat_message(message: &Message) -> ChatMessage {
    ChatMessage { role: message.role.as_str().to_string(), content: message.content.clone() }
}

fn to_options(config: Option<&GenerationConfig>, temperature: Option<f32>) -> Option<Options> {
    let options = Options {
        temperature: config.and_then(|c| c.temperature).or(temperature),
        top_p: config.and_then(|c| c.top_p),
        num_predict: config.and_then(|c| c.max_output_tokens),
    };
    (options != Options::default()).then_some(options)
}

pub(crate) fn chat_request<'a>(
    model: &'a str,
    request: &LlmRequest,
    temperature: Option<f32>,
    stream: bool,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: request.messages.iter().map(to_chat_message).collect(),
        stream,
        options: to_options(request.config.as_ref(), temperature),
    }
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line they complete, without newlines.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
        }
        lines
    }

    /// Whatever is left once the byte stream ends.
    pub fn finish(self) -> Option<Vec<u8>> {
        (!self.pending.iter().all(u8::is_ascii_whitespace)).then_some(self.pending)
    }
}
