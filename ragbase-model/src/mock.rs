//! A scripted language model for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use ragbase_core::{Llm, LlmRequest, ModelError, Result, TextStream};
use tokio::sync::Mutex;

/// An [`Llm`] that replays a fixed list of tokens.
///
/// It records every request it receives and can be told to fail before the
/// first token, after a number of tokens, or to pause between tokens.
///
/// ```rust,ignore
/// let llm = MockLlm::from_text("Social control is regulation.").failing_after(2);
/// ```
#[derive(Debug, Clone)]
pub struct MockLlm {
    name: String,
    tokens: Vec<String>,
    fail_on_start: bool,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    batch_calls: Arc<AtomicUsize>,
    open_streams: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            fail_on_start: false,
            fail_after: None,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            batch_calls: Arc::new(AtomicUsize::new(0)),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Split `text` into word tokens, each carrying its trailing whitespace.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.split_inclusive(char::is_whitespace))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Refuse the request before any token is produced.
    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    /// Break the stream after `count` tokens have been delivered.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Sleep for `delay` before each token.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The full scripted answer.
    pub fn text(&self) -> String {
        self.tokens.concat()
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().await.last().cloned()
    }

    /// How many times the non-streaming [`Llm::generate`] was called.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    async fn start(&self, request: LlmRequest) -> Result<TextStream> {
        self.requests.lock().await.push(request);
        if self.fail_on_start {
            return Err(ModelError::Request {
                provider: self.name.clone(),
                message: "scripted failure".to_string(),
            });
        }

        let tokens = self.tokens.clone();
        let total = tokens.len();
        let fail_after = self.fail_after;
        let delay = self.delay;
        let provider = self.name.clone();
        let guard = OpenStream::new(self.open_streams.clone());

        let stream = try_stream! {
            let _guard = guard;
            let broken = || ModelError::Stream {
                provider: provider.clone(),
                message: "scripted stream failure".to_string(),
            };
            for (index, token) in tokens.into_iter().enumerate() {
                if fail_after == Some(index) {
                    Err::<(), _>(broken())?;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield token;
            }
            if fail_after.is_some_and(|count| count >= total) {
                Err::<(), _>(broken())?;
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Counts a stream as open until it is dropped.
struct OpenStream(Arc<AtomicUsize>);

impl OpenStream {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<TextStream> {
        self.start(request).await
    }

    async fn generate(&self, request: LlmRequest) -> Result<String> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut stream = self.start(request).await?;
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
    use ragbase_core::Message;

    fn request() -> LlmRequest {
        LlmRequest::new(vec![Message::user("hi")])
    }

    #[test]
    fn from_text_keeps_whitespace() {
        let llm = MockLlm::from_text("one two  three\n");
        assert_eq!(llm.tokens, vec!["one ", "two ", " ", "three\n"]);
        assert_eq!(llm.text(), "one two  three\n");
    }

    #[tokio::test]
    async fn replays_tokens_and_records_requests() {
        let llm = MockLlm::new(["a", "b", "c"]);
        let tokens: Vec<String> =
            llm.generate_stream(request()).await.unwrap().map(|t| t.unwrap()).collect().await;
        assert_eq!(tokens, vec!["a", "b", "c"]);
        assert_eq!(llm.requests().await.len(), 1);
        assert_eq!(llm.open_streams(), 0);
    }

    #[tokio::test]
    async fn fails_after_count() {
        let llm = MockLlm::new(["a", "b", "c"]).failing_after(2);
        let items: Vec<Result<String>> = llm.generate_stream(request()).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert_eq!(items[1].as_ref().unwrap(), "b");
        assert!(matches!(items[2], Err(ModelError::Stream { .. })));
    }

    #[tokio::test]
    async fn failing_on_start_rejects_request() {
        let llm = MockLlm::new(["a"]).failing_on_start();
        assert!(llm.generate_stream(request()).await.is_err());
        assert!(llm.generate(request()).await.is_err());
        assert_eq!(llm.batch_calls(), 1);
    }

    #[tokio::test]
    async fn dropping_a_stream_releases_it() {
        let llm = MockLlm::new(["a", "b"]);
        let mut stream = llm.generate_stream(request()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(llm.open_streams(), 1);
        drop(stream);
        assert_eq!(llm.open_streams(), 0);
    }
}
