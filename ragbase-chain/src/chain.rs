//! The conversational chain.
//!
//! [`ConversationalChain::stream_answer`] turns a question into a lazy stream
//! of [`StreamEvent`]s:
//!
//! ```text
//! START → RETRIEVING → CONTEXT_READY → GENERATING → DONE
//!   │          │              │              │
//!   └──────────┴──────────────┴──────────────┴──→ FAILED
//! ```
//!
//! The stream suspends only while waiting on retrieval and on each model
//! increment. Dropping it part way releases the model stream and leaves the
//! session history untouched.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use futures::{Stream, StreamExt};
use ragbase_core::{Llm, LlmRequest, Message, Role};
use ragbase_rag::{RetrievalResult, Retriever, VectorIndexHandle, format_context};
use ragbase_session::HistoryStore;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{ChainConfig, EmptyContextPolicy};
use crate::error::{ChainError, Result};
use crate::event::StreamEvent;
use crate::prompt::{NOT_FOUND_ANSWER, context_free_messages, grounded_messages};
use crate::state::{ChainState, StateTracker};

type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The answer to one question, as it is produced.
///
/// An `Err` item is terminal: the stream ends right after it.
pub struct AnswerStream {
    inner: EventStream,
    state: watch::Receiver<ChainState>,
}

impl AnswerStream {
    /// The state the chain has reached so far.
    pub fn state(&self) -> ChainState {
        *self.state.borrow()
    }
}

impl Stream for AnswerStream {
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A drained [`AnswerStream`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedAnswer {
    /// `None` when the answer was generated without an index.
    pub sources: Option<RetrievalResult>,
    pub answer: String,
}

/// Read an answer stream to the end.
///
/// # Errors
///
/// Returns the stream's terminal error, discarding any partial answer.
pub async fn collect_answer(mut stream: AnswerStream) -> Result<CollectedAnswer> {
    let mut sources = None;
    let mut answer = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Sources(result) => sources = Some(result),
            StreamEvent::Token(text) => answer.push_str(&text),
        }
    }
    Ok(CollectedAnswer { sources, answer })
}

/// Answers questions from retrieved context, one session at a time.
///
/// Construct one via [`ConversationalChain::builder()`]. The chain is cheap
/// to share behind an `Arc`; every answer stream owns what it needs.
pub struct ConversationalChain {
    llm: Arc<dyn Llm>,
    retriever: Retriever,
    history: Arc<dyn HistoryStore>,
    config: ChainConfig,
}

impl ConversationalChain {
    pub fn builder() -> ConversationalChainBuilder {
        ConversationalChainBuilder::default()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Record `question` as the user's turn, then answer it.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Session`] if the question cannot be appended,
    /// for example when the conversation limit is reached.
    pub async fn ask(
        &self,
        question: &str,
        session_id: &str,
        index: Option<&VectorIndexHandle>,
    ) -> Result<AnswerStream> {
        self.history.append(session_id, Role::User, question.to_string()).await.map_err(|e| {
            error!(session_id, error = %e, "failed to record question");
            ChainError::from(e)
        })?;
        Ok(self.stream_answer(question, session_id, index))
    }

    /// Answer `question` in the context of `session_id`.
    ///
    /// With an index, emits one [`StreamEvent::Sources`] and then the answer
    /// tokens. Without one, skips retrieval and the system prompt and answers
    /// from the question and history alone. On normal completion the full
    /// answer is appended to the session as one assistant message; on
    /// failure or cancellation nothing is appended.
    ///
    /// The caller is expected to have appended the question to the session
    /// already (see [`ask`](Self::ask)).
    pub fn stream_answer(
        &self,
        question: &str,
        session_id: &str,
        index: Option<&VectorIndexHandle>,
    ) -> AnswerStream {
        let (tracker, state) = StateTracker::new(session_id.to_string());
        let run = AnswerRun {
            llm: self.llm.clone(),
            retriever: self.retriever.clone(),
            history: self.history.clone(),
            config: self.config.clone(),
            question: question.to_string(),
            session_id: session_id.to_string(),
            index: index.cloned(),
            tracker,
        };
        AnswerStream { inner: run.into_stream(), state }
    }
}

/// Everything one answer needs, owned so the stream is `'static`.
struct AnswerRun {
    llm: Arc<dyn Llm>,
    retriever: Retriever,
    history: Arc<dyn HistoryStore>,
    config: ChainConfig,
    question: String,
    session_id: String,
    index: Option<VectorIndexHandle>,
    tracker: StateTracker,
}

enum Plan {
    Stream(Vec<Message>),
    Batch(Vec<Message>),
    Fixed(&'static str),
}

impl AnswerRun {
    fn fail(&self, err: ChainError) -> ChainError {
        error!(
            session_id = %self.session_id,
            state = %self.tracker.current(),
            error = %err,
            "answer failed"
        );
        self.tracker.to(ChainState::Failed);
        err
    }

    fn request(&self, messages: Vec<Message>) -> LlmRequest {
        let request = LlmRequest::new(messages);
        match &self.config.generation {
            Some(generation) => request.with_config(generation.clone()),
            None => request,
        }
    }

    fn into_stream(self) -> EventStream {
        Box::pin(stream! {
            let run = self;
            info!(
                session_id = %run.session_id,
                namespace = run.index.as_ref().map(|i| i.namespace().as_str()),
                "answering question"
            );

            let mut context = None;
            if let Some(index) = &run.index {
                run.tracker.to(ChainState::Retrieving);
                let k = run.config.top_k.unwrap_or(run.retriever.config().top_k);
                match run.retriever.retrieve(&run.question, index, k).await {
                    Ok(result) => {
                        let formatted = format_context(&result);
                        let empty = result.is_empty();
                        yield Ok(StreamEvent::Sources(result));
                        run.tracker.to(ChainState::ContextReady);
                        context = Some((formatted, empty));
                    }
                    Err(e) => {
                        yield Err(run.fail(e.into()));
                        return;
                    }
                }
            }

            let history = match run.history.get_history(&run.session_id).await {
                Ok(history) => history,
                Err(e) => {
                    yield Err(run.fail(e.into()));
                    return;
                }
            };

            let plan = match context {
                None => Plan::Batch(context_free_messages(&history, &run.question)),
                Some((_, true)) if run.config.empty_context == EmptyContextPolicy::NotFound => {
                    Plan::Fixed(NOT_FOUND_ANSWER)
                }
                Some((_, true)) if run.config.empty_context == EmptyContextPolicy::ContextFree => {
                    Plan::Batch(context_free_messages(&history, &run.question))
                }
                Some((formatted, _)) => Plan::Stream(grounded_messages(
                    &run.config.system_prompt,
                    &formatted,
                    &history,
                    &run.question,
                )),
            };

            run.tracker.to(ChainState::Generating);
            let mut answer = String::new();
            match plan {
                Plan::Fixed(text) => {
                    answer.push_str(text);
                    yield Ok(StreamEvent::Token(text.to_string()));
                }
                Plan::Batch(messages) => {
                    let text = match run.llm.generate(run.request(messages)).await {
                        Ok(text) => text,
                        Err(e) => {
                            yield Err(run.fail(e.into()));
                            return;
                        }
                    };
                    for word in text.split_inclusive(char::is_whitespace) {
                        answer.push_str(word);
                        yield Ok(StreamEvent::Token(word.to_string()));
                    }
                }
                Plan::Stream(messages) => {
                    let mut tokens = match run.llm.generate_stream(run.request(messages)).await {
                        Ok(tokens) => tokens,
                        Err(e) => {
                            yield Err(run.fail(e.into()));
                            return;
                        }
                    };
                    while let Some(piece) = tokens.next().await {
                        match piece {
                            Ok(text) if text.is_empty() => {}
                            Ok(text) => {
                                answer.push_str(&text);
                                yield Ok(StreamEvent::Token(text));
                            }
                            Err(e) => {
                                yield Err(run.fail(e.into()));
                                return;
                            }
                        }
                    }
                }
            }

            let answer_len = answer.len();
            if let Err(e) = run.history.append(&run.session_id, Role::Assistant, answer).await {
                yield Err(run.fail(e.into()));
                return;
            }
            run.tracker.to(ChainState::Done);
            info!(session_id = %run.session_id, answer_len, "answer complete");
        })
    }
}

/// Builder for a [`ConversationalChain`].
///
/// `llm`, `retriever` and `history` are required.
#[derive(Default)]
pub struct ConversationalChainBuilder {
    llm: Option<Arc<dyn Llm>>,
    retriever: Option<Retriever>,
    history: Option<Arc<dyn HistoryStore>>,
    config: Option<ChainConfig>,
}

impl ConversationalChainBuilder {
    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Returns [`ChainError::Configuration`] if a required part is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<ConversationalChain> {
        let missing = |name: &str| ChainError::Configuration(format!("{name} is required"));
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(ConversationalChain {
            llm: self.llm.ok_or_else(|| missing("llm"))?,
            retriever: self.retriever.ok_or_else(|| missing("retriever"))?,
            history: self.history.ok_or_else(|| missing("history"))?,
            config,
        })
    }
}
