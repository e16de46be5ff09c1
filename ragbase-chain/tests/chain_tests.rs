//! End-to-end behaviour of the conversational chain.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use proptest::prelude::*;
use ragbase_chain::{
    AnswerStream, ChainConfig, ChainError, ChainState, ConversationalChain, EmptyContextPolicy,
    NOT_FOUND_ANSWER, StreamEvent, collect_answer,
};
use ragbase_core::{Message, Role};
use ragbase_model::MockLlm;
use ragbase_rag::{
    Document, HashingEmbeddingProvider, InMemoryVectorStore, IngestionPipeline, Namespace,
    RagConfig, Retriever, VectorIndexHandle, VectorStore,
};
use ragbase_session::{HistoryStore, HistoryStoreConfig, InMemoryHistoryStore};

const DIMS: usize = 256;
const SENTENCE: &str = "Social control is regulation of behavior by groups.";

struct Fixture {
    chain: ConversationalChain,
    llm: MockLlm,
    history: Arc<InMemoryHistoryStore>,
    index: VectorIndexHandle,
}

async fn index_of(docs: &[(&str, &str)]) -> VectorIndexHandle {
    let pipeline = IngestionPipeline::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(DIMS)))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap();
    let documents: Vec<Document> =
        docs.iter().map(|(name, text)| Document::from_text(*name, *text)).collect();
    let report = pipeline.ingest(&documents, Some(&Namespace::for_user("tester"))).await.unwrap();
    report.handle
}

fn chain_with(
    llm: &MockLlm,
    history: Arc<InMemoryHistoryStore>,
    config: ChainConfig,
) -> ConversationalChain {
    ConversationalChain::builder()
        .llm(Arc::new(llm.clone()))
        .retriever(Retriever::new(
            Arc::new(HashingEmbeddingProvider::new(DIMS)),
            RagConfig::default(),
        ))
        .history(history)
        .config(config)
        .build()
        .unwrap()
}

async fn fixture(docs: &[(&str, &str)], llm: MockLlm, config: ChainConfig) -> Fixture {
    let history = Arc::new(InMemoryHistoryStore::new());
    Fixture {
        chain: chain_with(&llm, history.clone(), config),
        llm,
        history,
        index: index_of(docs).await,
    }
}

async fn drain(stream: AnswerStream) -> (Vec<Result<StreamEvent, ChainError>>, ChainState) {
    let mut stream = stream;
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    (events, stream.state())
}

fn tokens(events: &[Result<StreamEvent, ChainError>]) -> String {
    events.iter().filter_map(|e| e.as_ref().ok()?.as_token()).collect()
}

#[tokio::test]
async fn answers_from_the_relevant_document() {
    let f = fixture(
        &[
            ("sociology.txt", SENTENCE),
            ("plants.txt", "Photosynthesis converts light energy into chemical energy in plants."),
            ("markets.txt", "The stock market fluctuates with investor sentiment."),
        ],
        MockLlm::from_text(SENTENCE),
        ChainConfig::default(),
    )
    .await;

    let stream = f.chain.ask("What is social control?", "s1", Some(&f.index)).await.unwrap();
    let (events, state) = drain(stream).await;
    assert_eq!(state, ChainState::Done);

    let Ok(StreamEvent::Sources(sources)) = &events[0] else {
        panic!("first event must be sources, got {:?}", events[0]);
    };
    assert_eq!(sources.hits()[0].chunk.text, SENTENCE);
    assert!(events[1..].iter().all(|e| matches!(e, Ok(StreamEvent::Token(_)))));

    let answer = tokens(&events);
    assert_eq!(answer, SENTENCE);
    assert!(answer.matches('.').count() <= 3);
    let doc_words: Vec<_> = SENTENCE.split_whitespace().collect();
    assert!(answer.split_whitespace().all(|w| doc_words.contains(&w)));

    let request = f.llm.last_request().await.unwrap();
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains(&format!("Context: {SENTENCE}\n----")));
    assert_eq!(request.messages.last(), Some(&Message::user("What is social control?")));
    assert_eq!(request.messages.len(), 2);

    assert_eq!(
        f.history.get_history("s1").await.unwrap(),
        vec![Message::user("What is social control?"), Message::assistant(SENTENCE)]
    );
}

#[tokio::test]
async fn sources_precede_every_token() {
    let f = fixture(&[("a.txt", SENTENCE)], MockLlm::new(["x", "y", "z"]), ChainConfig::default())
        .await;
    let (events, _) = drain(f.chain.stream_answer("social", "s", Some(&f.index))).await;
    let kinds: Vec<_> = events.iter().map(|e| e.as_ref().unwrap().event_name()).collect();
    assert_eq!(kinds, vec!["sources", "token", "token", "token"]);
}

#[tokio::test]
async fn history_is_replayed_in_order() {
    let f = fixture(&[("a.txt", SENTENCE)], MockLlm::new(["ok"]), ChainConfig::default()).await;
    collect_answer(f.chain.ask("first?", "s", Some(&f.index)).await.unwrap()).await.unwrap();
    collect_answer(f.chain.ask("second?", "s", Some(&f.index)).await.unwrap()).await.unwrap();

    let request = f.llm.last_request().await.unwrap();
    let turns: Vec<_> = request.messages[1..].to_vec();
    assert_eq!(
        turns,
        vec![Message::user("first?"), Message::assistant("ok"), Message::user("second?")]
    );
    assert_eq!(f.history.get_history("s").await.unwrap().len(), 4);
}

#[tokio::test]
async fn empty_index_grounded_still_asks_the_model() {
    let f = fixture(&[], MockLlm::from_text(NOT_FOUND_ANSWER), ChainConfig::default()).await;
    let (events, state) = drain(f.chain.stream_answer("What is X?", "s", Some(&f.index))).await;

    assert_eq!(state, ChainState::Done);
    assert!(matches!(&events[0], Ok(StreamEvent::Sources(s)) if s.is_empty()));
    assert_eq!(tokens(&events), NOT_FOUND_ANSWER);
    assert_eq!(f.llm.requests().await.len(), 1);
}

#[tokio::test]
async fn empty_index_not_found_skips_the_model() {
    let config = ChainConfig::default().with_empty_context(EmptyContextPolicy::NotFound);
    let f = fixture(&[], MockLlm::new(["never"]), config).await;
    let (events, state) = drain(f.chain.stream_answer("What is X?", "s", Some(&f.index))).await;

    assert_eq!(state, ChainState::Done);
    assert!(events.iter().all(Result::is_ok));
    assert_eq!(tokens(&events), NOT_FOUND_ANSWER);
    assert!(f.llm.requests().await.is_empty());
    assert_eq!(
        f.history.get_history("s").await.unwrap(),
        vec![Message::assistant(NOT_FOUND_ANSWER)]
    );
}

#[tokio::test]
async fn empty_index_context_free_uses_batch_generation() {
    let config = ChainConfig::default().with_empty_context(EmptyContextPolicy::ContextFree);
    let f = fixture(&[], MockLlm::from_text("X is a letter."), config).await;
    let (events, state) = drain(f.chain.stream_answer("What is X?", "s", Some(&f.index))).await;

    assert_eq!(state, ChainState::Done);
    assert_eq!(tokens(&events), "X is a letter.");
    assert_eq!(f.llm.batch_calls(), 1);
    let request = f.llm.last_request().await.unwrap();
    assert!(request.messages.iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn no_index_degrades_to_direct_generation() {
    let llm = MockLlm::from_text("Hello there,  friend.\n");
    let history = Arc::new(InMemoryHistoryStore::new());
    let chain = chain_with(&llm, history.clone(), ChainConfig::default());

    let (events, state) = drain(chain.ask("hi", "s", None).await.unwrap()).await;

    assert_eq!(state, ChainState::Done);
    assert!(events.iter().all(|e| matches!(e, Ok(StreamEvent::Token(_)))));
    assert_eq!(tokens(&events), "Hello there,  friend.\n");
    assert_eq!(events.len(), 4);
    assert_eq!(llm.batch_calls(), 1);
    assert_eq!(llm.last_request().await.unwrap().messages, vec![Message::user("hi")]);
    assert_eq!(
        history.get_history("s").await.unwrap(),
        vec![Message::user("hi"), Message::assistant("Hello there,  friend.\n")]
    );
}

#[tokio::test]
async fn generation_failure_keeps_tokens_but_not_history() {
    let f = fixture(
        &[("a.txt", SENTENCE)],
        MockLlm::new(["Social ", "control ", "is"]).failing_after(2),
        ChainConfig::default(),
    )
    .await;
    let (events, state) = drain(f.chain.ask("social?", "s", Some(&f.index)).await.unwrap()).await;

    assert_eq!(state, ChainState::Failed);
    assert_eq!(events.len(), 4);
    assert_eq!(tokens(&events), "Social control ");
    assert!(matches!(events.last(), Some(Err(ChainError::Generation(_)))));
    assert_eq!(f.history.get_history("s").await.unwrap(), vec![Message::user("social?")]);
}

#[tokio::test]
async fn model_refusal_fails_after_sources() {
    let f = fixture(
        &[("a.txt", SENTENCE)],
        MockLlm::new(["unused"]).failing_on_start(),
        ChainConfig::default(),
    )
    .await;
    let (events, state) = drain(f.chain.stream_answer("social?", "s", Some(&f.index))).await;

    assert_eq!(state, ChainState::Failed);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Ok(StreamEvent::Sources(_))));
    let err = events[1].as_ref().unwrap_err();
    assert!(matches!(err, ChainError::Generation(_)));
    assert_eq!(err.user_message(), ragbase_chain::ERROR_MESSAGE);
}

struct OfflineStore;

#[async_trait::async_trait]
impl VectorStore for OfflineStore {
    fn backend(&self) -> &str {
        "Offline"
    }

    async fn open_namespace(
        &self,
        _namespace: &Namespace,
        _dimensions: usize,
    ) -> ragbase_rag::Result<ragbase_rag::NamespaceInfo> {
        Err(offline())
    }

    async fn namespace_info(
        &self,
        _namespace: &Namespace,
    ) -> ragbase_rag::Result<Option<ragbase_rag::NamespaceInfo>> {
        Err(offline())
    }

    async fn upsert(
        &self,
        _namespace: &Namespace,
        _chunks: Vec<ragbase_rag::EmbeddedChunk>,
        _policy: ragbase_rag::ConflictPolicy,
    ) -> ragbase_rag::Result<ragbase_rag::UpsertStats> {
        Err(offline())
    }

    async fn search(
        &self,
        _namespace: &Namespace,
        _embedding: &[f32],
        _top_k: usize,
    ) -> ragbase_rag::Result<Vec<ragbase_rag::SearchResult>> {
        Err(offline())
    }

    async fn delete_namespace(&self, _namespace: &Namespace) -> ragbase_rag::Result<()> {
        Err(offline())
    }
}

fn offline() -> ragbase_rag::RagError {
    ragbase_rag::RagError::VectorStoreError { backend: "Offline".into(), message: "down".into() }
}

#[tokio::test]
async fn retrieval_failure_ends_the_stream_without_an_answer() {
    let llm = MockLlm::new(["fabricated"]);
    let history = Arc::new(InMemoryHistoryStore::new());
    let chain = chain_with(&llm, history.clone(), ChainConfig::default());
    let index = VectorIndexHandle::new(Namespace::default(), DIMS, Arc::new(OfflineStore));

    let (events, state) = drain(chain.ask("anything?", "s", Some(&index)).await.unwrap()).await;

    assert_eq!(state, ChainState::Failed);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(ChainError::Retrieval(_))));
    assert!(llm.requests().await.is_empty());
    assert_eq!(history.get_history("s").await.unwrap(), vec![Message::user("anything?")]);
}

#[tokio::test]
async fn dimension_mismatch_is_a_configuration_failure() {
    let llm = MockLlm::new(["x"]);
    let chain = ConversationalChain::builder()
        .llm(Arc::new(llm.clone()))
        .retriever(Retriever::new(Arc::new(HashingEmbeddingProvider::new(64)), RagConfig::default()))
        .history(Arc::new(InMemoryHistoryStore::new()))
        .build()
        .unwrap();
    let index = index_of(&[("a.txt", SENTENCE)]).await;

    let (events, state) = drain(chain.stream_answer("social?", "s", Some(&index))).await;
    assert_eq!(state, ChainState::Failed);
    assert!(matches!(&events[0], Err(e) if e.is_configuration()));
    assert!(llm.requests().await.is_empty());
}

#[tokio::test]
async fn concurrent_sessions_keep_separate_histories() {
    let f = fixture(
        &[("a.txt", SENTENCE)],
        MockLlm::from_text("shared answer text").with_delay(Duration::from_millis(2)),
        ChainConfig::default(),
    )
    .await;

    let (a, b) = tokio::join!(
        async { collect_answer(f.chain.ask("question A", "A", Some(&f.index)).await?).await },
        async { collect_answer(f.chain.ask("question B", "B", Some(&f.index)).await?).await },
    );
    assert_eq!(a.unwrap().answer, "shared answer text");
    assert_eq!(b.unwrap().answer, "shared answer text");

    let history_a = f.history.get_history("A").await.unwrap();
    let history_b = f.history.get_history("B").await.unwrap();
    assert_eq!(history_a[0], Message::user("question A"));
    assert_eq!(history_b[0], Message::user("question B"));
    assert!(history_a.iter().all(|m| m.content != "question B"));
    assert!(history_b.iter().all(|m| m.content != "question A"));
    assert_eq!(history_a.len(), 2);
    assert_eq!(history_b.len(), 2);
}

#[tokio::test]
async fn cancelling_after_sources_appends_nothing() {
    let f = fixture(&[("a.txt", SENTENCE)], MockLlm::from_text(SENTENCE), ChainConfig::default())
        .await;
    let mut stream = f.chain.ask("social?", "s", Some(&f.index)).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.event_name(), "sources");
    assert_eq!(stream.state(), ChainState::ContextReady);
    drop(stream);

    assert_eq!(f.history.get_history("s").await.unwrap(), vec![Message::user("social?")]);
    assert_eq!(f.llm.open_streams(), 0);
}

#[tokio::test]
async fn cancelling_mid_answer_releases_the_model() {
    let f = fixture(&[("a.txt", SENTENCE)], MockLlm::from_text(SENTENCE), ChainConfig::default())
        .await;
    let mut stream = f.chain.stream_answer("social?", "s", Some(&f.index));

    stream.next().await.unwrap().unwrap();
    stream.next().await.unwrap().unwrap();
    assert_eq!(stream.state(), ChainState::Generating);
    assert_eq!(f.llm.open_streams(), 1);
    drop(stream);

    assert_eq!(f.llm.open_streams(), 0);
    assert!(f.history.get_history("s").await.unwrap().is_empty());
}

#[tokio::test]
async fn conversation_limit_surfaces_as_session_error() {
    let llm = MockLlm::new(["fine"]);
    let history = Arc::new(InMemoryHistoryStore::with_config(
        HistoryStoreConfig::default().with_max_messages(3),
    ));
    let chain = chain_with(&llm, history.clone(), ChainConfig::default());

    collect_answer(chain.ask("one", "s", None).await.unwrap()).await.unwrap();

    let stream = chain.ask("two", "s", None).await.unwrap();
    let (events, state) = drain(stream).await;
    assert_eq!(state, ChainState::Failed);
    assert!(matches!(events.last(), Some(Err(ChainError::Session(_)))));

    assert!(matches!(chain.ask("three", "s", None).await, Err(ChainError::Session(_))));
}

#[tokio::test]
async fn top_k_override_limits_sources() {
    let config = ChainConfig::default().with_top_k(1);
    let f = fixture(
        &[("a.txt", SENTENCE), ("b.txt", "Groups shape social norms."), ("c.txt", "Control.")],
        MockLlm::new(["ok"]),
        config,
    )
    .await;
    let answer = collect_answer(f.chain.stream_answer("social control", "s", Some(&f.index)))
        .await
        .unwrap();
    assert_eq!(answer.sources.unwrap().len(), 1);
}

#[test]
fn builder_requires_every_part() {
    let result = ConversationalChain::builder().llm(Arc::new(MockLlm::new(["x"]))).build();
    assert!(matches!(result, Err(ChainError::Configuration(_))));
}

/// **Property 3: Streamed tokens equal the stored answer**
/// *For any* token sequence produced by the model, joining the emitted token
/// events in order SHALL equal the assistant message appended to history.
mod prop_concatenation_law {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn tokens_join_to_history(
            script in proptest::collection::vec("[a-zA-Z .,\n]{0,6}", 0..16),
            grounded in any::<bool>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (streamed, stored) = rt.block_on(async {
                let f = fixture(&[("a.txt", SENTENCE)], MockLlm::new(script.clone()), ChainConfig::default()).await;
                let index = grounded.then_some(&f.index);
                let (events, state) = drain(f.chain.ask("social?", "s", index).await.unwrap()).await;
                assert_eq!(state, ChainState::Done);
                let history = f.history.get_history("s").await.unwrap();
                (tokens(&events), history.last().cloned())
            });

            prop_assert_eq!(&streamed, &script.concat());
            prop_assert_eq!(stored, Some(Message::assistant(streamed)));
        }
    }
}
