//! `ragbase chat`: an interactive conversation over one namespace.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use ragbase_chain::{ChainConfig, ConversationalChain, EmptyContextPolicy, StreamEvent};
use ragbase_rag::{RagConfig, RetrievalResult, Retriever, VectorIndexHandle};
use ragbase_session::{HistoryStore, InMemoryHistoryStore};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::cli::{ChatArgs, ModelArgs};
use crate::providers;

const PROMPT: &str = "you> ";

pub async fn run(args: ChatArgs, store_dir: &Path, models: &ModelArgs) -> Result<()> {
    let namespace = args.target.resolve()?;
    let embedder = providers::embedder(models)?;
    let pipeline = providers::pipeline(store_dir, embedder.clone(), RagConfig::default()).await?;

    let index = pipeline.open(&namespace).await?;
    if index.is_none() {
        warn!(namespace = %namespace, "namespace has no documents; answering without retrieval");
    }

    let mut config = ChainConfig::default();
    if let Some(k) = args.top_k {
        config = config.with_top_k(k);
    }
    if args.strict {
        config = config.with_empty_context(EmptyContextPolicy::NotFound);
    }
    let chain = ConversationalChain::builder()
        .llm(providers::llm(models)?)
        .retriever(Retriever::new(embedder, RagConfig::default()))
        .history(Arc::new(InMemoryHistoryStore::new()))
        .config(config)
        .build()?;

    let session_id = args.session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(session_id = %session_id, namespace = %namespace, "chat session started");
    repl(&chain, &session_id, index.as_ref()).await
}

async fn repl(
    chain: &ConversationalChain,
    session_id: &str,
    index: Option<&VectorIndexHandle>,
) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question. /clear forgets the conversation, /quit exits.");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        editor.add_history_entry(question)?;

        match question {
            "/quit" | "/exit" => break,
            "/clear" => {
                chain.history().clear(session_id).await?;
                println!("(conversation cleared)");
            }
            _ => {
                let mut stdout = std::io::stdout();
                answer(chain, question, session_id, index, &mut stdout).await?;
            }
        }
    }
    Ok(())
}

/// Ask one question and write sources, then tokens as they arrive.
///
/// Chain failures are reported to the user and do not end the session;
/// only output errors are returned.
pub async fn answer(
    chain: &ConversationalChain,
    question: &str,
    session_id: &str,
    index: Option<&VectorIndexHandle>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let mut stream = match chain.ask(question, session_id, index).await {
        Ok(stream) => stream,
        Err(e) => return writeln!(out, "{}", e.user_message()),
    };

    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::Sources(sources)) => write_sources(&sources, out)?,
            Ok(StreamEvent::Token(token)) => {
                write!(out, "{token}")?;
                out.flush()?;
            }
            Err(e) => {
                writeln!(out)?;
                write!(out, "{}", e.user_message())?;
                break;
            }
        }
    }
    writeln!(out)?;
    writeln!(out)
}

pub fn write_sources(sources: &RetrievalResult, out: &mut impl Write) -> std::io::Result<()> {
    if sources.is_empty() {
        return writeln!(out, "(no matching sources)");
    }
    writeln!(out, "Sources:")?;
    for (rank, hit) in sources.hits().iter().enumerate() {
        writeln!(
            out,
            "  [{}] {}#{} ({:.3})",
            rank + 1,
            hit.chunk.source_ref,
            hit.chunk.ordinal,
            hit.score
        )?;
    }
    writeln!(out)
}
