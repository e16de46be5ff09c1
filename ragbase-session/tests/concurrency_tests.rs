//! Concurrent access to the in-memory history store.

use std::sync::Arc;

use ragbase_core::Role;
use ragbase_session::{HistoryStore, InMemoryHistoryStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_do_not_interfere() {
    let store = Arc::new(InMemoryHistoryStore::new());

    let mut tasks = Vec::new();
    for session in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let id = format!("session-{session}");
            for turn in 0..25 {
                store.append(&id, Role::User, format!("{id} q{turn}")).await.unwrap();
                tokio::task::yield_now().await;
                store.append(&id, Role::Assistant, format!("{id} a{turn}")).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for session in 0..16 {
        let id = format!("session-{session}");
        let history = store.get_history(&id).await.unwrap();
        assert_eq!(history.len(), 50);
        assert!(history.iter().all(|m| m.content.starts_with(&format!("{id} "))));
        for (turn, pair) in history.chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[0].content, format!("{id} q{turn}"));
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("{id} a{turn}"));
        }
    }
    assert_eq!(store.sessions().await.unwrap().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_session_appends_are_never_lost() {
    let store = Arc::new(InMemoryHistoryStore::new());

    let mut tasks = Vec::new();
    for writer in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.append("shared", Role::User, format!("message {writer}")).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let history = store.get_history("shared").await.unwrap();
    assert_eq!(history.len(), 32);
    let mut contents: Vec<_> = history.into_iter().map(|m| m.content).collect();
    contents.sort();
    contents.dedup();
    assert_eq!(contents.len(), 32);
}

#[tokio::test]
async fn clones_share_state() {
    let store = InMemoryHistoryStore::new();
    let handle = store.clone();
    handle.append("s", Role::User, "hello".into()).await.unwrap();
    assert_eq!(store.get_history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn summaries_serialize_with_timestamps() {
    let store = InMemoryHistoryStore::new();
    store.append("s", Role::User, "hello".into()).await.unwrap();
    let json = serde_json::to_value(store.sessions().await.unwrap()).unwrap();
    assert_eq!(json[0]["session_id"], "s");
    assert_eq!(json[0]["message_count"], 1);
    assert!(json[0]["created_at"].is_string());
}
