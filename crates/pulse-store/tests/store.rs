//! Integration tests for the in-process store: transactions under real
//! task concurrency and subscription delivery.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use pulse_store::{ChangeKind, MemoryStore, StoreError, TxOutcome, Watch, WriteSet};
use serde_json::json;

async fn increment(store: &MemoryStore, path: &str) -> Result<u64, StoreError> {
    store
        .transact(&[path.to_owned()], |snap| {
            let current: u64 = snap.get_json(path)?.unwrap_or(0);
            let next = current.saturating_add(1);
            let mut writes = WriteSet::new();
            writes.set_json(path.to_owned(), &next)?;
            Ok(TxOutcome::commit(writes, next))
        })
        .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let store = MemoryStore::with_max_attempts(1_000);
    let mut handles = Vec::new();
    for _ in 0..50 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { increment(&store, "counter").await }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(store.get("counter").unwrap(), Some(json!(50)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_if_absent_admits_exactly_one_writer() {
    let store = MemoryStore::with_max_attempts(1_000);
    let mut handles = Vec::new();
    for n in 0..20_u32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .transact(&["lock".to_owned()], |snap| {
                    if snap.exists("lock") {
                        return Ok(TxOutcome::read_only(false));
                    }
                    let mut writes = WriteSet::new();
                    writes.set("lock".to_owned(), json!(n));
                    Ok(TxOutcome::commit(writes, true))
                })
                .await
        }));
    }
    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn deleted_then_recreated_document_conflicts() {
    let store = MemoryStore::new();
    store.set("doc", json!(1)).unwrap();

    let mut first_attempt = true;
    let result = store
        .transact(&["doc".to_owned()], |snap| {
            if first_attempt {
                first_attempt = false;
                // Another writer deletes and recreates the document between
                // snapshot and commit.
                store.delete("doc")?;
                store.set("doc", json!(1))?;
            }
            let seen = snap.get("doc").cloned();
            let mut writes = WriteSet::new();
            writes.set("seen".to_owned(), json!(seen.is_some()));
            Ok(TxOutcome::commit(writes, ()))
        })
        .await;
    assert!(result.is_ok());
    assert!(!first_attempt);
}

#[tokio::test]
async fn subscription_delivers_snapshot_then_changes() {
    let store = MemoryStore::new();
    store.set("events/a", json!({"n": 1})).unwrap();

    let mut sub = store.subscribe(Watch::Collection("events".to_owned())).unwrap();
    let initial = sub.next().await.unwrap();
    assert_eq!(initial.kind, ChangeKind::Added);
    assert_eq!(initial.id(), "a");

    store.set("events/b", json!({"n": 2})).unwrap();
    store.set("events/a", json!({"n": 3})).unwrap();
    store.delete("events/b").unwrap();
    store.set("other/c", json!({})).unwrap();

    let kinds: Vec<(ChangeKind, String)> = (0..3)
        .map(|_| sub.try_next().unwrap())
        .map(|c| (c.kind, c.id().to_owned()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ChangeKind::Added, "b".to_owned()),
            (ChangeKind::Modified, "a".to_owned()),
            (ChangeKind::Removed, "b".to_owned()),
        ]
    );
    assert!(sub.try_next().is_none());
}

#[tokio::test]
async fn dropping_subscription_releases_listener() {
    let store = MemoryStore::new();
    let doc = store.subscribe(Watch::Document("polls/p".to_owned())).unwrap();
    let coll = store.subscribe(Watch::Collection("streams".to_owned())).unwrap();
    assert_eq!(store.listener_count().unwrap(), 2);

    doc.unsubscribe();
    assert_eq!(store.listener_count().unwrap(), 1);
    drop(coll);
    assert_eq!(store.listener_count().unwrap(), 0);
}

#[tokio::test]
async fn transaction_writes_are_observed_in_commit_order() {
    let store = MemoryStore::new();
    let mut sub = store.subscribe(Watch::Document("stats/p".to_owned())).unwrap();
    for _ in 0..5 {
        increment(&store, "stats/p").await.unwrap();
    }
    for expected in 1..=5_u64 {
        let change = sub.next().await.unwrap();
        assert_eq!(change.decode::<u64>().unwrap(), Some(expected));
    }
}
