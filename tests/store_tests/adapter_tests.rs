//! Tests for StoreAdapter
//!
//! These tests verify:
//! - Conditional writes and conflict classification
//! - Retry of throttled and failed engine calls
//! - Discarding of broken connections
//! - Transaction limits and all-or-nothing behaviour
//! - Prefix scan paging with cursors

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pathkv::config::StoreConfig;
use pathkv::error::PathKvError;
use pathkv::item::{ConditionalPut, DataItem, PutCondition, Revision, TRANSACTION_ITEM_LIMIT};
use pathkv::store::{EngineErrorKind, MemoryEngine, StoreAdapter};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn fast_store_config() -> StoreConfig {
    StoreConfig {
        pool_size: 4,
        acquire_timeout: Duration::from_millis(200),
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

fn setup() -> (MemoryEngine, StoreAdapter) {
    let engine = MemoryEngine::new("adapter-test");
    let adapter = StoreAdapter::new(Arc::new(engine.clone()), &fast_store_config());
    (engine, adapter)
}

fn item(key: &str, value: Value, existing: Option<&DataItem>) -> DataItem {
    DataItem::next_revision(
        existing,
        Revision {
            key,
            workspace_id: "w1",
            path: key,
            value,
            user_id: Some("tester"),
            metadata: None,
            now: Utc::now(),
        },
    )
}

// =============================================================================
// Single Item Tests
// =============================================================================

#[test]
fn test_put_then_get() {
    let (_engine, store) = setup();
    let first = item("/workspaces/w1/a", json!({"n": 1}), None);
    store.conditional_put(&first, Some(PutCondition::NotExists)).unwrap();

    let stored = store.get("/workspaces/w1/a", true).unwrap().unwrap();
    assert_eq!(stored.value, json!({"n": 1}));
    assert_eq!(stored.version, 1);
    assert!(store.get("/workspaces/w1/missing", true).unwrap().is_none());
}

#[test]
fn test_failed_condition_is_version_conflict() {
    let (_engine, store) = setup();
    let first = item("/workspaces/w1/a", json!(1), None);
    store.conditional_put(&first, None).unwrap();

    let err = store
        .conditional_put(&first, Some(PutCondition::NotExists))
        .unwrap_err();
    match err {
        PathKvError::VersionConflict { actual, .. } => assert_eq!(actual, Some(1)),
        other => panic!("expected VersionConflict, got {:?}", other),
    }

    let stale = item("/workspaces/w1/a", json!(2), Some(&first));
    assert!(store
        .conditional_put(&stale, Some(PutCondition::VersionEquals(7)))
        .is_err());
}

// =============================================================================
// Retry and Pool Tests
// =============================================================================

#[test]
fn test_throttling_is_retried() {
    let (engine, store) = setup();
    engine.inject_faults(EngineErrorKind::Throttling, 2);
    assert!(store.get("/workspaces/w1/a", true).unwrap().is_none());
}

#[test]
fn test_retries_are_bounded() {
    let (engine, store) = setup();
    engine.inject_faults(EngineErrorKind::Throttling, 10);
    let err = store.get("/workspaces/w1/a", true).unwrap_err();
    assert!(matches!(err, PathKvError::Throttled(_)));
    assert_eq!(err.status(), 429);
}

#[test]
fn test_validation_errors_are_not_retried() {
    let (engine, store) = setup();
    engine.inject_faults(EngineErrorKind::Validation, 1);
    let err = store.get("/workspaces/w1/a", true).unwrap_err();
    assert!(matches!(err, PathKvError::InvalidRequest(_)));
}

#[test]
fn test_server_error_discards_connection() {
    let (engine, store) = setup();
    store.get("/workspaces/w1/a", true).unwrap();
    assert_eq!(engine.connections_opened(), 1);

    engine.inject_faults(EngineErrorKind::ServerError, 1);
    store.get("/workspaces/w1/a", true).unwrap();

    // The broken connection was replaced
    assert_eq!(engine.connections_opened(), 2);
    let stats = store.pool_stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.total, 1);
}

#[test]
fn test_connections_are_reused() {
    let (engine, store) = setup();
    for _ in 0..10 {
        store.get("/workspaces/w1/a", true).unwrap();
    }
    assert_eq!(engine.connections_opened(), 1);
    assert_eq!(store.pool_stats().reused, 9);
}

#[test]
fn test_closed_store_rejects_calls() {
    let (_engine, store) = setup();
    store.close();
    assert!(matches!(
        store.get("/workspaces/w1/a", true),
        Err(PathKvError::ConnectionFailed(_))
    ));
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_transaction_size_limit() {
    let (_engine, store) = setup();
    let keys: Vec<String> = (0..=TRANSACTION_ITEM_LIMIT)
        .map(|i| format!("/workspaces/w1/k{}", i))
        .collect();
    assert!(matches!(
        store.transact_get(&keys),
        Err(PathKvError::InvalidRequest(_))
    ));
    assert!(matches!(store.transact_get(&[]), Err(PathKvError::InvalidRequest(_))));
    assert_eq!(store.transact_get(&keys[..TRANSACTION_ITEM_LIMIT]).unwrap().len(), 25);
}

#[test]
fn test_transact_put_is_all_or_nothing() {
    let (engine, store) = setup();
    let existing = item("/workspaces/w1/b", json!("old"), None);
    store.conditional_put(&existing, None).unwrap();

    let puts = vec![
        ConditionalPut {
            item: item("/workspaces/w1/a", json!("new"), None),
            condition: Some(PutCondition::NotExists),
        },
        ConditionalPut {
            item: item("/workspaces/w1/b", json!("new"), Some(&existing)),
            condition: Some(PutCondition::VersionEquals(5)),
        },
    ];
    let err = store.transact_put(&puts).unwrap_err();
    assert!(matches!(err, PathKvError::TransactionFailed(_)));

    assert!(engine.peek("/workspaces/w1/a").is_none());
    assert_eq!(engine.peek("/workspaces/w1/b").unwrap().value, json!("old"));
}

#[test]
fn test_transact_get_is_positional() {
    let (_engine, store) = setup();
    store
        .conditional_put(&item("/workspaces/w1/b", json!(2), None), None)
        .unwrap();

    let found = store
        .transact_get(&["/workspaces/w1/a".to_string(), "/workspaces/w1/b".to_string()])
        .unwrap();
    assert!(found[0].is_none());
    assert_eq!(found[1].as_ref().unwrap().value, json!(2));
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_pages_with_cursor() {
    let (_engine, store) = setup();
    for i in 0..5 {
        let key = format!("/workspaces/w1/docs/{}", i);
        store.conditional_put(&item(&key, json!(i), None), None).unwrap();
    }
    store
        .conditional_put(&item("/workspaces/w1/other", json!("x"), None), None)
        .unwrap();

    let first = store.scan_prefix("/workspaces/w1/docs/", 2, None).unwrap();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next_cursor.expect("more pages");

    let second = store.scan_prefix("/workspaces/w1/docs/", 2, Some(&cursor)).unwrap();
    assert_eq!(second.items[0].value, json!(2));

    let last = store
        .scan_prefix("/workspaces/w1/docs/", 10, second.next_cursor.as_ref())
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(last.next_cursor.is_none());
}
