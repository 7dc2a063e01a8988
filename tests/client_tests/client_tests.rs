//! Tests for the Client
//!
//! These tests verify:
//! - Nullable-first lookups and the never-failing readWithDefault
//! - Local request checks that stop bad input before the transport
//! - Retry of throttled calls and no retry of deterministic failures
//! - Payload caps in both directions
//! - Disposal and metrics

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pathkv::client::{Connector, TransportConnection};
use pathkv::config::{Config, StoreConfig};
use pathkv::protocol::{BatchOperation, WireRequest, WireResponse, WriteOptions};
use pathkv::store::{EngineErrorKind, MemoryEngine};
use pathkv::{Client, ClientConfig, Identity, LocalConnector, Lookup, PathKvError, Result, Service};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

/// Counts calls that reach the transport
struct CountingConnector {
    inner: LocalConnector,
    calls: Arc<AtomicUsize>,
}

struct CountingConnection {
    inner: Box<dyn TransportConnection>,
    calls: Arc<AtomicUsize>,
}

impl Connector for CountingConnector {
    fn connect(&self) -> Result<Box<dyn TransportConnection>> {
        Ok(Box::new(CountingConnection {
            inner: self.inner.connect()?,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

impl TransportConnection for CountingConnection {
    fn call(&mut self, request: &WireRequest, timeout: Duration) -> Result<WireResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.call(request, timeout)
    }
}

struct Harness {
    engine: MemoryEngine,
    calls: Arc<AtomicUsize>,
    client: Client,
}

impl Harness {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Server-side retries are off so engine faults reach the client
fn setup() -> Harness {
    let config = Config::builder()
        .store(StoreConfig {
            max_retries: 0,
            ..StoreConfig::default()
        })
        .build();
    let engine = MemoryEngine::new("client-test");
    let service = Arc::new(Service::new(config, Arc::new(engine.clone())));

    let calls = Arc::new(AtomicUsize::new(0));
    let connector = CountingConnector {
        inner: LocalConnector::new(service),
        calls: Arc::clone(&calls),
    };
    let client_config = ClientConfig::builder()
        .max_retries(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .jitter(false)
        .log_suppressed_errors(false)
        .build();

    Harness {
        engine,
        calls,
        client: Client::new(client_config, Arc::new(connector)),
    }
}

fn alice() -> Identity {
    Identity::new("w1").with_user("alice")
}

// =============================================================================
// Read/Write Tests
// =============================================================================

#[test]
fn test_read_returns_lookup() {
    let h = setup();
    assert_eq!(h.client.read(&alice(), "/docs/readme").unwrap(), Lookup::NotFound);

    h.client
        .write(&alice(), "/docs/readme", json!({"title": "Hello"}), WriteOptions::default())
        .unwrap();
    let lookup = h.client.read(&alice(), "/docs/readme").unwrap();
    assert!(lookup.is_found());
    assert_eq!(lookup.value(), Some(&json!({"title": "Hello"})));
    assert_eq!(lookup.version(), Some(1));
}

#[test]
fn test_stored_null_is_found() {
    let h = setup();
    h.client.write(&alice(), "/cleared", Value::Null, WriteOptions::default()).unwrap();
    assert_eq!(
        h.client.read(&alice(), "/cleared").unwrap(),
        Lookup::Found {
            value: Value::Null,
            version: 1
        }
    );
}

#[test]
fn test_conflict_surfaces_and_is_not_retried() {
    let h = setup();
    h.client.write(&alice(), "/doc", json!(1), WriteOptions::default()).unwrap();
    let before = h.calls();

    let options = WriteOptions {
        expected_version: Some(4),
        ..WriteOptions::default()
    };
    let err = h.client.write(&alice(), "/doc", json!(2), options).unwrap_err();
    assert_eq!(err.code(), "VERSION_CONFLICT");
    assert_eq!(err.status(), 409);
    assert!(matches!(err, PathKvError::Remote(_)));
    assert_eq!(h.calls() - before, 1);
}

#[test]
fn test_tree_and_batch() {
    let h = setup();
    let ops = vec![
        BatchOperation::write("a", "/docs/a", json!(1)),
        BatchOperation::write("b", "/docs/b", json!(2)),
        BatchOperation::read("c", "/docs/c"),
    ];
    let data = h.client.batch(&alice(), ops).unwrap();
    assert_eq!(data.summary.successful, 3);

    let tree = h.client.read_tree(&alice(), "/docs", None, None).unwrap();
    assert_eq!(tree.item_count, 2);
    assert_eq!(tree.items["/docs/b"], json!(2));

    let page = h.client.read_tree(&alice(), "/docs", Some(1), None).unwrap();
    assert!(page.has_more);
    let rest = h
        .client
        .read_tree(&alice(), "/docs", Some(1), page.last_key.as_deref())
        .unwrap();
    assert_eq!(rest.items.keys().collect::<Vec<_>>(), vec!["/docs/b"]);
}

// =============================================================================
// readWithDefault Tests
// =============================================================================

#[test]
fn test_read_with_default_never_fails() {
    let h = setup();
    let fallback = json!({"theme": "light"});

    assert_eq!(h.client.read_with_default(&alice(), "/settings", fallback.clone()), fallback);

    h.client.write(&alice(), "/settings", Value::Null, WriteOptions::default()).unwrap();
    assert_eq!(h.client.read_with_default(&alice(), "/settings", fallback.clone()), fallback);

    h.client
        .write(&alice(), "/settings", json!({"theme": "dark"}), WriteOptions::default())
        .unwrap();
    assert_eq!(
        h.client.read_with_default(&alice(), "/settings", fallback.clone()),
        json!({"theme": "dark"})
    );

    // Errors of any kind yield the default
    assert_eq!(h.client.read_with_default(&alice(), "/a/../b", fallback.clone()), fallback);
    assert_eq!(
        h.client.read_with_default(&alice(), "/workspaces/w2/settings", fallback.clone()),
        fallback
    );
    h.engine.inject_faults(EngineErrorKind::Validation, 1);
    assert_eq!(h.client.read_with_default(&alice(), "/settings", fallback.clone()), fallback);

    h.client.dispose();
    assert_eq!(h.client.read_with_default(&alice(), "/settings", fallback.clone()), fallback);
}

// =============================================================================
// Local Validation Tests
// =============================================================================

#[test]
fn test_invalid_input_never_reaches_the_transport() {
    let h = setup();

    let err = h.client.read(&alice(), "/a/../etc/passwd").unwrap_err();
    assert_eq!(err.code(), "INVALID_PATH");

    let err = h.client.read(&alice(), "/workspaces/w2/secret").unwrap_err();
    assert_eq!(err.code(), "WORKSPACE_ACCESS_DENIED");

    let err = h.client.read(&Identity::new("bad id"), "/docs").unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");

    let err = h.client.read_tree(&alice(), "/docs", Some(0), None).unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");

    let err = h.client.read_tree(&alice(), "/docs/", None, None).unwrap_err();
    assert_eq!(err.code(), "INVALID_PATH");

    let too_many = (0..26).map(|i| BatchOperation::read(format!("{}", i), "/a")).collect();
    let err = h.client.batch(&alice(), too_many).unwrap_err();
    assert_eq!(err.code(), "BATCH_SIZE_EXCEEDED");

    let err = h
        .client
        .write(&alice(), "/big", json!("x".repeat(360 * 1024)), WriteOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "ITEM_TOO_LARGE");

    assert_eq!(h.calls(), 0);
}

#[test]
fn test_own_workspace_key_is_allowed() {
    let h = setup();
    h.client
        .write(&alice(), "/workspaces/w1/docs/a", json!(1), WriteOptions::default())
        .unwrap();
    assert!(h.client.read(&alice(), "/docs/a").unwrap().is_found());
}

// =============================================================================
// Retry Tests
// =============================================================================

#[test]
fn test_throttling_is_retried() {
    let h = setup();
    h.engine.inject_faults(EngineErrorKind::Throttling, 2);

    h.client.write(&alice(), "/doc", json!(1), WriteOptions::default()).unwrap();
    assert_eq!(h.calls(), 3);
}

#[test]
fn test_retries_are_bounded() {
    let h = setup();
    h.engine.inject_faults(EngineErrorKind::Throttling, 10);

    let err = h.client.read(&alice(), "/doc").unwrap_err();
    assert_eq!(err.code(), "THROTTLED");
    assert!(err.is_retryable());
    assert_eq!(h.calls(), 4);
}

#[test]
fn test_validation_failures_are_not_retried() {
    let h = setup();
    h.engine.inject_faults(EngineErrorKind::Validation, 1);

    let err = h.client.read(&alice(), "/doc").unwrap_err();
    assert_eq!(err.code(), "INVALID_REQUEST");
    assert_eq!(h.calls(), 1);
}

// =============================================================================
// Payload Limit Tests
// =============================================================================

#[test]
fn test_oversized_request_is_not_sent() {
    let h = setup();
    let chunk = "x".repeat(300 * 1024);
    let ops = (0..25)
        .map(|i| BatchOperation::write(format!("{}", i), format!("/big/{}", i), json!(chunk)))
        .collect();

    let err = h.client.batch(&alice(), ops).unwrap_err();
    assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");
    assert_eq!(err.status(), 413);
    assert_eq!(h.calls(), 0);
}

#[test]
fn test_oversized_response_becomes_error() {
    let h = setup();
    let chunk = "x".repeat(340 * 1024);
    for i in 0..20 {
        h.client
            .write(&alice(), &format!("/big/{:02}", i), json!(chunk), WriteOptions::default())
            .unwrap();
    }

    let err = h.client.read_tree(&alice(), "/big", None, None).unwrap_err();
    assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");

    // Smaller pages fit
    let page = h.client.read_tree(&alice(), "/big", Some(5), None).unwrap();
    assert_eq!(page.item_count, 5);
}

// =============================================================================
// Lifecycle and Metrics Tests
// =============================================================================

#[test]
fn test_dispose_is_idempotent() {
    let h = setup();
    assert!(!h.client.is_disposed());

    h.client.dispose();
    h.client.dispose();
    assert!(h.client.is_disposed());

    let err = h.client.read(&alice(), "/doc").unwrap_err();
    assert!(matches!(err, PathKvError::ClientDisposed));
    assert_eq!(err.code(), "CLIENT_DISPOSED");
    assert!(h.client.health_check().is_err());
    assert_eq!(h.calls(), 0);
}

#[test]
fn test_health_check() {
    let h = setup();
    let health = h.client.health_check().unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.engine, "memory");
    assert_eq!(health.table_name, "client-test");
}

#[test]
fn test_metrics() {
    let h = setup();
    h.client.write(&alice(), "/a", json!(1), WriteOptions::default()).unwrap();
    h.client.read(&alice(), "/a").unwrap();
    h.client.read(&alice(), "/b").unwrap();
    let _ = h.client.read(&alice(), "/a/../b");

    let snapshot = h.client.metrics();
    assert_eq!(snapshot.total_requests, 4);
    assert_eq!(snapshot.total_errors, 1);
    assert!((snapshot.error_rate - 0.25).abs() < 1e-9);
    assert_eq!(snapshot.operations["read"].count, 3);
    assert_eq!(snapshot.operations["read"].errors, 1);
    assert_eq!(snapshot.operations["write"].count, 1);
    assert_eq!(snapshot.errors_by_code.get("INVALID_PATH"), Some(&1));
    assert!(snapshot.average_latency_ms >= 0.0);
}
