//! Tests for the batch handler
//!
//! These tests verify:
//! - Whole-batch rejection for malformed requests
//! - Per-operation failures for version, existence and stored-size checks
//! - All-or-nothing commit of the surviving writes
//! - Reads observe the state before the batch's writes
//! - Request-order results and summary counts

use std::sync::Arc;
use std::time::Duration;

use pathkv::config::{Config, StoreConfig};
use pathkv::handlers::{self, HandlerContext};
use pathkv::protocol::{
    ApiResponse, BatchData, BatchOperation, BatchOperationResult, BatchOperationType, BatchRequest,
    BatchSummary, Endpoint, WireRequest, WriteOptions, WriteRequest,
};
use pathkv::store::{EngineErrorKind, EngineOp, MemoryEngine};
use pathkv::{Service, StoreAdapter};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (MemoryEngine, HandlerContext) {
    let config = Config::builder()
        .store(StoreConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            ..StoreConfig::default()
        })
        .build();
    let engine = MemoryEngine::new("batch-test");
    let store = Arc::new(StoreAdapter::new(Arc::new(engine.clone()), &config.store));
    (engine, HandlerContext::new(store, Arc::new(config)))
}

fn batch_req(operations: Vec<BatchOperation>) -> BatchRequest {
    BatchRequest {
        workspace_id: "w1".to_string(),
        user_id: Some("alice".to_string()),
        operations,
    }
}

fn put(ctx: &HandlerContext, path: &str, value: Value) {
    let request = WriteRequest {
        workspace_id: "w1".to_string(),
        path: path.to_string(),
        value: Some(value),
        user_id: None,
        options: WriteOptions::default(),
    };
    handlers::write(ctx, &request).unwrap();
}

fn result<'a>(data: &'a BatchData, id: &str) -> &'a BatchOperationResult {
    data.results
        .iter()
        .find(|r| r.id == id)
        .unwrap_or_else(|| panic!("no result for {}", id))
}

fn error_code(result: &BatchOperationResult) -> &str {
    assert!(!result.success, "{} should have failed", result.id);
    &result.error.as_ref().expect("failed result carries an error").code
}

// =============================================================================
// Whole-Batch Rejection Tests
// =============================================================================

#[test]
fn test_batch_size_limits() {
    let (_engine, ctx) = setup();

    let err = handlers::batch(&ctx, &batch_req(Vec::new())).unwrap_err();
    assert_eq!(err.code(), "BATCH_SIZE_EXCEEDED");

    let too_many = (0..26).map(|i| BatchOperation::read(format!("op{}", i), format!("/k{}", i))).collect();
    let err = handlers::batch(&ctx, &batch_req(too_many)).unwrap_err();
    assert_eq!(err.code(), "BATCH_SIZE_EXCEEDED");

    let full = (0..25).map(|i| BatchOperation::read(format!("op{}", i), format!("/k{}", i))).collect();
    assert_eq!(handlers::batch(&ctx, &batch_req(full)).unwrap().summary.total, 25);
}

#[test]
fn test_duplicate_operation_ids() {
    let (_engine, ctx) = setup();
    let ops = vec![BatchOperation::read("same", "/a"), BatchOperation::read("same", "/b")];
    let err = handlers::batch(&ctx, &batch_req(ops)).unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_OPERATION_ID");
}

#[test]
fn test_missing_required_fields() {
    let (_engine, ctx) = setup();

    let mut write = BatchOperation::write("w", "/a", json!(1));
    write.value = None;
    let err = handlers::batch(&ctx, &batch_req(vec![write])).unwrap_err();
    assert_eq!(err.code(), "INVALID_OPERATION");

    let mut defaulted = BatchOperation::read_with_default("d", "/a", json!(1));
    defaulted.default_value = None;
    let err = handlers::batch(&ctx, &batch_req(vec![defaulted])).unwrap_err();
    assert_eq!(err.code(), "INVALID_OPERATION");
}

#[test]
fn test_same_key_written_twice() {
    let (engine, ctx) = setup();
    let ops = vec![
        BatchOperation::write("first", "/a", json!(1)),
        BatchOperation::write("second", "//a/", json!(2)),
    ];
    let err = handlers::batch(&ctx, &batch_req(ops)).unwrap_err();
    assert_eq!(err.code(), "INVALID_OPERATION");
    assert!(engine.is_empty());
}

#[test]
fn test_one_bad_path_rejects_everything() {
    let (engine, ctx) = setup();
    let ops = vec![
        BatchOperation::write("good", "/a", json!(1)),
        BatchOperation::write("bad", "/a/../etc", json!(2)),
    ];
    let err = handlers::batch(&ctx, &batch_req(ops)).unwrap_err();
    assert_eq!(err.code(), "INVALID_PATH");
    assert!(engine.is_empty());
}

#[test]
fn test_foreign_workspace_rejects_everything() {
    let (engine, ctx) = setup();
    let ops = vec![
        BatchOperation::write("mine", "/a", json!(1)),
        BatchOperation::read("theirs", "/workspaces/w2/secret"),
    ];
    let err = handlers::batch(&ctx, &batch_req(ops)).unwrap_err();
    assert_eq!(err.code(), "WORKSPACE_ACCESS_DENIED");
    assert!(engine.is_empty());
}

#[test]
fn test_oversized_write_rejects_everything() {
    let (engine, ctx) = setup();
    let ops = vec![
        BatchOperation::write("small", "/a", json!(1)),
        BatchOperation::write("big", "/b", json!("x".repeat(360 * 1024))),
    ];
    let err = handlers::batch(&ctx, &batch_req(ops)).unwrap_err();
    assert_eq!(err.code(), "ITEM_TOO_LARGE");
    assert!(engine.is_empty());
}

// =============================================================================
// Execution Tests
// =============================================================================

#[test]
fn test_mixed_batch_in_request_order() {
    let (_engine, ctx) = setup();
    put(&ctx, "/existing", json!("before"));

    let ops = vec![
        BatchOperation::write("w-new", "/new", json!({"n": 1})),
        BatchOperation::read("r-missing", "/missing"),
        BatchOperation::read_with_default("d-missing", "/missing", json!("fallback")),
        BatchOperation::write("w-existing", "/existing", json!("after")),
        BatchOperation::read("r-existing", "/existing"),
    ];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();

    let ids: Vec<&str> = data.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["w-new", "r-missing", "d-missing", "w-existing", "r-existing"]);
    assert_eq!(
        data.summary,
        BatchSummary {
            total: 5,
            successful: 5,
            failed: 0,
            reads: 3,
            writes: 2,
        }
    );

    let created = result(&data, "w-new");
    assert_eq!(created.op_type, BatchOperationType::Write);
    assert_eq!(created.created, Some(true));
    assert_eq!(created.version, Some(1));

    let missing = result(&data, "r-missing");
    assert_eq!(missing.found, Some(false));
    assert_eq!(missing.value, Some(Value::Null));

    let defaulted = result(&data, "d-missing");
    assert_eq!(defaulted.default_used, Some(true));
    assert_eq!(defaulted.value, Some(json!("fallback")));

    let updated = result(&data, "w-existing");
    assert_eq!(updated.created, Some(false));
    assert_eq!(updated.version, Some(2));

    // Reads see the state before this batch's writes
    let read = result(&data, "r-existing");
    assert_eq!(read.value, Some(json!("before")));
    assert_eq!(read.version, Some(1));
}

#[test]
fn test_results_carry_relative_paths() {
    let (_engine, ctx) = setup();
    let ops = vec![BatchOperation::write("w", "/workspaces/w1/docs//a", json!(1))];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();
    assert_eq!(data.results[0].path, "/docs/a");
}

#[test]
fn test_repeated_reads_of_one_key() {
    let (_engine, ctx) = setup();
    put(&ctx, "/a", json!("value"));
    let ops = vec![BatchOperation::read("one", "/a"), BatchOperation::read("two", "//a")];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();
    assert_eq!(result(&data, "one").value, Some(json!("value")));
    assert_eq!(result(&data, "two").value, Some(json!("value")));
}

#[test]
fn test_failed_checks_only_fail_their_operation() {
    let (engine, ctx) = setup();
    put(&ctx, "/versioned", json!("v1"));

    let ops = vec![
        BatchOperation::write("stale", "/versioned", json!("v2")).with_options(WriteOptions {
            expected_version: Some(7),
            ..WriteOptions::default()
        }),
        BatchOperation::write("fresh", "/fresh", json!("ok")),
        BatchOperation::write("needs-item", "/absent", json!(1)).with_options(WriteOptions {
            require_version: true,
            ..WriteOptions::default()
        }),
    ];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();

    assert_eq!(error_code(result(&data, "stale")), "VERSION_CONFLICT");
    assert_eq!(error_code(result(&data, "needs-item")), "ITEM_NOT_FOUND");
    assert!(result(&data, "fresh").success);
    assert_eq!(data.summary.successful, 1);
    assert_eq!(data.summary.failed, 2);

    assert_eq!(engine.peek("/workspaces/w1/versioned").unwrap().value, json!("v1"));
    assert_eq!(engine.peek("/workspaces/w1/fresh").unwrap().value, json!("ok"));
    assert!(engine.peek("/workspaces/w1/absent").is_none());
}

#[test]
fn test_merged_metadata_too_large_fails_its_operation() {
    let (engine, ctx) = setup();
    let seeded = WriteRequest {
        workspace_id: "w1".to_string(),
        path: "/heavy".to_string(),
        value: Some(json!("v1")),
        user_id: None,
        options: WriteOptions {
            metadata: json!({"a": "x".repeat(200 * 1024)}).as_object().cloned(),
            ..WriteOptions::default()
        },
    };
    handlers::write(&ctx, &seeded).unwrap();

    let ops = vec![
        BatchOperation::write("grow", "/heavy", json!("v2")).with_options(WriteOptions {
            metadata: json!({"b": "y".repeat(200 * 1024)}).as_object().cloned(),
            ..WriteOptions::default()
        }),
        BatchOperation::write("light", "/light", json!("ok")),
    ];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();

    assert_eq!(error_code(result(&data, "grow")), "ITEM_TOO_LARGE");
    assert!(result(&data, "light").success);
    assert_eq!(engine.peek("/workspaces/w1/heavy").unwrap().version, 1);
    assert_eq!(engine.peek("/workspaces/w1/light").unwrap().value, json!("ok"));
}

#[test]
fn test_failed_transaction_fails_every_write() {
    let (engine, ctx) = setup();
    put(&ctx, "/a", json!("old"));
    engine.inject_faults_on(EngineOp::TransactPut, EngineErrorKind::TransactionCanceled, 1);

    let ops = vec![
        BatchOperation::write("wa", "/a", json!("new")),
        BatchOperation::write("wb", "/b", json!("new")),
        BatchOperation::read("ra", "/a"),
    ];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();

    assert_eq!(error_code(result(&data, "wa")), "TRANSACTION_FAILED");
    assert_eq!(error_code(result(&data, "wb")), "TRANSACTION_FAILED");
    assert!(result(&data, "ra").success);
    assert_eq!(data.summary.failed, 2);

    // Nothing was applied
    assert_eq!(engine.peek("/workspaces/w1/a").unwrap().value, json!("old"));
    assert!(engine.peek("/workspaces/w1/b").is_none());
}

#[test]
fn test_failed_read_transaction_fails_every_read() {
    let (engine, ctx) = setup();
    engine.inject_faults_on(EngineOp::TransactGet, EngineErrorKind::NotFound, 1);

    let ops = vec![
        BatchOperation::read("r1", "/a"),
        BatchOperation::read_with_default("r2", "/b", json!(0)),
        BatchOperation::write("w1", "/c", json!(1)),
    ];
    let data = handlers::batch(&ctx, &batch_req(ops)).unwrap();

    assert_eq!(error_code(result(&data, "r1")), "TABLE_NOT_FOUND");
    assert_eq!(error_code(result(&data, "r2")), "TABLE_NOT_FOUND");
    assert!(result(&data, "w1").success);
    assert_eq!(data.summary.successful, 1);
}

#[test]
fn test_batch_writes_record_the_caller() {
    let (engine, ctx) = setup();
    let ops = vec![BatchOperation::write("w", "/doc", json!(1))];
    handlers::batch(&ctx, &batch_req(ops)).unwrap();

    let stored = engine.peek("/workspaces/w1/doc").unwrap();
    assert_eq!(stored.created_by.as_deref(), Some("alice"));
    assert_eq!(stored.updated_by.as_deref(), Some("alice"));
}

// =============================================================================
// Wire Format Tests
// =============================================================================

#[test]
fn test_batch_over_the_wire() {
    let service = Service::new(Config::default(), Arc::new(MemoryEngine::new("svc")));
    let body = json!({
        "workspaceId": "w1",
        "operations": [
            {"id": "1", "type": "write", "path": "/a", "value": null},
            {"id": "2", "type": "readWithDefault", "path": "/a", "defaultValue": "d"},
        ]
    });
    let request = WireRequest::new(Endpoint::Batch, serde_json::to_vec(&body).unwrap());

    let response = service.handle(&request);
    assert_eq!(response.status, 200);
    let envelope: ApiResponse<BatchData> = response.parse().unwrap();
    let data = envelope.data.unwrap();
    assert_eq!(data.results[0].value, Some(Value::Null));
    assert_eq!(data.results[1].value, Some(json!("d")));
    assert_eq!(data.summary.writes, 1);
}

#[test]
fn test_rejected_batch_over_the_wire() {
    let service = Service::new(Config::default(), Arc::new(MemoryEngine::new("svc")));
    let body = json!({"workspaceId": "w1", "operations": []});
    let request = WireRequest::new(Endpoint::Batch, serde_json::to_vec(&body).unwrap());

    let response = service.handle(&request);
    assert_eq!(response.status, 400);
    let envelope: ApiResponse<BatchData> = response.parse().unwrap();
    assert_eq!(envelope.error.unwrap().code, "BATCH_SIZE_EXCEEDED");
}
