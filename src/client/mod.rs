//! Client Module
//!
//! Caller-facing facade over the wire protocol.
//!
//! ## Responsibilities
//! - Mirror the server's request checks so bad input fails fast, locally
//! - Pool transport connections and retry transient failures with backoff
//! - Record per-operation metrics
//!
//! ## Lifecycle
//! ```text
//!   new() ──► Active ──► dispose() ──► Disposed (terminal)
//! ```
//! A disposed client fails every call with `CLIENT_DISPOSED`, except
//! [`Client::read_with_default`], which never fails.

mod config;
mod metrics;
mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{PathKvError, Result};
use crate::handlers::checks;
use crate::item::Lookup;
use crate::path::{validate_workspace_boundary, workspace_root, WorkspaceConstraints, WORKSPACE_ROOT_PREFIX};
use crate::pool::Pool;
use crate::protocol::{
    ApiResponse, BatchData, BatchOperation, BatchOperationType, BatchRequest, Endpoint,
    HealthData, ReadData, ReadRequest, ReadWithDefaultRequest, TreeData, TreeRequest,
    WireRequest, WriteData, WriteOptions, WriteRequest, MAX_PAYLOAD_SIZE,
};
use crate::retry::RetryPolicy;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use metrics::{ClientMetrics, MetricsSnapshot, OperationMetrics};
pub use transport::{Connector, LocalConnector, TcpConnector, TransportConnection};

/// Who is calling: supplied with every data call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub workspace_id: String,
    pub user_id: Option<String>,
}

impl Identity {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// PathKV client
///
/// ## Concurrency
/// All methods take `&self`; share the client behind an `Arc`.
pub struct Client {
    config: ClientConfig,
    pool: Pool<Box<dyn TransportConnection>>,
    retry: RetryPolicy,
    metrics: ClientMetrics,
    disposed: AtomicBool,
    endpoint: String,
}

impl Client {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let endpoint = connector.describe();
        let pool = Pool::new(config.pool_size, config.acquire_timeout, move || connector.connect());
        tracing::debug!("Client created for {}", endpoint);

        Self {
            retry: config.retry_policy(),
            config,
            pool,
            metrics: ClientMetrics::new(),
            disposed: AtomicBool::new(false),
            endpoint,
        }
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Point read; a missing item is [`Lookup::NotFound`], not an error
    pub fn read(&self, identity: &Identity, path: &str) -> Result<Lookup> {
        self.observe("read", || {
            let path = self.check_path(identity, path)?;
            let data: ReadData = self.call(
                Endpoint::Read,
                &ReadRequest {
                    workspace_id: identity.workspace_id.clone(),
                    path,
                    user_id: identity.user_id.clone(),
                },
            )?;
            if !data.found {
                return Ok(Lookup::NotFound);
            }
            Ok(Lookup::Found {
                value: data.value,
                version: data.version.unwrap_or_default(),
            })
        })
    }

    /// Read falling back to `default_value`; never fails
    ///
    /// Missing items, stored `null`s and every error (including a disposed
    /// client) yield the default.
    pub fn read_with_default(&self, identity: &Identity, path: &str, default_value: Value) -> Value {
        let outcome = self.observe("readWithDefault", || {
            let path = self.check_path(identity, path)?;
            let data: ReadData = self.call(
                Endpoint::ReadWithDefault,
                &ReadWithDefaultRequest {
                    workspace_id: identity.workspace_id.clone(),
                    path,
                    user_id: identity.user_id.clone(),
                    default_value: Some(default_value.clone()),
                },
            )?;
            Ok(data.value)
        });

        match outcome {
            Ok(value) => value,
            Err(e) => {
                if self.config.log_suppressed_errors {
                    tracing::warn!(code = e.code(), "readWithDefault({}) fell back to default: {}", path, e);
                }
                default_value
            }
        }
    }

    /// Write `value` (which may be `null`)
    pub fn write(&self, identity: &Identity, path: &str, value: Value, options: WriteOptions) -> Result<WriteData> {
        self.observe("write", || {
            let path = self.check_path(identity, path)?;
            checks::check_item_size(
                &format!("{}{}", workspace_root(&identity.workspace_id), path),
                &value,
                options.metadata.as_ref(),
            )?;
            self.call(
                Endpoint::Write,
                &WriteRequest {
                    workspace_id: identity.workspace_id.clone(),
                    path,
                    value: Some(value),
                    user_id: identity.user_id.clone(),
                    options,
                },
            )
        })
    }

    /// Items under `path_prefix`, one page at a time
    pub fn read_tree(
        &self,
        identity: &Identity,
        path_prefix: &str,
        limit: Option<usize>,
        last_key: Option<&str>,
    ) -> Result<TreeData> {
        self.observe("readTree", || {
            self.check_identity(identity)?;
            let prefix = match checks::check_tree_prefix(path_prefix, &self.config.path)? {
                Some(validated) => {
                    check_scope(identity, validated.as_str())?;
                    validated.into_string()
                }
                None => "/".to_string(),
            };
            if limit == Some(0) {
                return Err(PathKvError::InvalidRequest("limit must be positive".to_string()));
            }
            self.call(
                Endpoint::ReadTree,
                &TreeRequest {
                    workspace_id: identity.workspace_id.clone(),
                    path_prefix: prefix,
                    limit,
                    last_key: last_key.map(str::to_string),
                    user_id: identity.user_id.clone(),
                },
            )
        })
    }

    /// Up to 25 reads and writes; see the handler for the atomicity contract
    pub fn batch(&self, identity: &Identity, operations: Vec<BatchOperation>) -> Result<BatchData> {
        self.observe("batch", || {
            self.check_identity(identity)?;
            checks::check_batch_shape(&operations)?;
            for op in &operations {
                checks::check_operation_fields(op)?;
                let path = self.check_path(identity, &op.path)?;
                if let (BatchOperationType::Write, Some(value)) = (op.op_type, &op.value) {
                    let key = format!("{}{}", workspace_root(&identity.workspace_id), path);
                    let metadata = op.options.as_ref().and_then(|o| o.metadata.as_ref());
                    checks::check_item_size(&key, value, metadata)?;
                }
            }
            self.call(
                Endpoint::Batch,
                &BatchRequest {
                    workspace_id: identity.workspace_id.clone(),
                    user_id: identity.user_id.clone(),
                    operations,
                },
            )
        })
    }

    // =========================================================================
    // Lifecycle and Introspection
    // =========================================================================

    pub fn health_check(&self) -> Result<HealthData> {
        self.observe("health", || self.call(Endpoint::Health, &Value::Null))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Release pooled connections; idempotent
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.pool.close();
            tracing::debug!("Client for {} disposed", self.endpoint);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Time `f` and record its outcome
    fn observe<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let started = Instant::now();
        let result = f();
        self.metrics
            .record(operation, started.elapsed(), result.as_ref().err().map(PathKvError::code));
        result
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(PathKvError::ClientDisposed);
        }
        Ok(())
    }

    fn check_identity(&self, identity: &Identity) -> Result<()> {
        self.ensure_active()?;
        checks::check_workspace_id(&identity.workspace_id)
    }

    /// Validated, normalized path inside the caller's reach
    fn check_path(&self, identity: &Identity, path: &str) -> Result<String> {
        self.check_identity(identity)?;
        let validated = checks::check_path(path, &self.config.path)?;
        check_scope(identity, validated.as_str())?;
        Ok(validated.into_string())
    }

    /// Encode, send with retries, and unwrap the envelope
    fn call<Req, Data>(&self, endpoint: Endpoint, request: &Req) -> Result<Data>
    where
        Req: Serialize,
        Data: DeserializeOwned,
    {
        self.ensure_active()?;
        let wire = WireRequest::json(endpoint, request)?;
        if wire.body.len() > MAX_PAYLOAD_SIZE {
            return Err(PathKvError::PayloadTooLarge {
                size: wire.body.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }

        self.retry
            .run(endpoint.name(), PathKvError::is_retryable, |_| self.attempt(&wire))
    }

    fn attempt<Data: DeserializeOwned>(&self, wire: &WireRequest) -> Result<Data> {
        self.ensure_active()?;

        let response = {
            let mut conn = self.pool.acquire()?;
            match conn.call(wire, self.config.timeout) {
                Ok(response) => response,
                Err(e) => {
                    conn.mark_unhealthy();
                    return Err(e);
                }
            }
        };

        let envelope: ApiResponse<Data> = response.parse()?;
        match envelope {
            ApiResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            ApiResponse {
                error: Some(body), ..
            } => Err(PathKvError::Remote(body)),
            _ => Err(PathKvError::Protocol(format!(
                "status {} response carries neither data nor error",
                response.status
            ))),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Explicit workspace keys must belong to the caller
fn check_scope(identity: &Identity, path: &str) -> Result<()> {
    let targets_workspace = path == WORKSPACE_ROOT_PREFIX || path.starts_with(&format!("{}/", WORKSPACE_ROOT_PREFIX));
    if targets_workspace {
        let constraints = WorkspaceConstraints::strict(identity.workspace_id.clone(), identity.user_id.clone());
        validate_workspace_boundary(path, &constraints).map_err(PathKvError::WorkspaceAccessDenied)?;
    }
    Ok(())
}
