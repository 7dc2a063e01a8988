//! Service
//!
//! Routes a request frame to its handler and wraps the outcome in the
//! response envelope.
//!
//! ## Flow
//! ```text
//!   WireRequest ──► decode JSON ──► handler ──► ApiResponse ──► WireResponse
//!                       │              │
//!                       └── error ─────┴──► { success: false, error } + status
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{PathKvError, Result};
use crate::handlers::{self, HandlerContext};
use crate::protocol::{
    ApiResponse, BatchRequest, Endpoint, HealthData, ReadRequest, ReadWithDefaultRequest,
    ResponseMetadata, TreeRequest, WireRequest, WireResponse, WriteRequest, MAX_PAYLOAD_SIZE,
};
use crate::store::{KvEngine, StoreAdapter};

/// Request fields echoed into the response metadata
pub trait RequestScope {
    fn workspace_id(&self) -> Option<&str> {
        None
    }

    fn path(&self) -> Option<&str> {
        None
    }

    fn path_prefix(&self) -> Option<&str> {
        None
    }
}

impl RequestScope for ReadRequest {
    fn workspace_id(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }
}

impl RequestScope for ReadWithDefaultRequest {
    fn workspace_id(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }
}

impl RequestScope for WriteRequest {
    fn workspace_id(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }

    fn path(&self) -> Option<&str> {
        Some(&self.path)
    }
}

impl RequestScope for TreeRequest {
    fn workspace_id(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }

    fn path_prefix(&self) -> Option<&str> {
        Some(&self.path_prefix)
    }
}

impl RequestScope for BatchRequest {
    fn workspace_id(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }
}

/// Health requests and undecodable bodies carry no scope
struct Unscoped;

impl RequestScope for Unscoped {}

/// Entry point for every endpoint
pub struct Service {
    ctx: HandlerContext,
}

impl Service {
    /// Build a service over `engine`
    pub fn new(config: Config, engine: Arc<dyn KvEngine>) -> Self {
        let store = Arc::new(StoreAdapter::new(engine, &config.store));
        Self::with_context(HandlerContext::new(store, Arc::new(config)))
    }

    pub fn with_context(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Handle one request frame
    pub fn handle(&self, request: &WireRequest) -> WireResponse {
        let started = Instant::now();
        let ctx = &self.ctx;
        match request.endpoint {
            Endpoint::Read => self.dispatch(request, started, handlers::read),
            Endpoint::ReadWithDefault => self.dispatch(request, started, handlers::read_with_default),
            Endpoint::Write => self.dispatch(request, started, handlers::write),
            Endpoint::ReadTree => self.dispatch(request, started, handlers::read_tree),
            Endpoint::Batch => self.dispatch(request, started, handlers::batch),
            Endpoint::Health => {
                let outcome = Ok(self.health());
                respond(ctx, request.endpoint, &Unscoped, outcome, started)
            }
        }
    }

    /// Engine, table and pool status
    pub fn health(&self) -> HealthData {
        let store = &self.ctx.store;
        HealthData {
            status: "ok".to_string(),
            version: crate::VERSION.to_string(),
            engine: store.engine_name().to_string(),
            table_name: store.table_name().to_string(),
            pool: store.pool_stats(),
        }
    }

    /// Release pooled engine connections
    pub fn close(&self) {
        self.ctx.store.close();
    }

    fn dispatch<Req, Data, H>(&self, request: &WireRequest, started: Instant, handler: H) -> WireResponse
    where
        Req: DeserializeOwned + RequestScope,
        Data: Serialize,
        H: Fn(&HandlerContext, &Req) -> Result<Data>,
    {
        let decoded: Req = match serde_json::from_slice(&request.body) {
            Ok(decoded) => decoded,
            Err(e) => {
                let err = PathKvError::InvalidRequest(format!("malformed {} request: {}", request.endpoint, e));
                return respond::<Data, _>(&self.ctx, request.endpoint, &Unscoped, Err(err), started);
            }
        };
        let outcome = handler(&self.ctx, &decoded);
        respond(&self.ctx, request.endpoint, &decoded, outcome, started)
    }
}

/// Build the envelope and frame it
fn respond<Data, S>(
    ctx: &HandlerContext,
    endpoint: Endpoint,
    scope: &S,
    outcome: Result<Data>,
    started: Instant,
) -> WireResponse
where
    Data: Serialize,
    S: RequestScope + ?Sized,
{
    let metadata = ResponseMetadata {
        operation: endpoint.name().to_string(),
        workspace_id: scope.workspace_id().map(str::to_string),
        path: scope.path().map(str::to_string),
        path_prefix: scope.path_prefix().map(str::to_string),
        timestamp: Utc::now(),
        duration_ms: started.elapsed().as_millis() as u64,
    };

    let (status, envelope) = match outcome {
        Ok(data) => (
            200,
            ApiResponse {
                success: true,
                data: Some(data),
                error: None,
                metadata,
            },
        ),
        Err(e) => {
            log_failure(ctx, endpoint, &e);
            (
                e.status(),
                ApiResponse {
                    success: false,
                    data: None,
                    error: Some(e.to_body()),
                    metadata,
                },
            )
        }
    };

    match serde_json::to_vec(&envelope) {
        Ok(body) if body.len() <= MAX_PAYLOAD_SIZE => WireResponse::new(status, body),
        Ok(body) => {
            let err = PathKvError::PayloadTooLarge {
                size: body.len(),
                limit: MAX_PAYLOAD_SIZE,
            };
            respond::<(), _>(ctx, endpoint, scope, Err(err), started)
        }
        Err(e) => {
            tracing::error!("Failed to encode {} response: {}", endpoint, e);
            let body = br#"{"success":false,"error":{"code":"INTERNAL_ERROR","message":"response encoding failed","category":"server_error","retryable":false}}"#;
            WireResponse::new(500, body.to_vec())
        }
    }
}

fn log_failure(ctx: &HandlerContext, endpoint: Endpoint, e: &PathKvError) {
    match e.status() {
        500 => tracing::error!(operation = %endpoint, code = e.code(), "{}", e),
        403 => tracing::warn!(operation = %endpoint, code = e.code(), "{}", e),
        _ if ctx.verbose() => tracing::debug!(operation = %endpoint, code = e.code(), "{}", e),
        _ => {}
    }
}
