//! Error types for PathKV
//!
//! Provides a unified error type for all operations, together with the
//! category taxonomy that drives HTTP-style status codes and retry decisions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::PathViolation;

/// Result type alias using PathKvError
pub type Result<T> = std::result::Result<T, PathKvError>;

/// Error categories shared by handlers and the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authorization,
    Conflict,
    SizeLimit,
    Throttling,
    TransactionFailure,
    NotFound,
    ServerError,
}

impl ErrorCategory {
    /// Whether errors of this category are worth retrying
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Throttling | ErrorCategory::ServerError)
    }

    /// HTTP-style status code for this category
    pub fn status(self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::Authorization => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict | ErrorCategory::TransactionFailure => 409,
            ErrorCategory::SizeLimit => 413,
            ErrorCategory::Throttling => 429,
            ErrorCategory::ServerError => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::SizeLimit => "size_limit",
            ErrorCategory::Throttling => "throttling",
            ErrorCategory::TransactionFailure => "transaction_failure",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by a remote handler, as carried in the response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Unified error type for PathKV operations
#[derive(Debug, Error)]
pub enum PathKvError {
    // -------------------------------------------------------------------------
    // I/O and Serialization Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Invalid path: {0}")]
    InvalidPath(PathViolation),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid operation '{id}': {reason}")]
    InvalidOperation { id: String, reason: String },

    #[error("Batch size {count} outside allowed range 1..={max}")]
    BatchSizeExceeded { count: usize, max: usize },

    #[error("Duplicate operation id: {0}")]
    DuplicateOperationId(String),

    // -------------------------------------------------------------------------
    // Authorization Errors
    // -------------------------------------------------------------------------
    #[error("Workspace access denied: {0}")]
    WorkspaceAccessDenied(PathViolation),

    // -------------------------------------------------------------------------
    // Conflict Errors
    // -------------------------------------------------------------------------
    #[error("Version conflict on {path}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        path: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("Item does not exist: {0}")]
    ItemNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    // -------------------------------------------------------------------------
    // Size Limit Errors
    // -------------------------------------------------------------------------
    #[error("Item too large: {size} bytes (max {limit})")]
    ItemTooLarge { size: usize, limit: usize },

    #[error("Payload too large: {size} bytes (max {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No pooled connection available within {0:?}")]
    PoolExhausted(Duration),

    #[error("{} ({}): {}", .0.code, .0.category, .0.message)]
    Remote(ErrorBody),

    // -------------------------------------------------------------------------
    // Lifecycle and Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Client has been disposed")]
    ClientDisposed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PathKvError {
    /// Stable machine-readable code for the wire and for metrics
    pub fn code(&self) -> &str {
        match self {
            PathKvError::Io(_) => "NETWORK_ERROR",
            PathKvError::Json(_) => "SERIALIZATION_ERROR",
            PathKvError::InvalidPath(_) => "INVALID_PATH",
            PathKvError::InvalidRequest(_) => "INVALID_REQUEST",
            PathKvError::InvalidCursor(_) => "INVALID_CURSOR",
            PathKvError::InvalidOperation { .. } => "INVALID_OPERATION",
            PathKvError::BatchSizeExceeded { .. } => "BATCH_SIZE_EXCEEDED",
            PathKvError::DuplicateOperationId(_) => "DUPLICATE_OPERATION_ID",
            PathKvError::WorkspaceAccessDenied(_) => "WORKSPACE_ACCESS_DENIED",
            PathKvError::VersionConflict { .. } => "VERSION_CONFLICT",
            PathKvError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            PathKvError::TransactionFailed(_) => "TRANSACTION_FAILED",
            PathKvError::ItemTooLarge { .. } => "ITEM_TOO_LARGE",
            PathKvError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            PathKvError::Throttled(_) => "THROTTLED",
            PathKvError::TableNotFound(_) => "TABLE_NOT_FOUND",
            PathKvError::Internal(_) => "INTERNAL_ERROR",
            PathKvError::Network(_) => "NETWORK_ERROR",
            PathKvError::ConnectionFailed(_) => "CONNECTION_FAILED",
            PathKvError::Timeout(_) => "TIMEOUT",
            PathKvError::Protocol(_) => "PROTOCOL_ERROR",
            PathKvError::PoolExhausted(_) => "POOL_EXHAUSTED",
            PathKvError::Remote(body) => &body.code,
            PathKvError::ClientDisposed => "CLIENT_DISPOSED",
            PathKvError::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Category in the shared error taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            PathKvError::InvalidPath(_)
            | PathKvError::InvalidRequest(_)
            | PathKvError::InvalidCursor(_)
            | PathKvError::InvalidOperation { .. }
            | PathKvError::BatchSizeExceeded { .. }
            | PathKvError::DuplicateOperationId(_)
            | PathKvError::ClientDisposed
            | PathKvError::Config(_) => ErrorCategory::Validation,
            PathKvError::WorkspaceAccessDenied(_) => ErrorCategory::Authorization,
            PathKvError::VersionConflict { .. } | PathKvError::ItemNotFound(_) => {
                ErrorCategory::Conflict
            }
            PathKvError::TransactionFailed(_) => ErrorCategory::TransactionFailure,
            PathKvError::ItemTooLarge { .. } | PathKvError::PayloadTooLarge { .. } => {
                ErrorCategory::SizeLimit
            }
            PathKvError::Throttled(_) => ErrorCategory::Throttling,
            PathKvError::TableNotFound(_) => ErrorCategory::NotFound,
            PathKvError::Remote(body) => body.category,
            PathKvError::Io(_)
            | PathKvError::Json(_)
            | PathKvError::Internal(_)
            | PathKvError::Network(_)
            | PathKvError::ConnectionFailed(_)
            | PathKvError::Timeout(_)
            | PathKvError::Protocol(_)
            | PathKvError::PoolExhausted(_) => ErrorCategory::ServerError,
        }
    }

    /// Whether a retry could plausibly succeed
    ///
    /// Follows the category, except for deterministic failures that happen to
    /// land in `server_error` (malformed JSON or frames) and remote errors,
    /// whose flag is taken from the handler.
    pub fn is_retryable(&self) -> bool {
        match self {
            PathKvError::Json(_) | PathKvError::Protocol(_) => false,
            PathKvError::Remote(body) => body.retryable,
            other => other.category().is_retryable(),
        }
    }

    /// HTTP-style status code
    pub fn status(&self) -> u16 {
        self.category().status()
    }

    /// Structured details attached to the wire error body
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            PathKvError::InvalidPath(violation) | PathKvError::WorkspaceAccessDenied(violation) => {
                Some(serde_json::json!({
                    "validationCode": violation.code,
                    "severity": violation.severity,
                }))
            }
            PathKvError::VersionConflict { expected, actual, .. } => Some(serde_json::json!({
                "expectedVersion": expected,
                "currentVersion": actual,
            })),
            PathKvError::ItemTooLarge { size, limit }
            | PathKvError::PayloadTooLarge { size, limit } => Some(serde_json::json!({
                "sizeBytes": size,
                "limitBytes": limit,
            })),
            PathKvError::InvalidOperation { id, .. } => {
                Some(serde_json::json!({ "operationId": id }))
            }
            PathKvError::Remote(body) => body.details.clone(),
            _ => None,
        }
    }

    /// Render this error as a wire error body
    pub fn to_body(&self) -> ErrorBody {
        match self {
            PathKvError::Remote(body) => body.clone(),
            other => ErrorBody {
                code: other.code().to_string(),
                message: other.to_string(),
                category: other.category(),
                retryable: other.is_retryable(),
                details: other.details(),
            },
        }
    }
}
