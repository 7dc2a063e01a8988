//! Store Module
//!
//! Abstraction over the backing key-value engine.
//!
//! ## Responsibilities
//! - Define the engine primitives the data layer relies on
//!   ([`KvEngine`] / [`EngineConnection`])
//! - Pool engine connections and retry throttled calls ([`StoreAdapter`])
//! - Classify engine failures into the crate error taxonomy
//! - Provide an in-process reference engine ([`MemoryEngine`])
//!
//! ## Engine Primitives
//! ```text
//!   get(key, consistent)          single item, optionally strongly consistent
//!   put(item, condition)          single item, conditional
//!   scan(prefix, limit, after)    ordered prefix scan, eventually consistent
//!   transact_get(keys)            up to 25 items, all-or-nothing
//!   transact_put(puts)            up to 25 items, all-or-nothing
//! ```

mod adapter;
mod cursor;
mod memory;

use std::fmt;

use thiserror::Error;

use crate::item::{ConditionalPut, DataItem, PutCondition};

pub use adapter::{ScanPage, StoreAdapter};
pub use cursor::ScanCursor;
pub use memory::{EngineOp, MemoryEngine};

/// Result type for raw engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failure classes reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Request rate exceeded; retry with backoff
    Throttling,

    /// The engine rejected the request shape (limits, duplicate keys, ...)
    Validation,

    /// The table does not exist
    NotFound,

    /// A single-item condition did not hold
    ConditionFailed,

    /// A transaction was cancelled; nothing was applied
    TransactionCanceled,

    /// Anything else on the engine side
    ServerError,
}

impl EngineErrorKind {
    /// Whether the connection that produced this error should be discarded
    pub fn taints_connection(self) -> bool {
        matches!(self, EngineErrorKind::ServerError)
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineErrorKind::Throttling => "throttling",
            EngineErrorKind::Validation => "validation",
            EngineErrorKind::NotFound => "not_found",
            EngineErrorKind::ConditionFailed => "condition_failed",
            EngineErrorKind::TransactionCanceled => "transaction_canceled",
            EngineErrorKind::ServerError => "server_error",
        };
        f.write_str(name)
    }
}

/// An error returned by an engine call
#[derive(Debug, Clone, Error)]
#[error("engine {kind}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,

    /// Key the error refers to, when there is one
    pub key: Option<String>,

    /// Stored version at the time a condition failed
    pub current_version: Option<u64>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            key: None,
            current_version: None,
        }
    }

    pub fn condition_failed(key: &str, current_version: Option<u64>) -> Self {
        Self {
            kind: EngineErrorKind::ConditionFailed,
            message: format!("condition check failed for {}", key),
            key: Some(key.to_string()),
            current_version,
        }
    }
}

/// One page of a prefix scan
#[derive(Debug, Clone, Default)]
pub struct EngineScan {
    pub items: Vec<DataItem>,

    /// Set when more matching items follow the last returned one
    pub last_evaluated_key: Option<String>,
}

/// A backing key-value engine
pub trait KvEngine: Send + Sync {
    /// Engine implementation name, for health reporting
    fn name(&self) -> &str;

    /// Table (or collection) this engine serves
    fn table_name(&self) -> &str;

    /// Open a new connection
    fn connect(&self) -> EngineResult<Box<dyn EngineConnection>>;
}

/// A connection to a backing engine
pub trait EngineConnection: Send {
    fn get(&mut self, key: &str, consistent: bool) -> EngineResult<Option<DataItem>>;

    fn put(&mut self, item: &DataItem, condition: Option<PutCondition>) -> EngineResult<()>;

    /// Items whose key starts with `prefix`, in key order, after `start_after`
    fn scan(&mut self, prefix: &str, limit: usize, start_after: Option<&str>) -> EngineResult<EngineScan>;

    /// Results are positional: one entry per requested key
    fn transact_get(&mut self, keys: &[String]) -> EngineResult<Vec<Option<DataItem>>>;

    fn transact_put(&mut self, puts: &[ConditionalPut]) -> EngineResult<()>;

    fn is_healthy(&self) -> bool {
        true
    }
}
