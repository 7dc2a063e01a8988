//! Store Adapter
//!
//! Pooled, retrying front end over a [`KvEngine`].
//!
//! ## Responsibilities
//! - Lease engine connections from a bounded pool
//! - Retry throttled and server-side failures with exponential backoff
//! - Map engine errors onto the crate error taxonomy
//! - Enforce the 25-item transaction cap before calling the engine

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{PathKvError, Result};
use crate::item::{ConditionalPut, DataItem, PutCondition, TRANSACTION_ITEM_LIMIT};
use crate::pool::{Pool, PoolStats, Poolable};
use crate::retry::RetryPolicy;

use super::{EngineConnection, EngineError, EngineErrorKind, EngineResult, KvEngine, ScanCursor};

impl Poolable for Box<dyn EngineConnection> {
    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

/// One page of a prefix scan with an opaque continuation
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<DataItem>,
    pub next_cursor: Option<ScanCursor>,
}

/// Front end over the backing engine
///
/// ## Concurrency
/// All methods take `&self`; the pool hands each call its own connection.
pub struct StoreAdapter {
    engine: Arc<dyn KvEngine>,
    pool: Pool<Box<dyn EngineConnection>>,
    retry: RetryPolicy,
}

impl StoreAdapter {
    pub fn new(engine: Arc<dyn KvEngine>, config: &StoreConfig) -> Self {
        let factory_engine = Arc::clone(&engine);
        let pool = Pool::new(config.pool_size, config.acquire_timeout, move || {
            factory_engine.connect().map_err(classify_engine_error)
        });
        let retry = RetryPolicy::exponential(config.max_retries, config.base_delay)
            .with_max_delay(config.max_delay)
            .with_jitter(config.jitter);

        Self { engine, pool, retry }
    }

    /// Single-item read
    pub fn get(&self, key: &str, consistent: bool) -> Result<Option<DataItem>> {
        self.execute("get", |conn| conn.get(key, consistent))
    }

    /// Single-item write, optionally conditional
    ///
    /// A failed condition surfaces as [`PathKvError::VersionConflict`].
    pub fn conditional_put(&self, item: &DataItem, condition: Option<PutCondition>) -> Result<()> {
        self.execute("put", |conn| conn.put(item, condition))
    }

    /// One page of items under `prefix`, eventually consistent
    pub fn scan_prefix(&self, prefix: &str, limit: usize, cursor: Option<&ScanCursor>) -> Result<ScanPage> {
        let start_after = cursor.map(ScanCursor::key);
        let scan = self.execute("scan", |conn| conn.scan(prefix, limit, start_after))?;
        Ok(ScanPage {
            items: scan.items,
            next_cursor: scan.last_evaluated_key.map(ScanCursor::new),
        })
    }

    /// All-or-nothing read of up to 25 keys, positional results
    pub fn transact_get(&self, keys: &[String]) -> Result<Vec<Option<DataItem>>> {
        check_transaction_size(keys.len())?;
        self.execute("transact_get", |conn| conn.transact_get(keys))
    }

    /// All-or-nothing write of up to 25 items
    pub fn transact_put(&self, puts: &[ConditionalPut]) -> Result<()> {
        check_transaction_size(puts.len())?;
        self.execute("transact_put", |conn| conn.transact_put(puts))
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn table_name(&self) -> &str {
        self.engine.table_name()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Drop every pooled connection; later calls fail
    pub fn close(&self) {
        self.pool.close();
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run `op` on a leased connection under the retry policy
    fn execute<T, F>(&self, label: &str, op: F) -> Result<T>
    where
        F: Fn(&mut dyn EngineConnection) -> EngineResult<T>,
    {
        self.retry.run(label, PathKvError::is_retryable, |_| {
            let mut conn = self.pool.acquire()?;
            match op(&mut **conn) {
                Ok(value) => Ok(value),
                Err(e) => {
                    if e.kind.taints_connection() {
                        tracing::debug!("Discarding engine connection after {}", e);
                        conn.mark_unhealthy();
                    }
                    Err(classify_engine_error(e))
                }
            }
        })
    }
}

fn check_transaction_size(count: usize) -> Result<()> {
    if count == 0 || count > TRANSACTION_ITEM_LIMIT {
        return Err(PathKvError::InvalidRequest(format!(
            "transaction must contain 1..={} items, got {}",
            TRANSACTION_ITEM_LIMIT, count
        )));
    }
    Ok(())
}

/// Map an engine failure onto the crate error taxonomy
pub(crate) fn classify_engine_error(e: EngineError) -> PathKvError {
    match e.kind {
        EngineErrorKind::Throttling => PathKvError::Throttled(e.message),
        EngineErrorKind::Validation => PathKvError::InvalidRequest(e.message),
        EngineErrorKind::NotFound => PathKvError::TableNotFound(e.message),
        EngineErrorKind::ConditionFailed => PathKvError::VersionConflict {
            path: e.key.unwrap_or_default(),
            expected: None,
            actual: e.current_version,
        },
        EngineErrorKind::TransactionCanceled => PathKvError::TransactionFailed(e.message),
        EngineErrorKind::ServerError => PathKvError::Internal(e.message),
    }
}
