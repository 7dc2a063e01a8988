//! In-memory engine
//!
//! A non-durable reference engine with the same contract as a hosted
//! key-value service: conditional single-item writes, ordered prefix scans,
//! and bounded all-or-nothing transactions.
//!
//! ## Concurrency
//! - `items`: one RwLock over a BTreeMap (ordered keys give prefix scans)
//! - Transactions take the write lock once, check every condition, then apply
//! - `faults`: queued failures popped by the next matching engine calls
//!   (tests only)

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::item::{ConditionalPut, DataItem, PutCondition, ENGINE_ITEM_LIMIT_BYTES, TRANSACTION_ITEM_LIMIT};

use super::{EngineConnection, EngineError, EngineErrorKind, EngineResult, EngineScan, KvEngine};

/// Engine calls, for targeted fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Get,
    Put,
    Scan,
    TransactGet,
    TransactPut,
}

/// A queued failure; `op: None` hits whichever call comes next
#[derive(Debug, Clone, Copy)]
struct Fault {
    op: Option<EngineOp>,
    kind: EngineErrorKind,
}

/// Shared state behind every connection
struct MemoryShared {
    table_name: String,
    items: RwLock<BTreeMap<String, DataItem>>,
    faults: Mutex<VecDeque<Fault>>,
    connections_opened: AtomicU64,
}

impl MemoryShared {
    /// Pop the head fault if it targets `op`
    fn next_fault(&self, op: EngineOp) -> EngineResult<()> {
        let mut faults = self.faults.lock();
        match faults.front() {
            Some(fault) if fault.op.map_or(true, |target| target == op) => {
                let kind = fault.kind;
                faults.pop_front();
                Err(EngineError::new(kind, format!("injected fault on {:?}", op)))
            }
            _ => Ok(()),
        }
    }
}

/// In-process key-value engine
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<MemoryShared>,
}

impl MemoryEngine {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(MemoryShared {
                table_name: table_name.into(),
                items: RwLock::new(BTreeMap::new()),
                faults: Mutex::new(VecDeque::new()),
                connections_opened: AtomicU64::new(0),
            }),
        }
    }

    /// Make the next `count` engine calls fail with `kind`
    pub fn inject_faults(&self, kind: EngineErrorKind, count: usize) {
        self.queue_faults(None, kind, count);
    }

    /// Make the next `count` calls of `op` fail with `kind`
    ///
    /// Other calls pass through untouched while the fault waits at the head
    /// of the queue.
    pub fn inject_faults_on(&self, op: EngineOp, kind: EngineErrorKind, count: usize) {
        self.queue_faults(Some(op), kind, count);
    }

    fn queue_faults(&self, op: Option<EngineOp>, kind: EngineErrorKind, count: usize) {
        let mut faults = self.shared.faults.lock();
        faults.extend(std::iter::repeat(Fault { op, kind }).take(count));
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.shared.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.items.read().is_empty()
    }

    /// Connections opened so far (for testing and debugging)
    pub fn connections_opened(&self) -> u64 {
        self.shared.connections_opened.load(Ordering::Relaxed)
    }

    /// Raw item by key, bypassing connections (for testing and debugging)
    pub fn peek(&self, key: &str) -> Option<DataItem> {
        self.shared.items.read().get(key).cloned()
    }
}

impl KvEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    fn table_name(&self) -> &str {
        &self.shared.table_name
    }

    fn connect(&self) -> EngineResult<Box<dyn EngineConnection>> {
        self.shared.connections_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            healthy: AtomicBool::new(true),
        }))
    }
}

struct MemoryConnection {
    shared: Arc<MemoryShared>,
    healthy: AtomicBool,
}

impl MemoryConnection {
    /// Pop an injected fault; a server error breaks the connection
    fn check_fault(&self, op: EngineOp) -> EngineResult<()> {
        self.shared.next_fault(op).map_err(|e| {
            if e.kind.taints_connection() {
                self.healthy.store(false, Ordering::Relaxed);
            }
            e
        })
    }

    fn check_size(item: &DataItem) -> EngineResult<()> {
        let size = serde_json::to_vec(item)
            .map_err(|e| EngineError::new(EngineErrorKind::Validation, e.to_string()))?
            .len();
        if size > ENGINE_ITEM_LIMIT_BYTES {
            return Err(EngineError::new(
                EngineErrorKind::Validation,
                format!(
                    "item size {} exceeds engine limit {}",
                    size, ENGINE_ITEM_LIMIT_BYTES
                ),
            ));
        }
        Ok(())
    }

    fn check_transaction_size(count: usize) -> EngineResult<()> {
        if count == 0 || count > TRANSACTION_ITEM_LIMIT {
            return Err(EngineError::new(
                EngineErrorKind::Validation,
                format!(
                    "transaction must contain 1..={} items, got {}",
                    TRANSACTION_ITEM_LIMIT, count
                ),
            ));
        }
        Ok(())
    }
}

impl EngineConnection for MemoryConnection {
    fn get(&mut self, key: &str, _consistent: bool) -> EngineResult<Option<DataItem>> {
        self.check_fault(EngineOp::Get)?;
        Ok(self.shared.items.read().get(key).cloned())
    }

    fn put(&mut self, item: &DataItem, condition: Option<PutCondition>) -> EngineResult<()> {
        self.check_fault(EngineOp::Put)?;
        Self::check_size(item)?;

        let mut items = self.shared.items.write();
        let current = items.get(&item.key);
        if let Some(condition) = condition {
            if !condition.holds(current) {
                return Err(EngineError::condition_failed(
                    &item.key,
                    current.map(|i| i.version),
                ));
            }
        }
        items.insert(item.key.clone(), item.clone());
        Ok(())
    }

    fn scan(&mut self, prefix: &str, limit: usize, start_after: Option<&str>) -> EngineResult<EngineScan> {
        self.check_fault(EngineOp::Scan)?;
        if limit == 0 {
            return Err(EngineError::new(
                EngineErrorKind::Validation,
                "scan limit must be positive",
            ));
        }

        let items = self.shared.items.read();
        let lower = match start_after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut matching = items
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, item)| item);

        let page: Vec<DataItem> = matching.by_ref().take(limit).cloned().collect();
        let last_evaluated_key = match matching.next() {
            Some(_) => page.last().map(|item| item.key.clone()),
            None => None,
        };

        Ok(EngineScan {
            items: page,
            last_evaluated_key,
        })
    }

    fn transact_get(&mut self, keys: &[String]) -> EngineResult<Vec<Option<DataItem>>> {
        self.check_fault(EngineOp::TransactGet)?;
        Self::check_transaction_size(keys.len())?;

        let items = self.shared.items.read();
        Ok(keys.iter().map(|key| items.get(key).cloned()).collect())
    }

    fn transact_put(&mut self, puts: &[ConditionalPut]) -> EngineResult<()> {
        self.check_fault(EngineOp::TransactPut)?;
        Self::check_transaction_size(puts.len())?;

        let mut seen = HashSet::with_capacity(puts.len());
        for put in puts {
            if !seen.insert(put.item.key.as_str()) {
                return Err(EngineError::new(
                    EngineErrorKind::Validation,
                    format!("transaction touches {} more than once", put.item.key),
                ));
            }
            Self::check_size(&put.item)?;
        }

        let mut items = self.shared.items.write();

        // Check every condition before applying anything
        let failed: Vec<&str> = puts
            .iter()
            .filter(|put| match put.condition {
                Some(condition) => !condition.holds(items.get(&put.item.key)),
                None => false,
            })
            .map(|put| put.item.key.as_str())
            .collect();
        if !failed.is_empty() {
            return Err(EngineError::new(
                EngineErrorKind::TransactionCanceled,
                format!("conditional check failed for: {}", failed.join(", ")),
            ));
        }

        for put in puts {
            items.insert(put.item.key.clone(), put.item.clone());
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}
