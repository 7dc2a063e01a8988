//! Connection Pool
//!
//! A bounded pool of reusable connections shared by the store adapter
//! (engine connections) and the client (transport connections).
//!
//! ## Design
//! - Idle connections sit in a bounded crossbeam channel (the freelist)
//! - `total` counts every live connection, idle or leased, and never
//!   exceeds `max_size`
//! - A lease is returned on drop; connections that are unhealthy (reported
//!   by the connection itself or marked by the caller) are dropped instead
//!   of being put back, which frees their slot
//! - After `close()` every returned connection is dropped

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::error::{PathKvError, Result};

/// How long a waiter sleeps between attempts to claim a freed slot
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Something the pool can hand out and take back
pub trait Poolable: Send {
    /// Whether the connection can be reused
    fn is_healthy(&self) -> bool;
}

type Factory<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

/// Bounded, thread-safe connection pool
pub struct Pool<C: Poolable> {
    max_size: usize,
    acquire_timeout: Duration,
    idle_tx: Sender<C>,
    idle_rx: Receiver<C>,
    factory: Factory<C>,
    total: AtomicUsize,
    closed: AtomicBool,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub max_size: usize,
    pub total: usize,
    pub idle: usize,
    pub created: u64,
    pub reused: u64,
    pub discarded: u64,
}

impl<C: Poolable> Pool<C> {
    /// Create an empty pool; connections are created lazily by `factory`
    pub fn new<F>(max_size: usize, acquire_timeout: Duration, factory: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let max_size = max_size.max(1);
        let (idle_tx, idle_rx) = channel::bounded(max_size);
        Self {
            max_size,
            acquire_timeout,
            idle_tx,
            idle_rx,
            factory: Box::new(factory),
            total: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Lease a connection
    ///
    /// Order of preference:
    /// 1. an idle, healthy connection
    /// 2. a new connection, if below `max_size`
    /// 3. wait up to `acquire_timeout` for one of the above
    pub fn acquire(&self) -> Result<PoolGuard<'_, C>> {
        let deadline = Instant::now() + self.acquire_timeout;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(PathKvError::ConnectionFailed(
                    "connection pool is closed".to_string(),
                ));
            }

            // Step 1: reuse an idle connection
            match self.idle_rx.try_recv() {
                Ok(conn) => {
                    if conn.is_healthy() {
                        self.reused.fetch_add(1, Ordering::Relaxed);
                        return Ok(PoolGuard::new(self, conn));
                    }
                    self.discard(conn);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            // Step 2: claim a free slot and connect
            if self.try_reserve_slot() {
                return match (self.factory)() {
                    Ok(conn) => {
                        self.created.fetch_add(1, Ordering::Relaxed);
                        Ok(PoolGuard::new(self, conn))
                    }
                    Err(e) => {
                        self.total.fetch_sub(1, Ordering::AcqRel);
                        Err(e)
                    }
                };
            }

            // Step 3: wait for a release
            let now = Instant::now();
            if now >= deadline {
                return Err(PathKvError::PoolExhausted(self.acquire_timeout));
            }
            let wait = (deadline - now).min(WAIT_POLL_INTERVAL);
            if let Ok(conn) = self.idle_rx.recv_timeout(wait) {
                if conn.is_healthy() {
                    self.reused.fetch_add(1, Ordering::Relaxed);
                    return Ok(PoolGuard::new(self, conn));
                }
                self.discard(conn);
            }
        }
    }

    /// Close the pool and drop every idle connection
    ///
    /// Leased connections are dropped when their guards are released.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        while let Ok(conn) = self.idle_rx.try_recv() {
            self.discard(conn);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_size: self.max_size,
            total: self.total.load(Ordering::Acquire),
            idle: self.idle_rx.len(),
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn try_reserve_slot(&self) -> bool {
        self.total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_size).then_some(n + 1)
            })
            .is_ok()
    }

    fn release(&self, conn: C, healthy: bool) {
        if !healthy || !conn.is_healthy() || self.is_closed() {
            self.discard(conn);
            return;
        }
        if let Err(e) = self.idle_tx.try_send(conn) {
            self.discard(e.into_inner());
        }
    }

    fn discard(&self, conn: C) {
        drop(conn);
        self.total.fetch_sub(1, Ordering::AcqRel);
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// A leased connection, returned to the pool on drop
pub struct PoolGuard<'a, C: Poolable> {
    pool: &'a Pool<C>,
    conn: Option<C>,
    healthy: bool,
}

impl<'a, C: Poolable> PoolGuard<'a, C> {
    fn new(pool: &'a Pool<C>, conn: C) -> Self {
        Self {
            pool,
            conn: Some(conn),
            healthy: true,
        }
    }

    /// Drop this connection on release instead of reusing it
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }
}

impl<C: Poolable> Deref for PoolGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        // Only `Drop` takes the connection out
        self.conn.as_ref().unwrap_or_else(|| unreachable!("pool guard used after release"))
    }
}

impl<C: Poolable> DerefMut for PoolGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("pool guard used after release"))
    }
}

impl<C: Poolable> Drop for PoolGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.healthy);
        }
    }
}
