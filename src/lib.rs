//! # PathKV
//!
//! A hierarchical, workspace-isolated key-value data layer with:
//! - Path validation, normalization and workspace boundary enforcement
//! - Optimistic concurrency control on every write
//! - Atomic multi-item batches bounded by the engine's 25-item transactions
//! - Paginated prefix (tree) queries under a latency budget
//! - A nullable-first value model: a stored `null` is not a missing item
//! - A resilient client with pooling, retries and metrics
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                               │
//! │        (validation, retries, pooling, metrics)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  framed JSON (TCP or in-process)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Service                               │
//! │          read │ readWithDefault │ write │ tree │ batch       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │    Path     │          │ StoreAdapter │
//!   │  Validator  │          │ (pool+retry) │
//!   └─────────────┘          └──────┬───────┘
//!                                   │
//!                                   ▼
//!                           ┌──────────────┐
//!                           │   KvEngine   │
//!                           │  (memory)    │
//!                           └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod path;
pub mod item;
pub mod pool;
pub mod retry;
pub mod store;
pub mod protocol;
pub mod handlers;
pub mod service;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::{Client, ClientConfig, Identity, LocalConnector, TcpConnector};
pub use config::Config;
pub use error::{ErrorCategory, PathKvError, Result};
pub use item::{DataItem, Lookup};
pub use service::Service;
pub use store::{MemoryEngine, StoreAdapter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PathKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
