//! Handlers Module
//!
//! Stateless operation handlers behind the wire protocol.
//!
//! ## Request Lifecycle
//! ```text
//!   Received ──► Validated ──► Executed ──► Responded
//!                   │              │
//!                   └── error ─────┴──► error envelope
//! ```
//!
//! Every handler re-validates its input (the client checks are advisory),
//! resolves caller paths to storage keys inside the caller's workspace, and
//! talks to the engine only through [`StoreAdapter`]. No state survives a call.

mod batch;
pub(crate) mod checks;
mod read;
mod tree;
mod write;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{PathKvError, Result};
use crate::path::{relative_path, resolve_key, WorkspaceConstraints};
use crate::store::StoreAdapter;

pub use batch::batch;
pub use read::{read, read_with_default};
pub use tree::read_tree;
pub use write::write;

/// Shared dependencies of every handler
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Arc<StoreAdapter>,
    pub config: Arc<Config>,
}

/// A caller path resolved against a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    /// Storage key
    pub key: String,

    /// Path relative to the workspace root (shared keys verbatim)
    pub path: String,
}

impl HandlerContext {
    pub fn new(store: Arc<StoreAdapter>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    /// Boundary constraints for a caller, rejecting malformed workspace ids
    pub(crate) fn constraints(&self, workspace_id: &str, user_id: Option<&str>) -> Result<WorkspaceConstraints> {
        checks::check_workspace_id(workspace_id)?;
        Ok(self.config.workspace_constraints(workspace_id, user_id))
    }

    /// Validate `path` and resolve it to a storage key
    pub(crate) fn resolve(&self, constraints: &WorkspaceConstraints, path: &str) -> Result<Target> {
        let validated = checks::check_path(path, &self.config.path)?;
        let key = resolve_key(validated.as_str(), constraints).map_err(PathKvError::WorkspaceAccessDenied)?;
        let path = relative_path(&key, &constraints.workspace_id).to_string();
        Ok(Target { key, path })
    }

    pub(crate) fn verbose(&self) -> bool {
        self.config.verbose_logging
    }
}
