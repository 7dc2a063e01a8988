//! Data model
//!
//! The stored unit ([`DataItem`]), write conditions, and the nullable-first
//! lookup result.
//!
//! Values are plain `serde_json::Value`s. Presence is modelled one level up:
//! a missing item is `None` / [`Lookup::NotFound`], while an item holding
//! `null` is `Some(item)` whose value is `Value::Null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Hard per-item limit of the backing engine
pub const ENGINE_ITEM_LIMIT_BYTES: usize = 400 * 1024;

/// Budget handlers enforce, leaving headroom below the engine limit
pub const SAFE_ITEM_SIZE_BYTES: usize = 350 * 1024;

/// Allowance for key, path and audit fields around the value
pub const AUDIT_OVERHEAD_BYTES: usize = 200;

/// Maximum number of items in one engine transaction
pub const TRANSACTION_ITEM_LIMIT: usize = 25;

/// A stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItem {
    /// Storage key (`/workspaces/{workspaceId}{path}` or a shared path)
    pub key: String,
    pub workspace_id: String,
    pub path: String,
    pub value: Value,
    pub version: u64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Everything needed to produce the next revision of an item
#[derive(Debug, Clone)]
pub struct Revision<'a> {
    pub key: &'a str,
    pub workspace_id: &'a str,
    pub path: &'a str,
    pub value: Value,
    pub user_id: Option<&'a str>,
    pub metadata: Option<&'a Map<String, Value>>,
    pub now: DateTime<Utc>,
}

impl DataItem {
    /// Build the item that a write of `revision` over `existing` produces
    ///
    /// Version is `existing + 1` (or 1), creation audit fields are preserved,
    /// update audit fields are refreshed, and metadata is shallow-merged with
    /// the caller's keys winning.
    pub fn next_revision(existing: Option<&DataItem>, revision: Revision<'_>) -> DataItem {
        let mut metadata = existing.map(|item| item.metadata.clone()).unwrap_or_default();
        if let Some(overlay) = revision.metadata {
            for (k, v) in overlay {
                metadata.insert(k.clone(), v.clone());
            }
        }

        let user = revision.user_id.map(str::to_string);
        match existing {
            Some(item) => DataItem {
                key: revision.key.to_string(),
                workspace_id: revision.workspace_id.to_string(),
                path: revision.path.to_string(),
                value: revision.value,
                version: item.version + 1,
                created_by: item.created_by.clone(),
                created_at: item.created_at,
                updated_by: user,
                updated_at: revision.now,
                metadata,
            },
            None => DataItem {
                key: revision.key.to_string(),
                workspace_id: revision.workspace_id.to_string(),
                path: revision.path.to_string(),
                value: revision.value,
                version: 1,
                created_by: user.clone(),
                created_at: revision.now,
                updated_by: user,
                updated_at: revision.now,
                metadata,
            },
        }
    }

    /// Serialized size of the whole item
    pub fn encoded_size(&self) -> Result<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

/// Estimated stored size of a write before the item is built
pub fn estimate_write_size(key: &str, value: &Value, metadata: Option<&Map<String, Value>>) -> Result<usize> {
    let value_len = serde_json::to_vec(value)?.len();
    let metadata_len = match metadata {
        Some(map) => serde_json::to_vec(map)?.len(),
        None => 0,
    };
    Ok(key.len() + value_len + metadata_len + AUDIT_OVERHEAD_BYTES)
}

/// Condition attached to a put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// The key must not exist yet
    NotExists,

    /// The stored version must equal this one
    VersionEquals(u64),
}

impl PutCondition {
    /// Condition that pins the state a write was computed from
    pub fn from_existing(existing: Option<&DataItem>) -> Self {
        match existing {
            Some(item) => PutCondition::VersionEquals(item.version),
            None => PutCondition::NotExists,
        }
    }

    pub fn holds(&self, current: Option<&DataItem>) -> bool {
        match (self, current) {
            (PutCondition::NotExists, None) => true,
            (PutCondition::NotExists, Some(_)) => false,
            (PutCondition::VersionEquals(v), Some(item)) => item.version == *v,
            (PutCondition::VersionEquals(_), None) => false,
        }
    }
}

/// One item of a transactional put
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalPut {
    pub item: DataItem,
    pub condition: Option<PutCondition>,
}

/// Result of a point read: found (possibly holding `null`) or not found
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found { value: Value, version: u64 },
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found { .. })
    }

    /// The stored value, `None` when absent (a stored `null` is `Some(Null)`)
    pub fn value(&self) -> Option<&Value> {
        match self {
            Lookup::Found { value, .. } => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn version(&self) -> Option<u64> {
        match self {
            Lookup::Found { version, .. } => Some(*version),
            Lookup::NotFound => None,
        }
    }
}

impl From<Option<DataItem>> for Lookup {
    fn from(item: Option<DataItem>) -> Self {
        match item {
            Some(item) => Lookup::Found {
                value: item.value,
                version: item.version,
            },
            None => Lookup::NotFound,
        }
    }
}
