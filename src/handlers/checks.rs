//! Request checks shared by the handlers and the client

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::TreeConfig;
use crate::error::{PathKvError, Result};
use crate::item::{estimate_write_size, DataItem, SAFE_ITEM_SIZE_BYTES, TRANSACTION_ITEM_LIMIT};
use crate::path::{
    create_validated_path, is_valid_workspace_id, PathErrorCode, PathValidationConfig,
    PathViolation, ValidatedPath,
};
use crate::protocol::{BatchOperation, BatchOperationType};

pub(crate) fn check_workspace_id(workspace_id: &str) -> Result<()> {
    if !is_valid_workspace_id(workspace_id) {
        return Err(PathKvError::InvalidRequest(format!(
            "workspaceId must be 1..=128 characters of [A-Za-z0-9_-], got '{}'",
            workspace_id
        )));
    }
    Ok(())
}

pub(crate) fn check_path(path: &str, config: &PathValidationConfig) -> Result<ValidatedPath> {
    create_validated_path(path, config)
}

/// Tree prefixes are paths without a trailing slash; `/` alone is the whole workspace
pub(crate) fn check_tree_prefix(prefix: &str, config: &PathValidationConfig) -> Result<Option<ValidatedPath>> {
    if prefix == "/" {
        return Ok(None);
    }
    if prefix.ends_with('/') {
        return Err(PathKvError::InvalidPath(PathViolation::new(
            PathErrorCode::InvalidPathFormat,
            format!("pathPrefix must not end with '/': {}", prefix),
        )));
    }
    check_path(prefix, config).map(Some)
}

/// Default when absent, clamp to the maximum, reject zero
pub(crate) fn check_tree_limit(limit: Option<usize>, config: &TreeConfig) -> Result<usize> {
    match limit {
        None => Ok(config.default_limit.min(config.max_limit)),
        Some(0) => Err(PathKvError::InvalidRequest("limit must be positive".to_string())),
        Some(n) => Ok(n.min(config.max_limit)),
    }
}

pub(crate) fn check_item_size(key: &str, value: &Value, metadata: Option<&Map<String, Value>>) -> Result<()> {
    let size = estimate_write_size(key, value, metadata)?;
    if size > SAFE_ITEM_SIZE_BYTES {
        return Err(PathKvError::ItemTooLarge {
            size,
            limit: SAFE_ITEM_SIZE_BYTES,
        });
    }
    Ok(())
}

/// Size of the item as it will be stored, after metadata from earlier
/// revisions has been merged in
pub(crate) fn check_stored_size(item: &DataItem) -> Result<()> {
    let size = item.encoded_size()?;
    if size > SAFE_ITEM_SIZE_BYTES {
        return Err(PathKvError::ItemTooLarge {
            size,
            limit: SAFE_ITEM_SIZE_BYTES,
        });
    }
    Ok(())
}

/// Operation count and id uniqueness
pub(crate) fn check_batch_shape(operations: &[BatchOperation]) -> Result<()> {
    if operations.is_empty() || operations.len() > TRANSACTION_ITEM_LIMIT {
        return Err(PathKvError::BatchSizeExceeded {
            count: operations.len(),
            max: TRANSACTION_ITEM_LIMIT,
        });
    }

    let mut ids = HashSet::with_capacity(operations.len());
    for op in operations {
        if op.id.is_empty() {
            return Err(PathKvError::InvalidOperation {
                id: op.id.clone(),
                reason: "operation id must not be empty".to_string(),
            });
        }
        if !ids.insert(op.id.as_str()) {
            return Err(PathKvError::DuplicateOperationId(op.id.clone()));
        }
    }
    Ok(())
}

/// Required fields per operation type
pub(crate) fn check_operation_fields(op: &BatchOperation) -> Result<()> {
    let missing = match op.op_type {
        BatchOperationType::Write if op.value.is_none() => Some("write requires a value"),
        BatchOperationType::ReadWithDefault if op.default_value.is_none() => {
            Some("readWithDefault requires a defaultValue")
        }
        _ => None,
    };
    match missing {
        Some(reason) => Err(PathKvError::InvalidOperation {
            id: op.id.clone(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
