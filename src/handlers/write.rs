//! Write
//!
//! Read-check-conditional-write. The put is conditioned on the version that
//! was read (or on the key not existing), so a concurrent writer surfaces as
//! `VERSION_CONFLICT` instead of a lost update. Conflicts are returned to the
//! caller and never retried here.

use chrono::Utc;

use crate::error::{PathKvError, Result};
use crate::item::{DataItem, PutCondition, Revision};
use crate::protocol::{WriteData, WriteOptions, WriteRequest};

use super::{checks, HandlerContext};

pub fn write(ctx: &HandlerContext, request: &WriteRequest) -> Result<WriteData> {
    let value = request.value.clone().ok_or_else(|| {
        PathKvError::InvalidRequest("value is required (send null to clear)".to_string())
    })?;
    let constraints = ctx.constraints(&request.workspace_id, request.user_id.as_deref())?;
    let target = ctx.resolve(&constraints, &request.path)?;
    checks::check_item_size(&target.key, &value, request.options.metadata.as_ref())?;

    let existing = ctx.store.get(&target.key, true)?;
    check_preconditions(&target.path, existing.as_ref(), &request.options)?;

    let item = DataItem::next_revision(
        existing.as_ref(),
        Revision {
            key: &target.key,
            workspace_id: &request.workspace_id,
            path: &target.path,
            value,
            user_id: request.user_id.as_deref(),
            metadata: request.options.metadata.as_ref(),
            now: Utc::now(),
        },
    );
    checks::check_stored_size(&item)?;

    let read_version = existing.as_ref().map(|item| item.version);
    ctx.store
        .conditional_put(&item, Some(PutCondition::from_existing(existing.as_ref())))
        .map_err(|e| match e {
            PathKvError::VersionConflict { actual, .. } => {
                tracing::debug!(key = %target.key, ?read_version, ?actual, "Lost write race");
                PathKvError::VersionConflict {
                    path: target.path.clone(),
                    expected: request.options.expected_version.or(read_version),
                    actual,
                }
            }
            other => other,
        })?;

    if ctx.verbose() {
        tracing::debug!(key = %target.key, version = item.version, "write");
    }

    Ok(WriteData {
        value: item.value,
        version: item.version,
        created: existing.is_none(),
    })
}

/// `expectedVersion` must match exactly; `requireVersion` needs an existing item
pub(crate) fn check_preconditions(path: &str, existing: Option<&DataItem>, options: &WriteOptions) -> Result<()> {
    if let Some(expected) = options.expected_version {
        let actual = existing.map(|item| item.version);
        if actual != Some(expected) {
            return Err(PathKvError::VersionConflict {
                path: path.to_string(),
                expected: Some(expected),
                actual,
            });
        }
    }

    if options.require_version && existing.is_none() {
        return Err(PathKvError::ItemNotFound(path.to_string()));
    }

    Ok(())
}
