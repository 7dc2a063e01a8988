//! Read and ReadWithDefault
//!
//! Both are strongly consistent point reads. A miss is a result
//! (`found: false`), never an error.

use serde_json::Value;

use crate::error::{PathKvError, Result};
use crate::item::DataItem;
use crate::protocol::{ReadData, ReadRequest, ReadWithDefaultRequest};

use super::HandlerContext;

pub fn read(ctx: &HandlerContext, request: &ReadRequest) -> Result<ReadData> {
    let constraints = ctx.constraints(&request.workspace_id, request.user_id.as_deref())?;
    let target = ctx.resolve(&constraints, &request.path)?;

    let item = ctx.store.get(&target.key, true)?;
    if ctx.verbose() {
        tracing::debug!(key = %target.key, found = item.is_some(), "read");
    }
    Ok(lookup_result(item))
}

pub fn read_with_default(ctx: &HandlerContext, request: &ReadWithDefaultRequest) -> Result<ReadData> {
    let default_value = request
        .default_value
        .clone()
        .ok_or_else(|| PathKvError::InvalidRequest("defaultValue is required".to_string()))?;
    let constraints = ctx.constraints(&request.workspace_id, request.user_id.as_deref())?;
    let target = ctx.resolve(&constraints, &request.path)?;

    let item = ctx.store.get(&target.key, true)?;
    if ctx.verbose() {
        tracing::debug!(key = %target.key, found = item.is_some(), "readWithDefault");
    }
    Ok(defaulted_result(item, default_value))
}

/// Plain lookup: the stored value, or `null` with `found: false`
pub(crate) fn lookup_result(item: Option<DataItem>) -> ReadData {
    match item {
        Some(item) => ReadData {
            value: item.value,
            found: true,
            default_used: false,
            version: Some(item.version),
        },
        None => ReadData {
            value: Value::Null,
            found: false,
            default_used: false,
            version: None,
        },
    }
}

/// Missing items and stored `null`s both fall back to `default_value`
pub(crate) fn defaulted_result(item: Option<DataItem>, default_value: Value) -> ReadData {
    let mut data = lookup_result(item);
    if data.value.is_null() {
        data.value = default_value;
        data.default_used = true;
    }
    data
}
