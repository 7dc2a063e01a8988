//! Batch
//!
//! Up to 25 reads and writes against one workspace.
//!
//! ## Execution
//! ```text
//!   pre-validate (whole batch)
//!        │
//!        ├──► transact_get(read keys) ─────────► read results
//!        │
//!        └──► transact_get(write keys)
//!                  │
//!                  ├── version / existence check fails ──► that op fails
//!                  │
//!                  └──► transact_put(survivors) ──► all commit, or all fail
//! ```
//!
//! Reads observe the state before the batch's writes. Results come back in
//! request order.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::error::{PathKvError, Result};
use crate::item::{ConditionalPut, DataItem, PutCondition, Revision};
use crate::protocol::{
    BatchData, BatchOperation, BatchOperationResult, BatchOperationType, BatchRequest,
    BatchSummary, ReadData, WriteData, WriteOptions,
};

use super::read::{defaulted_result, lookup_result};
use super::write::check_preconditions;
use super::{checks, HandlerContext, Target};

/// A validated operation with its resolved target
struct Planned<'a> {
    op: &'a BatchOperation,
    target: Target,
}

enum Outcome {
    Read(ReadData),
    Write(WriteData),
    Failed(PathKvError),
}

pub fn batch(ctx: &HandlerContext, request: &BatchRequest) -> Result<BatchData> {
    let plan = validate(ctx, request)?;

    let mut outcomes: HashMap<&str, Outcome> = HashMap::with_capacity(plan.len());
    execute_reads(ctx, &plan, &mut outcomes);
    execute_writes(ctx, request, &plan, &mut outcomes);

    let mut summary = BatchSummary {
        total: plan.len(),
        ..BatchSummary::default()
    };
    let results = plan
        .iter()
        .map(|planned| {
            let outcome = outcomes.remove(planned.op.id.as_str()).unwrap_or_else(|| {
                Outcome::Failed(PathKvError::Internal(format!(
                    "operation {} produced no result",
                    planned.op.id
                )))
            });
            if planned.op.op_type.is_read() {
                summary.reads += 1;
            } else {
                summary.writes += 1;
            }
            let result = to_result(planned, outcome);
            if result.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            result
        })
        .collect();

    if ctx.verbose() {
        tracing::debug!(
            workspace = %request.workspace_id,
            total = summary.total,
            failed = summary.failed,
            "batch"
        );
    }

    Ok(BatchData { results, summary })
}

// =============================================================================
// Validation
// =============================================================================

fn validate<'a>(ctx: &HandlerContext, request: &'a BatchRequest) -> Result<Vec<Planned<'a>>> {
    checks::check_batch_shape(&request.operations)?;
    let constraints = ctx.constraints(&request.workspace_id, request.user_id.as_deref())?;

    let mut write_keys = HashSet::new();
    let mut plan = Vec::with_capacity(request.operations.len());
    for op in &request.operations {
        checks::check_operation_fields(op)?;
        let target = ctx.resolve(&constraints, &op.path)?;

        if op.op_type == BatchOperationType::Write {
            if let Some(value) = &op.value {
                let metadata = op.options.as_ref().and_then(|o| o.metadata.as_ref());
                checks::check_item_size(&target.key, value, metadata)?;
            }
            if !write_keys.insert(target.key.clone()) {
                return Err(PathKvError::InvalidOperation {
                    id: op.id.clone(),
                    reason: format!("{} is written more than once in this batch", target.path),
                });
            }
        }

        plan.push(Planned { op, target });
    }
    Ok(plan)
}

// =============================================================================
// Execution
// =============================================================================

/// Unique keys of `planned`, in first-seen order
fn unique_keys<'a, I>(planned: I) -> Vec<String>
where
    I: Iterator<Item = &'a Planned<'a>>,
{
    let mut seen = HashSet::new();
    planned
        .filter(|p| seen.insert(p.target.key.as_str()))
        .map(|p| p.target.key.clone())
        .collect()
}

/// Fetch `keys` in one transaction, keyed by storage key
fn fetch(ctx: &HandlerContext, keys: &[String]) -> Result<HashMap<String, Option<DataItem>>> {
    let items = ctx.store.transact_get(keys)?;
    Ok(keys.iter().cloned().zip(items).collect())
}

fn execute_reads<'a>(ctx: &HandlerContext, plan: &'a [Planned<'a>], outcomes: &mut HashMap<&'a str, Outcome>) {
    let reads: Vec<&Planned> = plan.iter().filter(|p| p.op.op_type.is_read()).collect();
    if reads.is_empty() {
        return;
    }

    let keys = unique_keys(reads.iter().copied());
    match fetch(ctx, &keys) {
        Ok(found) => {
            for planned in reads {
                let item = found.get(&planned.target.key).cloned().flatten();
                let data = match (&planned.op.op_type, &planned.op.default_value) {
                    (BatchOperationType::ReadWithDefault, Some(default)) => {
                        defaulted_result(item, default.clone())
                    }
                    _ => lookup_result(item),
                };
                outcomes.insert(planned.op.id.as_str(), Outcome::Read(data));
            }
        }
        Err(e) => {
            tracing::warn!("Batch read transaction failed: {}", e);
            for planned in reads {
                outcomes.insert(planned.op.id.as_str(), Outcome::Failed(copy_error(&e)));
            }
        }
    }
}

fn execute_writes<'a>(
    ctx: &HandlerContext,
    request: &BatchRequest,
    plan: &'a [Planned<'a>],
    outcomes: &mut HashMap<&'a str, Outcome>,
) {
    let writes: Vec<&Planned> = plan.iter().filter(|p| !p.op.op_type.is_read()).collect();
    if writes.is_empty() {
        return;
    }

    let keys = unique_keys(writes.iter().copied());
    let existing = match fetch(ctx, &keys) {
        Ok(existing) => existing,
        Err(e) => {
            tracing::warn!("Batch write pre-read failed: {}", e);
            for planned in writes {
                outcomes.insert(planned.op.id.as_str(), Outcome::Failed(copy_error(&e)));
            }
            return;
        }
    };

    let now = Utc::now();
    let default_options = WriteOptions::default();
    let mut staged: Vec<(&Planned, ConditionalPut, bool)> = Vec::with_capacity(writes.len());
    for planned in writes {
        let current = existing.get(&planned.target.key).and_then(Option::as_ref);
        let options = planned.op.options.as_ref().unwrap_or(&default_options);
        if let Err(e) = check_preconditions(&planned.target.path, current, options) {
            outcomes.insert(planned.op.id.as_str(), Outcome::Failed(e));
            continue;
        }

        let item = DataItem::next_revision(
            current,
            Revision {
                key: &planned.target.key,
                workspace_id: &request.workspace_id,
                path: &planned.target.path,
                value: planned.op.value.clone().unwrap_or_default(),
                user_id: request.user_id.as_deref(),
                metadata: options.metadata.as_ref(),
                now,
            },
        );
        if let Err(e) = checks::check_stored_size(&item) {
            outcomes.insert(planned.op.id.as_str(), Outcome::Failed(e));
            continue;
        }
        let put = ConditionalPut {
            item,
            condition: Some(PutCondition::from_existing(current)),
        };
        staged.push((planned, put, current.is_none()));
    }

    if staged.is_empty() {
        return;
    }

    let puts: Vec<ConditionalPut> = staged.iter().map(|(_, put, _)| put.clone()).collect();
    match ctx.store.transact_put(&puts) {
        Ok(()) => {
            for (planned, put, created) in staged {
                outcomes.insert(
                    planned.op.id.as_str(),
                    Outcome::Write(WriteData {
                        value: put.item.value,
                        version: put.item.version,
                        created,
                    }),
                );
            }
        }
        Err(e) => {
            tracing::warn!(writes = staged.len(), "Batch write transaction failed: {}", e);
            for (planned, _, _) in staged {
                outcomes.insert(
                    planned.op.id.as_str(),
                    Outcome::Failed(PathKvError::TransactionFailed(e.to_string())),
                );
            }
        }
    }
}

/// Fan one failure out to several operations
fn copy_error(e: &PathKvError) -> PathKvError {
    PathKvError::Remote(e.to_body())
}

fn to_result(planned: &Planned<'_>, outcome: Outcome) -> BatchOperationResult {
    let mut result = BatchOperationResult {
        id: planned.op.id.clone(),
        op_type: planned.op.op_type,
        path: planned.target.path.clone(),
        success: true,
        value: None,
        found: None,
        default_used: None,
        version: None,
        created: None,
        error: None,
    };
    match outcome {
        Outcome::Read(data) => {
            result.value = Some(data.value);
            result.found = Some(data.found);
            result.default_used = Some(data.default_used);
            result.version = data.version;
        }
        Outcome::Write(data) => {
            result.value = Some(data.value);
            result.version = Some(data.version);
            result.created = Some(data.created);
        }
        Outcome::Failed(e) => {
            result.success = false;
            result.error = Some(e.to_body());
        }
    }
    result
}
