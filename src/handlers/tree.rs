//! Tree (prefix query)
//!
//! Returns the item at a prefix and its descendants as `{relativePath: value}`.
//! Matching is on whole segments: `/docs` covers `/docs` and `/docs/a` but
//! not `/docsx`.
//!
//! ## Paging
//! ```text
//!   scan(page) ──► collect ──► limit reached? ──► hasMore + cursor
//!        ▲             │
//!        │             ▼
//!        └──── budget left and engine has more
//! ```
//!
//! The engine is scanned page by page (eventually consistent) until the
//! limit is met, the engine runs dry, or the internal time budget is spent.
//! Running out of budget is not an error: the partial result comes back with
//! `hasMore: true` and a cursor to resume from. Exceeding the soft SLA only
//! logs a warning.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::error::{PathKvError, Result};
use crate::path::{relative_path, resolve_key};
use crate::protocol::{TreeData, TreeRequest};
use crate::store::ScanCursor;

use super::{checks, HandlerContext};

pub fn read_tree(ctx: &HandlerContext, request: &TreeRequest) -> Result<TreeData> {
    let started = Instant::now();
    let tree = &ctx.config.tree;

    let limit = checks::check_tree_limit(request.limit, tree)?;
    let constraints = ctx.constraints(&request.workspace_id, request.user_id.as_deref())?;
    let prefix = checks::check_tree_prefix(&request.path_prefix, &ctx.config.path)?;
    let root = prefix.as_ref().map_or("/", |p| p.as_str());
    let base_key = resolve_key(root, &constraints).map_err(PathKvError::WorkspaceAccessDenied)?;
    let descendants = format!("{}/", base_key);
    // Nothing is stored at the workspace root itself
    let scan_prefix = match prefix {
        Some(_) => base_key.clone(),
        None => descendants.clone(),
    };
    let in_tree = |key: &str| key == base_key || key.starts_with(&descendants);

    let mut cursor = match request.last_key.as_deref() {
        Some(token) => {
            let cursor = ScanCursor::decode(token)?;
            if !cursor.key().starts_with(&scan_prefix) {
                return Err(PathKvError::InvalidCursor(format!(
                    "cursor does not belong to prefix {}",
                    request.path_prefix
                )));
            }
            Some(cursor)
        }
        None => None,
    };

    let mut items = BTreeMap::new();
    let mut pages = 0usize;
    let has_more = loop {
        let remaining = limit - items.len();
        let page = ctx
            .store
            .scan_prefix(&scan_prefix, remaining.min(tree.page_size.max(1)), cursor.as_ref())?;
        pages += 1;

        for item in page.items.into_iter().filter(|item| in_tree(&item.key)) {
            let path = relative_path(&item.key, &constraints.workspace_id).to_string();
            items.insert(path, item.value);
        }
        cursor = page.next_cursor;

        if cursor.is_none() {
            break false;
        }
        if items.len() >= limit {
            break true;
        }
        if started.elapsed() >= tree.time_budget {
            tracing::debug!(
                prefix = %scan_prefix,
                collected = items.len(),
                pages,
                "Tree scan budget spent, returning partial result"
            );
            break true;
        }
    };

    let elapsed = started.elapsed();
    if elapsed > tree.sla {
        tracing::warn!(
            prefix = %scan_prefix,
            elapsed_ms = elapsed.as_millis() as u64,
            sla_ms = tree.sla.as_millis() as u64,
            "Tree query exceeded SLA"
        );
    }
    if ctx.verbose() {
        tracing::debug!(prefix = %scan_prefix, items = items.len(), pages, has_more, "readTree");
    }

    Ok(TreeData {
        item_count: items.len(),
        items,
        has_more,
        last_key: cursor.filter(|_| has_more).map(|c| c.encode()),
    })
}
