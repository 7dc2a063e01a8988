//! Workspace boundary enforcement
//!
//! Every storage key lives either under a workspace root
//! (`/workspaces/{workspaceId}`) or, in non-strict mode, under one of the
//! configured shared prefixes. Anything else is a boundary violation, and the
//! check fails closed when the constraints themselves are malformed.

use super::{PathErrorCode, PathViolation};

/// Key prefix under which every workspace root lives
pub const WORKSPACE_ROOT_PREFIX: &str = "/workspaces";

/// Maximum workspace id length in bytes
const MAX_WORKSPACE_ID_BYTES: usize = 128;

/// Identity and policy for a boundary check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConstraints {
    pub workspace_id: String,
    pub user_id: Option<String>,

    /// Only the caller's own workspace root is reachable
    pub strict_mode: bool,

    /// Shared prefixes reachable in non-strict mode (e.g. `/global/`)
    pub allowed_prefixes: Vec<String>,
}

impl WorkspaceConstraints {
    /// Strict constraints for a single workspace
    pub fn strict(workspace_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id,
            strict_mode: true,
            allowed_prefixes: Vec::new(),
        }
    }

    fn shared_prefix_for(&self, path: &str) -> Option<&str> {
        if self.strict_mode {
            return None;
        }
        self.allowed_prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| is_under(path, prefix))
    }
}

/// Workspace ids are 1..=128 bytes of `[A-Za-z0-9_-]`
pub fn is_valid_workspace_id(workspace_id: &str) -> bool {
    !workspace_id.is_empty()
        && workspace_id.len() <= MAX_WORKSPACE_ID_BYTES
        && workspace_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Root key of a workspace
pub fn workspace_root(workspace_id: &str) -> String {
    format!("{}/{}", WORKSPACE_ROOT_PREFIX, workspace_id)
}

/// Check that a (normalized) key is reachable under `constraints`
pub fn validate_workspace_boundary(
    path: &str,
    constraints: &WorkspaceConstraints,
) -> Result<(), PathViolation> {
    if !is_valid_workspace_id(&constraints.workspace_id) {
        return Err(PathViolation::new(
            PathErrorCode::WorkspaceBoundaryViolation,
            format!("invalid workspace id '{}'", constraints.workspace_id),
        ));
    }

    if is_under(path, &workspace_root(&constraints.workspace_id)) {
        return Ok(());
    }

    if constraints.shared_prefix_for(path).is_some() {
        return Ok(());
    }

    Err(PathViolation::new(
        PathErrorCode::WorkspaceBoundaryViolation,
        format!(
            "{} is outside workspace {}",
            path, constraints.workspace_id
        ),
    ))
}

/// Resolve a normalized caller path to a storage key and check the boundary
///
/// - paths under `/workspaces` are taken as absolute keys
/// - in non-strict mode, paths under an allowed shared prefix are kept verbatim
/// - everything else is scoped under the caller's workspace root
pub fn resolve_key(path: &str, constraints: &WorkspaceConstraints) -> Result<String, PathViolation> {
    let key = if is_under(path, WORKSPACE_ROOT_PREFIX) || constraints.shared_prefix_for(path).is_some() {
        path.to_string()
    } else if path == "/" {
        workspace_root(&constraints.workspace_id)
    } else {
        format!("{}{}", workspace_root(&constraints.workspace_id), path)
    };

    validate_workspace_boundary(&key, constraints)?;
    Ok(key)
}

/// Path of a key relative to its workspace root; shared keys are returned as-is
pub fn relative_path<'a>(key: &'a str, workspace_id: &str) -> &'a str {
    let root = workspace_root(workspace_id);
    match key.strip_prefix(root.as_str()) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => key,
    }
}

/// `path` equals `prefix` or lies below it on a segment boundary
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
