//! Path Module
//!
//! Validation, normalization, and workspace scoping for hierarchical paths.
//!
//! ## Responsibilities
//! - Reject malformed, traversal, reserved, oversized and over-deep paths
//! - Normalize paths (slash collapsing, `.` removal, NFC, case folding)
//! - Enforce workspace boundaries and turn caller paths into storage keys
//!
//! ## Key Layout
//! ```text
//!   caller path          /docs/readme
//!   workspace root       /workspaces/{workspaceId}
//!   storage key          /workspaces/{workspaceId}/docs/readme
//! ```
//!
//! Rules are evaluated in a fixed order and the first failing rule wins, so
//! every rejected path carries exactly one code and severity.

mod boundary;
mod normalize;
mod validator;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use boundary::{
    is_valid_workspace_id, relative_path, resolve_key, validate_workspace_boundary,
    workspace_root, WorkspaceConstraints, WORKSPACE_ROOT_PREFIX,
};
pub use normalize::{get_path_segments, normalize_path, NormalizeOptions};
pub use validator::{
    create_validated_path, validate_path, PathMetadata, PathRule, PathValidation,
    PathValidationConfig, ValidatedPath, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LENGTH_BYTES,
};

/// Why a path was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathErrorCode {
    InvalidPathFormat,
    PathTraversalDetected,
    ReservedPathPrefix,
    PathTooLong,
    PathTooDeep,
    InvalidPathEncoding,
    CustomRuleViolation,
    WorkspaceBoundaryViolation,
}

impl PathErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            PathErrorCode::InvalidPathFormat => "INVALID_PATH_FORMAT",
            PathErrorCode::PathTraversalDetected => "PATH_TRAVERSAL_DETECTED",
            PathErrorCode::ReservedPathPrefix => "RESERVED_PATH_PREFIX",
            PathErrorCode::PathTooLong => "PATH_TOO_LONG",
            PathErrorCode::PathTooDeep => "PATH_TOO_DEEP",
            PathErrorCode::InvalidPathEncoding => "INVALID_PATH_ENCODING",
            PathErrorCode::CustomRuleViolation => "CUSTOM_RULE_VIOLATION",
            PathErrorCode::WorkspaceBoundaryViolation => "WORKSPACE_BOUNDARY_VIOLATION",
        }
    }

    /// Security-relevant codes are CRITICAL, everything else is ERROR
    pub fn severity(self) -> Severity {
        match self {
            PathErrorCode::PathTraversalDetected
            | PathErrorCode::ReservedPathPrefix
            | PathErrorCode::WorkspaceBoundaryViolation => Severity::Critical,
            _ => Severity::Error,
        }
    }
}

/// Severity of a path violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Critical,
}

/// A single failed path rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathViolation {
    pub code: PathErrorCode,
    pub severity: Severity,
    pub message: String,
}

impl PathViolation {
    pub fn new(code: PathErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}
