//! Path validator
//!
//! Ordered rule evaluation for caller-supplied paths.

use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::error::{PathKvError, Result};

use super::normalize::{get_path_segments, normalize_path, NormalizeOptions};
use super::{PathErrorCode, PathViolation};

/// Default maximum path length in UTF-8 bytes
pub const DEFAULT_MAX_LENGTH_BYTES: usize = 1024;

/// Default maximum number of segments
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A caller-supplied rule: the path must match `pattern`
#[derive(Debug, Clone)]
pub struct PathRule {
    pub pattern: Regex,
    pub message: String,
}

impl PathRule {
    /// Compile a rule; an invalid pattern is a configuration error
    pub fn new(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PathKvError::Config(format!("invalid path rule '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern,
            message: message.into(),
        })
    }
}

/// Configuration for [`validate_path`]
#[derive(Debug, Clone)]
pub struct PathValidationConfig {
    /// Maximum path length in UTF-8 bytes
    pub max_length_bytes: usize,

    /// Maximum number of segments
    pub max_depth: usize,

    /// Accept non-ASCII characters (normalized to NFC when accepted)
    pub allow_unicode: bool,

    /// Prefixes no caller may write under, matched per segment, case-insensitively
    pub reserved_prefixes: Vec<String>,

    /// Extra rules, checked last
    pub custom_rules: Vec<PathRule>,
}

impl Default for PathValidationConfig {
    fn default() -> Self {
        Self {
            max_length_bytes: DEFAULT_MAX_LENGTH_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
            allow_unicode: true,
            reserved_prefixes: vec!["/system".to_string(), "/admin".to_string()],
            custom_rules: Vec::new(),
        }
    }
}

impl PathValidationConfig {
    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            unicode_nfc: self.allow_unicode,
            ..NormalizeOptions::default()
        }
    }
}

/// Facts about a path gathered during validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMetadata {
    pub segments: Vec<String>,
    pub depth: usize,
    pub length_bytes: usize,
    pub encoding: &'static str,
}

/// Outcome of [`validate_path`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathValidation {
    pub is_valid: bool,
    pub normalized_path: Option<String>,
    pub error: Option<PathViolation>,
    pub metadata: PathMetadata,
}

impl PathValidation {
    fn rejected(violation: PathViolation, metadata: PathMetadata) -> Self {
        Self {
            is_valid: false,
            normalized_path: None,
            error: Some(violation),
            metadata,
        }
    }

    /// Convert into the normalized path or the violation that rejected it
    pub fn into_result(self) -> std::result::Result<ValidatedPath, PathViolation> {
        match (self.normalized_path, self.error) {
            (Some(path), None) => Ok(ValidatedPath(path)),
            (_, Some(violation)) => Err(violation),
            (None, None) => Err(PathViolation::new(
                PathErrorCode::InvalidPathFormat,
                "path was not validated",
            )),
        }
    }
}

/// A normalized path that passed every rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidatedPath(String);

impl ValidatedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ValidatedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a path against `config`
///
/// Rules, in order (first failure wins):
/// 1. non-empty, starts with `/`, no control characters, at least one segment
/// 2. no `.` or `..` segment
/// 3. no reserved prefix and no hidden (dot-prefixed) segment
/// 4. byte length of the normalized path within `max_length_bytes`
/// 5. depth within `max_depth`
/// 6. ASCII only unless `allow_unicode`
/// 7. every custom rule matches
pub fn validate_path(path: &str, config: &PathValidationConfig) -> PathValidation {
    let segments = get_path_segments(path);
    let normalized = normalize_path(path, &config.normalize_options());
    let metadata = PathMetadata {
        segments: segments.iter().map(|s| s.to_string()).collect(),
        depth: segments.len(),
        length_bytes: normalized.len(),
        encoding: "utf-8",
    };

    if let Some(violation) = check_rules(path, &normalized, &segments, config) {
        return PathValidation::rejected(violation, metadata);
    }

    PathValidation {
        is_valid: true,
        normalized_path: Some(normalized),
        error: None,
        metadata,
    }
}

/// Validate and normalize, or fail with a typed error carrying the code
pub fn create_validated_path(path: &str, config: &PathValidationConfig) -> Result<ValidatedPath> {
    validate_path(path, config)
        .into_result()
        .map_err(PathKvError::InvalidPath)
}

fn check_rules(
    path: &str,
    normalized: &str,
    segments: &[&str],
    config: &PathValidationConfig,
) -> Option<PathViolation> {
    // Rule 1: format
    if path.is_empty() {
        return Some(PathViolation::new(
            PathErrorCode::InvalidPathFormat,
            "path must not be empty",
        ));
    }
    if !path.starts_with('/') {
        return Some(PathViolation::new(
            PathErrorCode::InvalidPathFormat,
            format!("path must start with '/': {}", path),
        ));
    }
    if path.chars().any(char::is_control) {
        return Some(PathViolation::new(
            PathErrorCode::InvalidPathFormat,
            "path must not contain control characters",
        ));
    }
    if segments.is_empty() {
        return Some(PathViolation::new(
            PathErrorCode::InvalidPathFormat,
            "path must contain at least one segment",
        ));
    }

    // Rule 2: traversal, including backslash-separated forms inside a segment
    let traversal = segments.iter().any(|segment| {
        *segment == "."
            || *segment == ".."
            || segment.split('\\').any(|part| part == "..")
    });
    if traversal {
        return Some(PathViolation::new(
            PathErrorCode::PathTraversalDetected,
            format!("path traversal segment in {}", path),
        ));
    }

    // Rule 3: reserved prefixes and hidden segments
    if let Some(prefix) = config
        .reserved_prefixes
        .iter()
        .find(|prefix| has_reserved_prefix(segments, prefix))
    {
        return Some(PathViolation::new(
            PathErrorCode::ReservedPathPrefix,
            format!("path uses reserved prefix {}", prefix),
        ));
    }
    if let Some(hidden) = segments.iter().find(|segment| segment.starts_with('.')) {
        return Some(PathViolation::new(
            PathErrorCode::ReservedPathPrefix,
            format!("hidden segment '{}' is reserved", hidden),
        ));
    }

    // Rule 4: byte length, measured on what gets stored
    if normalized.len() > config.max_length_bytes {
        return Some(PathViolation::new(
            PathErrorCode::PathTooLong,
            format!(
                "path is {} bytes (max {})",
                normalized.len(),
                config.max_length_bytes
            ),
        ));
    }

    // Rule 5: depth
    if segments.len() > config.max_depth {
        return Some(PathViolation::new(
            PathErrorCode::PathTooDeep,
            format!("path has {} segments (max {})", segments.len(), config.max_depth),
        ));
    }

    // Rule 6: encoding
    if !config.allow_unicode && !path.is_ascii() {
        return Some(PathViolation::new(
            PathErrorCode::InvalidPathEncoding,
            "non-ASCII characters are not allowed",
        ));
    }

    // Rule 7: custom rules
    config
        .custom_rules
        .iter()
        .find(|rule| !rule.pattern.is_match(path))
        .map(|rule| PathViolation::new(PathErrorCode::CustomRuleViolation, rule.message.clone()))
}

fn has_reserved_prefix(segments: &[&str], prefix: &str) -> bool {
    let reserved = get_path_segments(prefix);
    if reserved.is_empty() || reserved.len() > segments.len() {
        return false;
    }
    reserved
        .iter()
        .zip(segments)
        .all(|(r, s)| r.eq_ignore_ascii_case(s))
}
