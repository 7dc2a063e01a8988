//! Path normalization
//!
//! Pure string transformations; no rule checking happens here.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

/// Options for [`normalize_path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop a trailing `/` (the root `/` is never stripped)
    pub strip_trailing_slash: bool,

    /// Case-fold every segment to lowercase
    pub lowercase: bool,

    /// Normalize to Unicode composed form (NFC)
    pub unicode_nfc: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_trailing_slash: true,
            lowercase: false,
            unicode_nfc: true,
        }
    }
}

/// Normalize a path
///
/// Collapses repeated slashes, drops `.` segments, and applies the optional
/// trailing-slash, case and Unicode transformations. `..` segments are kept
/// as-is so that validation can still see them. The result always starts
/// with `/` and normalizing it again yields the same string.
pub fn normalize_path(path: &str, options: &NormalizeOptions) -> String {
    let composed: Cow<'_, str> = if options.unicode_nfc && !path.is_ascii() {
        Cow::Owned(path.nfc().collect())
    } else {
        Cow::Borrowed(path)
    };

    let folded: Cow<'_, str> = if options.lowercase {
        Cow::Owned(composed.to_lowercase())
    } else {
        composed
    };

    let segments: Vec<&str> = folded
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut normalized = String::with_capacity(folded.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }

    if !options.strip_trailing_slash && folded.ends_with('/') {
        normalized.push('/');
    }

    normalized
}

/// Ordered, non-empty segments of a path
pub fn get_path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}
