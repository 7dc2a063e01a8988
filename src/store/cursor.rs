//! Scan cursors
//!
//! Opaque pagination tokens wrapping the engine's continuation key.
//!
//! ## Token Format
//! ```text
//!   base64url(key) "." crc32(key) as 8 hex digits
//! ```
//! The checksum catches truncated or hand-edited tokens before they reach
//! the engine.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::{PathKvError, Result};

/// Continuation point of a prefix scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    key: String,
}

impl ScanCursor {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Engine key the next page starts after
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn encode(&self) -> String {
        let checksum = crc32fast::hash(self.key.as_bytes());
        format!("{}.{:08x}", URL_SAFE_NO_PAD.encode(self.key.as_bytes()), checksum)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let (body, checksum) = token
            .split_once('.')
            .ok_or_else(|| PathKvError::InvalidCursor("malformed cursor".to_string()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| PathKvError::InvalidCursor("cursor is not valid base64".to_string()))?;

        let expected = u32::from_str_radix(checksum, 16)
            .map_err(|_| PathKvError::InvalidCursor("malformed cursor checksum".to_string()))?;
        if crc32fast::hash(&bytes) != expected {
            return Err(PathKvError::InvalidCursor("cursor checksum mismatch".to_string()));
        }

        let key = String::from_utf8(bytes)
            .map_err(|_| PathKvError::InvalidCursor("cursor is not valid UTF-8".to_string()))?;
        Ok(Self { key })
    }
}
