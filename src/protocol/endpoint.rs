//! Endpoint definitions
//!
//! One endpoint per operation.

use std::fmt;

/// Endpoint codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Endpoint {
    Read = 0x01,
    ReadWithDefault = 0x02,
    Write = 0x03,
    ReadTree = 0x04,
    Batch = 0x05,
    Health = 0x06,
}

impl Endpoint {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Endpoint::Read),
            0x02 => Some(Endpoint::ReadWithDefault),
            0x03 => Some(Endpoint::Write),
            0x04 => Some(Endpoint::ReadTree),
            0x05 => Some(Endpoint::Batch),
            0x06 => Some(Endpoint::Health),
            _ => None,
        }
    }

    /// Operation name as reported in response metadata
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Read => "read",
            Endpoint::ReadWithDefault => "readWithDefault",
            Endpoint::Write => "write",
            Endpoint::ReadTree => "readTree",
            Endpoint::Batch => "batch",
            Endpoint::Health => "health",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
