//! Frame definitions
//!
//! Raw requests and responses as they travel over a connection.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

use super::Endpoint;

/// A request frame: endpoint plus JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub endpoint: Endpoint,
    pub body: Vec<u8>,
}

impl WireRequest {
    pub fn new(endpoint: Endpoint, body: Vec<u8>) -> Self {
        Self { endpoint, body }
    }

    /// Serialize `payload` as the JSON body
    pub fn json<T: Serialize>(endpoint: Endpoint, payload: &T) -> Result<Self> {
        Ok(Self {
            endpoint,
            body: serde_json::to_vec(payload)?,
        })
    }
}

/// A response frame: HTTP-style status plus JSON envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the JSON envelope
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
