//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Endpoint (1) │ Len (4)  │         Payload             │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Response Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Status (2)   │ Len (4)  │         Payload             │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! All integers are big-endian. Payloads above [`MAX_PAYLOAD_SIZE`] are
//! rejected in both directions.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{PathKvError, Result};

use super::{Endpoint, WireRequest, WireResponse};

/// Request header: 1 byte endpoint + 4 bytes length
pub const REQUEST_HEADER_SIZE: usize = 5;

/// Response header: 2 bytes status + 4 bytes length
pub const RESPONSE_HEADER_SIZE: usize = 6;

/// Maximum payload size (6 MiB transport cap)
pub const MAX_PAYLOAD_SIZE: usize = 6 * 1024 * 1024;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: endpoint (1) + payload_len (4) + payload
pub fn encode_request(request: &WireRequest) -> Result<Vec<u8>> {
    check_payload_size(request.body.len())?;

    let mut message = BytesMut::with_capacity(REQUEST_HEADER_SIZE + request.body.len());
    message.put_u8(request.endpoint as u8);
    message.put_u32(request.body.len() as u32);
    message.put_slice(&request.body);

    Ok(message.to_vec())
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<WireRequest> {
    if bytes.len() < REQUEST_HEADER_SIZE {
        return Err(PathKvError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            REQUEST_HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let endpoint_code = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    check_payload_size(payload_len)?;

    let total_len = REQUEST_HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(PathKvError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let endpoint = Endpoint::from_u8(endpoint_code).ok_or_else(|| {
        PathKvError::Protocol(format!("Unknown endpoint: 0x{:02x}", endpoint_code))
    })?;

    Ok(WireRequest {
        endpoint,
        body: bytes[REQUEST_HEADER_SIZE..total_len].to_vec(),
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (2) + payload_len (4) + payload
pub fn encode_response(response: &WireResponse) -> Result<Vec<u8>> {
    check_payload_size(response.body.len())?;

    let mut message = BytesMut::with_capacity(RESPONSE_HEADER_SIZE + response.body.len());
    message.put_u16(response.status);
    message.put_u32(response.body.len() as u32);
    message.put_slice(&response.body);

    Ok(message.to_vec())
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<WireResponse> {
    if bytes.len() < RESPONSE_HEADER_SIZE {
        return Err(PathKvError::Protocol(format!(
            "Incomplete response header: expected {} bytes, got {}",
            RESPONSE_HEADER_SIZE,
            bytes.len()
        )));
    }

    // Parse header
    let status = u16::from_be_bytes([bytes[0], bytes[1]]);
    let payload_len = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]) as usize;
    check_payload_size(payload_len)?;

    let total_len = RESPONSE_HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(PathKvError::Protocol(format!(
            "Incomplete response payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    if !(100..600).contains(&status) {
        return Err(PathKvError::Protocol(format!(
            "Unknown response status: {}",
            status
        )));
    }

    Ok(WireResponse {
        status,
        body: bytes[RESPONSE_HEADER_SIZE..total_len].to_vec(),
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<WireRequest> {
    let mut header = [0u8; REQUEST_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    check_payload_size(payload_len)?;

    let mut full_message = vec![0u8; REQUEST_HEADER_SIZE + payload_len];
    full_message[..REQUEST_HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut full_message[REQUEST_HEADER_SIZE..])?;
    }

    decode_request(&full_message)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &WireRequest) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<WireResponse> {
    let mut header = [0u8; RESPONSE_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    check_payload_size(payload_len)?;

    let mut full_message = vec![0u8; RESPONSE_HEADER_SIZE + payload_len];
    full_message[..RESPONSE_HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut full_message[RESPONSE_HEADER_SIZE..])?;
    }

    decode_response(&full_message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &WireResponse) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

fn check_payload_size(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(PathKvError::PayloadTooLarge {
            size: len,
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}
