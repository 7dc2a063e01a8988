//! Codec Tests
//!
//! Tests for request and response framing.

use std::io::Cursor;

use pathkv::error::PathKvError;
use pathkv::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, Endpoint, ReadRequest, WireRequest,
    WireResponse, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};

// =============================================================================
// Request Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_request_header_layout() {
    let request = WireRequest::new(Endpoint::Write, b"{}".to_vec());
    let encoded = encode_request(&request).unwrap();

    assert_eq!(encoded.len(), REQUEST_HEADER_SIZE + 2);
    assert_eq!(encoded[0], 0x03);
    assert_eq!(&encoded[1..5], &2u32.to_be_bytes());
    assert_eq!(&encoded[5..], b"{}");
}

#[test]
fn test_encode_decode_json_request() {
    let body = ReadRequest {
        workspace_id: "w1".to_string(),
        path: "/docs/readme".to_string(),
        user_id: None,
    };
    let request = WireRequest::json(Endpoint::Read, &body).unwrap();
    let decoded = decode_request(&encode_request(&request).unwrap()).unwrap();

    assert_eq!(decoded.endpoint, Endpoint::Read);
    let parsed: ReadRequest = serde_json::from_slice(&decoded.body).unwrap();
    assert_eq!(parsed, body);
}

#[test]
fn test_every_endpoint_code() {
    for endpoint in [
        Endpoint::Read,
        Endpoint::ReadWithDefault,
        Endpoint::Write,
        Endpoint::ReadTree,
        Endpoint::Batch,
        Endpoint::Health,
    ] {
        let encoded = encode_request(&WireRequest::new(endpoint, Vec::new())).unwrap();
        assert_eq!(decode_request(&encoded).unwrap().endpoint, endpoint);
    }
}

#[test]
fn test_decode_unknown_endpoint() {
    let bytes = [0x7f, 0, 0, 0, 0];
    assert!(matches!(decode_request(&bytes), Err(PathKvError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_request() {
    assert!(matches!(decode_request(&[0x01, 0, 0]), Err(PathKvError::Protocol(_))));

    let mut encoded = encode_request(&WireRequest::new(Endpoint::Read, b"abcdef".to_vec())).unwrap();
    encoded.truncate(encoded.len() - 2);
    assert!(matches!(decode_request(&encoded), Err(PathKvError::Protocol(_))));
}

#[test]
fn test_oversized_request_rejected() {
    let request = WireRequest::new(Endpoint::Write, vec![b'x'; MAX_PAYLOAD_SIZE + 1]);
    let err = encode_request(&request).unwrap_err();
    assert!(matches!(err, PathKvError::PayloadTooLarge { .. }));
    assert_eq!(err.status(), 413);

    // A forged header announcing an oversized body is rejected before reading it
    let mut header = vec![0x03];
    header.extend_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_be_bytes());
    assert!(matches!(
        read_request(&mut Cursor::new(header)),
        Err(PathKvError::PayloadTooLarge { .. })
    ));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_response() {
    let response = WireResponse::new(409, br#"{"success":false}"#.to_vec());
    let encoded = encode_response(&response).unwrap();
    assert_eq!(encoded.len(), RESPONSE_HEADER_SIZE + response.body.len());

    let decoded = decode_response(&encoded).unwrap();
    assert_eq!(decoded, response);
    assert!(!decoded.is_success());
}

#[test]
fn test_decode_bad_status() {
    let mut encoded = encode_response(&WireResponse::new(200, Vec::new())).unwrap();
    encoded[0] = 0xff;
    assert!(matches!(decode_response(&encoded), Err(PathKvError::Protocol(_))));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_round_trip() {
    let mut buffer = Vec::new();
    write_request(&mut buffer, &WireRequest::new(Endpoint::Health, Vec::new())).unwrap();
    write_request(&mut buffer, &WireRequest::new(Endpoint::Batch, b"[]".to_vec())).unwrap();

    let mut reader = Cursor::new(buffer);
    assert_eq!(read_request(&mut reader).unwrap().endpoint, Endpoint::Health);
    let second = read_request(&mut reader).unwrap();
    assert_eq!(second.endpoint, Endpoint::Batch);
    assert_eq!(second.body, b"[]");

    // Stream exhausted
    assert!(matches!(read_request(&mut reader), Err(PathKvError::Io(_))));
}

#[test]
fn test_response_stream_round_trip() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &WireResponse::new(200, b"{}".to_vec())).unwrap();

    let response = read_response(&mut Cursor::new(buffer)).unwrap();
    assert_eq!(response.status, 200);
    assert!(response.is_success());
}
