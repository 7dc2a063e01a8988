//! Protocol Module
//!
//! Defines the wire protocol between the client and the operation handlers.
//!
//! ## Protocol Format (V1 - Framed JSON)
//!
//! ### Request Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Endpoint (1) │ Len (4)  │         JSON body           │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Endpoints
//! - 0x01: READ              - `ReadRequest`
//! - 0x02: READ_WITH_DEFAULT - `ReadWithDefaultRequest`
//! - 0x03: WRITE             - `WriteRequest`
//! - 0x04: READ_TREE         - `TreeRequest`
//! - 0x05: BATCH             - `BatchRequest`
//! - 0x06: HEALTH            - empty body
//!
//! ### Response Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ Status (2)   │ Len (4)  │   JSON `ApiResponse<T>`     │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! HTTP-style: 200, 400, 403, 404, 409, 413, 429, 500

mod codec;
mod endpoint;
mod frame;
mod messages;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, MAX_PAYLOAD_SIZE, REQUEST_HEADER_SIZE,
    RESPONSE_HEADER_SIZE,
};
pub use endpoint::Endpoint;
pub use frame::{WireRequest, WireResponse};
pub use messages::{
    ApiResponse, BatchData, BatchOperation, BatchOperationResult, BatchOperationType,
    BatchRequest, BatchSummary, HealthData, ReadData, ReadRequest, ReadWithDefaultRequest,
    ResponseMetadata, TreeData, TreeRequest, WriteData, WriteOptions, WriteRequest,
};
