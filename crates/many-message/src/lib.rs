//! MANY message layer.
//!
//! This crate implements:
//! - Request and response models with their tagged CBOR encoding
//! - COSE_Sign1 wrapping of requests for non-anonymous senders
//! - Response decoding, including optional signature checks
//! - `ManyError`, the structured, template-based protocol error

#![forbid(unsafe_code)]

pub mod attributes;
pub mod envelope;
pub mod many_error;
pub mod request;
pub mod response;

#[cfg(test)]
mod proptests;

pub use attributes::PendingToken;
pub use envelope::{encode_request, CoseSign1, ProtectedHeader};
pub use many_error::ManyError;
pub use request::{Request, RequestOptions};
pub use response::{Response, ResponseResult};

/// Protocol version carried in every request and response.
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("envelope signature verification failed")]
    BadSignature,
    #[error(transparent)]
    Identity(#[from] many_identity::IdentityError),
}
