//! Typed wrappers over server modules.
//!
//! Each function issues one call through a [`Caller`](crate::Caller) and
//! maps the numerically-labeled payload to Rust types.

pub mod account;
pub mod kvstore;

use many_identity::cbor::{self, Value};

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("transaction type not yet implemented: {0}")]
    UnimplementedTransactionType(String),

    #[error("account feature not implemented: {0}")]
    UnimplementedFeature(i64),

    #[error("unexpected {method} payload: {reason}")]
    UnexpectedPayload { method: &'static str, reason: String },

    #[error("{method} returned no result")]
    MissingPayload { method: &'static str },
}

pub(crate) fn payload_map<'v>(
    method: &'static str,
    value: &'v Value,
) -> Result<&'v [(Value, Value)], ModuleError> {
    cbor::as_map(value).ok_or_else(|| ModuleError::UnexpectedPayload {
        method,
        reason: "not a map".into(),
    })
}
