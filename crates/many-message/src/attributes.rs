//! Message attributes.
//!
//! An attribute is either a bare integer id or an array whose first element
//! is the id. The async attribute `[1, token]` on a response marks a call
//! whose execution was deferred.

use std::fmt;

use many_identity::cbor::{self, Value};

pub const ASYNC_ATTRIBUTE_ID: u64 = 1;

/// Opaque handle for a deferred remote job. Issued by the server only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PendingToken(Vec<u8>);

impl PendingToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for PendingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PendingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingToken({})", self.to_hex())
    }
}

pub fn attribute_id(attribute: &Value) -> Option<u64> {
    match attribute {
        Value::Array(items) => items.first().and_then(cbor::as_u64),
        other => cbor::as_u64(other),
    }
}

pub fn async_attribute(token: &PendingToken) -> Value {
    Value::Array(vec![
        cbor::uint(ASYNC_ATTRIBUTE_ID),
        Value::Bytes(token.as_bytes().to_vec()),
    ])
}

/// Split the async token out of an attribute list. Other attributes are
/// returned unchanged, in order.
pub fn take_async_token(attributes: Vec<Value>) -> (Option<PendingToken>, Vec<Value>) {
    let mut token = None;
    let mut rest = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        if token.is_none() && attribute_id(&attribute) == Some(ASYNC_ATTRIBUTE_ID) {
            if let Some(bytes) = cbor::as_array(&attribute)
                .and_then(|items| items.get(1))
                .and_then(cbor::as_bytes)
            {
                token = Some(PendingToken::new(bytes));
                continue;
            }
        }
        rest.push(attribute);
    }
    (token, rest)
}
