//! Response model and decoding.
//!
//! Wire layout (tag 10002 over an integer-keyed map):
//! 0 version, 1 from, 2 to, 4 result, 5 timestamp (tag 1), 6 id,
//! 8 attributes. The result is either the CBOR of the returned value in a
//! byte string, or a `ManyError` map.

use many_identity::cbor::{self, MapBuilder, Value, TAG_COSE_SIGN1, TAG_EPOCH_TIME, TAG_RESPONSE};
use many_identity::{Address, Identity};
use tracing::debug;

use crate::attributes::{async_attribute, take_async_token, PendingToken};
use crate::envelope::CoseSign1;
use crate::many_error::ManyError;
use crate::request::{decode_data, now_secs};
use crate::{MessageError, PROTOCOL_VERSION};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseResult {
    /// The call succeeded. A token means the work continues asynchronously
    /// and `value` is a placeholder.
    Ok {
        value: Value,
        token: Option<PendingToken>,
    },
    Failed(ManyError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub version: u8,
    pub from: Address,
    pub to: Option<Address>,
    pub result: ResponseResult,
    /// Seconds since the Unix epoch; 0 when the server leaves it out.
    pub timestamp: u64,
    pub id: Option<u64>,
    /// Attributes other than the async token.
    pub attributes: Vec<Value>,
}

impl Response {
    fn with_result(from: Address, result: ResponseResult) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            from,
            to: None,
            result,
            timestamp: now_secs(),
            id: None,
            attributes: Vec::new(),
        }
    }

    pub fn ok(from: Address, value: Value) -> Self {
        Self::with_result(from, ResponseResult::Ok { value, token: None })
    }

    pub fn error(from: Address, error: ManyError) -> Self {
        Self::with_result(from, ResponseResult::Failed(error))
    }

    /// Deferred result to be fetched with `async.status`.
    pub fn pending(from: Address, token: PendingToken) -> Self {
        Self::with_result(
            from,
            ResponseResult::Ok {
                value: Value::Null,
                token: Some(token),
            },
        )
    }

    pub fn to_value(&self) -> Value {
        let mut attributes = Vec::with_capacity(self.attributes.len() + 1);
        let result = match &self.result {
            ResponseResult::Ok { value, token } => {
                if let Some(token) = token {
                    attributes.push(async_attribute(token));
                }
                match value {
                    Value::Null => None,
                    v => Some(Value::Bytes(cbor::to_vec(v))),
                }
            }
            ResponseResult::Failed(err) => Some(err.to_value()),
        };
        attributes.extend(self.attributes.iter().cloned());

        let map = MapBuilder::new()
            .insert(0, cbor::uint(u64::from(self.version)))
            .insert(1, self.from.to_value())
            .insert_opt(2, self.to.as_ref().map(Address::to_value))
            .insert_opt(4, result)
            .insert(5, Value::Tag(TAG_EPOCH_TIME, Box::new(cbor::uint(self.timestamp))))
            .insert_opt(6, self.id.map(cbor::uint))
            .insert_opt(8, (!attributes.is_empty()).then_some(Value::Array(attributes)))
            .build();
        Value::Tag(TAG_RESPONSE, Box::new(map))
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        cbor::to_vec(&self.to_value())
    }

    /// Encoded response in a COSE_Sign1 signed by `signer`.
    pub fn to_signed_cbor(&self, signer: &dyn Identity) -> Result<Vec<u8>, MessageError> {
        Ok(CoseSign1::sign(self.to_cbor(), signer)?.to_bytes())
    }

    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let inner = cbor::untag(value, TAG_RESPONSE).unwrap_or(value);
        let map = cbor::as_map(inner).ok_or_else(|| malformed("response is not a map"))?;

        let version = match cbor::map_get(map, 0) {
            None => PROTOCOL_VERSION,
            Some(v) => cbor::as_u64(v)
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(|| malformed("bad version"))?,
        };
        let from = match cbor::map_get(map, 1) {
            None => Address::anonymous(),
            Some(v) => Address::from_value(v)?,
        };
        let to = cbor::map_get(map, 2).map(Address::from_value).transpose()?;
        let timestamp = cbor::map_get(map, 5)
            .map(|v| cbor::untag(v, TAG_EPOCH_TIME).unwrap_or(v))
            .and_then(cbor::as_u64)
            .unwrap_or(0);
        let id = cbor::map_get(map, 6).and_then(cbor::as_u64);
        let raw_attributes = cbor::map_get(map, 8)
            .and_then(cbor::as_array)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();
        let (token, attributes) = take_async_token(raw_attributes);

        let result = match cbor::map_get(map, 4) {
            Some(err @ Value::Map(_)) => ResponseResult::Failed(ManyError::from_value(err)?),
            Some(Value::Bytes(bytes)) => ResponseResult::Ok {
                value: decode_data(bytes).map_err(|e| malformed(e.to_string()))?,
                token,
            },
            None | Some(Value::Null) => ResponseResult::Ok {
                value: Value::Null,
                token,
            },
            Some(_) => return Err(malformed("result is neither bytes nor an error")),
        };

        Ok(Self {
            version,
            from,
            to,
            result,
            timestamp,
            id,
            attributes,
        })
    }

    /// Decode a response from a COSE_Sign1 envelope or its bare tagged form.
    ///
    /// Envelopes carrying a keyset must verify against it.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let value = cbor::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        match &value {
            Value::Tag(TAG_RESPONSE, _) => Self::from_value(&value),
            Value::Tag(TAG_COSE_SIGN1, _) | Value::Array(_) => {
                let envelope = CoseSign1::from_value(&value).map_err(|e| match e {
                    MessageError::MalformedEnvelope(reason) => malformed(reason),
                    other => other,
                })?;
                if let Some(signer) = envelope.verify()? {
                    debug!(%signer, "response signature verified");
                }
                let payload = cbor::from_slice(&envelope.payload).map_err(|e| malformed(e.to_string()))?;
                if cbor::untag(&payload, TAG_RESPONSE).is_none() {
                    return Err(malformed("envelope payload is not a response"));
                }
                Self::from_value(&payload)
            }
            _ => Err(malformed("expected a response or a COSE_Sign1 envelope")),
        }
    }
}

fn malformed(reason: impl Into<String>) -> MessageError {
    MessageError::MalformedResponse(reason.into())
}
