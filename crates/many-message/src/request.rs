//! Request model and its tagged CBOR form.
//!
//! Wire layout (tag 10001 over an integer-keyed map):
//! 0 version, 1 from, 2 to, 3 method, 4 data (CBOR in a byte string),
//! 5 timestamp (tag 1, seconds), 6 id, 7 nonce, 8 attributes.
//! Absent optional entries are omitted.

use many_identity::cbor::{self, MapBuilder, Value, TAG_COSE_SIGN1, TAG_EPOCH_TIME, TAG_REQUEST};
use many_identity::{Address, Identity};
use rand_core::{OsRng, RngCore};

use crate::envelope::CoseSign1;
use crate::{MessageError, PROTOCOL_VERSION};

const NONCE_LEN: usize = 16;

/// Caller overrides merged over request defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub to: Option<Address>,
    /// Seconds since the Unix epoch. Defaults to now.
    pub timestamp: Option<u64>,
    pub id: Option<u64>,
    /// Defaults to 16 fresh random bytes.
    pub nonce: Option<Vec<u8>>,
    pub attributes: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub version: u8,
    pub from: Address,
    pub to: Option<Address>,
    pub method: String,
    pub data: Value,
    pub timestamp: u64,
    pub id: Option<u64>,
    pub nonce: Option<Vec<u8>>,
    pub attributes: Vec<Value>,
}

impl Request {
    pub fn build(
        method: impl Into<String>,
        sender: &dyn Identity,
        data: Value,
        options: RequestOptions,
    ) -> Self {
        let timestamp = options.timestamp.unwrap_or_else(now_secs);
        let nonce = options.nonce.unwrap_or_else(|| {
            let mut nonce = vec![0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut nonce);
            nonce
        });

        Self {
            version: PROTOCOL_VERSION,
            from: sender.address(),
            to: options.to,
            method: method.into(),
            data,
            timestamp,
            id: options.id,
            nonce: Some(nonce),
            attributes: options.attributes,
        }
    }

    pub fn to_value(&self) -> Value {
        let data = match &self.data {
            Value::Null => None,
            v => Some(Value::Bytes(cbor::to_vec(v))),
        };
        let map = MapBuilder::new()
            .insert(0, cbor::uint(u64::from(self.version)))
            .insert(1, self.from.to_value())
            .insert_opt(2, self.to.as_ref().map(Address::to_value))
            .insert(3, Value::Text(self.method.clone()))
            .insert_opt(4, data)
            .insert(5, Value::Tag(TAG_EPOCH_TIME, Box::new(cbor::uint(self.timestamp))))
            .insert_opt(6, self.id.map(cbor::uint))
            .insert_opt(7, self.nonce.clone().map(Value::Bytes))
            .insert_opt(
                8,
                (!self.attributes.is_empty()).then(|| Value::Array(self.attributes.clone())),
            )
            .build();
        Value::Tag(TAG_REQUEST, Box::new(map))
    }

    /// Encoded request without any signature wrapper.
    pub fn to_cbor(&self) -> Vec<u8> {
        cbor::to_vec(&self.to_value())
    }

    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let inner = cbor::untag(value, TAG_REQUEST).unwrap_or(value);
        let map = cbor::as_map(inner).ok_or_else(|| malformed("request is not a map"))?;

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
        let method = cbor::map_get(map, 3)
            .and_then(cbor::as_text)
            .ok_or_else(|| malformed("missing method"))?
            .to_string();
        let data = match cbor::map_get(map, 4) {
            None => Value::Null,
            Some(v) => {
                let bytes = cbor::as_bytes(v).ok_or_else(|| malformed("data is not a byte string"))?;
                decode_data(bytes).map_err(|e| malformed(e.to_string()))?
            }
        };
        let timestamp = cbor::map_get(map, 5)
            .map(|v| cbor::untag(v, TAG_EPOCH_TIME).unwrap_or(v))
            .and_then(cbor::as_u64)
            .ok_or_else(|| malformed("missing timestamp"))?;
        let id = cbor::map_get(map, 6).and_then(cbor::as_u64);
        let nonce = cbor::map_get(map, 7).and_then(cbor::as_bytes).map(<[u8]>::to_vec);
        let attributes = cbor::map_get(map, 8)
            .and_then(cbor::as_array)
            .map(<[Value]>::to_vec)
            .unwrap_or_default();

        Ok(Self {
            version,
            from,
            to,
            method,
            data,
            timestamp,
            id,
            nonce,
            attributes,
        })
    }

    /// Decode a request from either its bare tagged form or a COSE_Sign1
    /// envelope. Envelope signatures are checked when a keyset is present.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let value = cbor::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        if cbor::untag(&value, TAG_COSE_SIGN1).is_some() || cbor::as_array(&value).is_some() {
            let envelope = CoseSign1::from_value(&value)?;
            envelope.verify()?;
            let payload = cbor::from_slice(&envelope.payload).map_err(|e| malformed(e.to_string()))?;
            return Self::from_value(&payload);
        }
        Self::from_value(&value)
    }
}

/// Payload bytes decode to a single CBOR value; empty bytes mean null.
pub(crate) fn decode_data(bytes: &[u8]) -> Result<Value, cbor::DecodeError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    cbor::from_slice(bytes)
}

pub(crate) fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

fn malformed(reason: impl Into<String>) -> MessageError {
    MessageError::MalformedRequest(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use many_identity::{AnonymousIdentity, Ed25519Identity};

    fn payload() -> Value {
        MapBuilder::new()
            .insert(0, Value::Text("key".into()))
            .insert(1, Value::Bytes(vec![1, 2, 3]))
            .build()
    }

    #[test]
    fn test_build_uses_sender_address() {
        let identity = Ed25519Identity::generate();
        let req = Request::build("kvstore.get", &identity, payload(), RequestOptions::default());
        assert_eq!(req.from, identity.address());
        assert_eq!(req.method, "kvstore.get");
        assert_eq!(req.nonce.as_ref().map(Vec::len), Some(NONCE_LEN));
        assert!(req.timestamp > 0);
    }

    #[test]
    fn test_anonymous_sender() {
        let req = Request::build("status", &AnonymousIdentity, Value::Null, RequestOptions::default());
        assert_eq!(req.from.to_string(), "maa");
    }

    #[test]
    fn test_options_override_defaults() {
        let to = Ed25519Identity::generate().address();
        let options = RequestOptions {
            to: Some(to.clone()),
            timestamp: Some(1_700_000_000),
            id: Some(7),
            nonce: Some(vec![9; 4]),
            attributes: vec![cbor::uint(3)],
        };
        let req = Request::build("m", &AnonymousIdentity, Value::Null, options);
        assert_eq!(req.to, Some(to));
        assert_eq!(req.timestamp, 1_700_000_000);
        assert_eq!(req.id, Some(7));
        assert_eq!(req.nonce, Some(vec![9; 4]));
        assert_eq!(req.attributes, vec![cbor::uint(3)]);
    }

    #[test]
    fn test_nonces_differ() {
        let a = Request::build("m", &AnonymousIdentity, Value::Null, RequestOptions::default());
        let b = Request::build("m", &AnonymousIdentity, Value::Null, RequestOptions::default());
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_round_trip() {
        let identity = Ed25519Identity::generate();
        let options = RequestOptions {
            to: Some(Address::anonymous()),
            id: Some(99),
            ..Default::default()
        };
        let req = Request::build("account.info", &identity, payload(), options);
        let decoded = Request::decode(&req.to_cbor()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_encoding_is_stable() {
        let options = || RequestOptions {
            timestamp: Some(1),
            nonce: Some(vec![0; 16]),
            ..Default::default()
        };
        let a = Request::build("m", &AnonymousIdentity, payload(), options());
        let b = Request::build("m", &AnonymousIdentity, payload(), options());
        assert_eq!(a.to_cbor(), b.to_cbor());
    }

    #[test]
    fn test_missing_method_is_malformed() {
        let value = Value::Tag(TAG_REQUEST, Box::new(MapBuilder::new().insert(0, cbor::uint(1)).build()));
        assert!(matches!(
            Request::from_value(&value),
            Err(MessageError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_missing_timestamp_is_malformed() {
        let req = Request::build("m", &AnonymousIdentity, Value::Null, RequestOptions::default());
        let Value::Tag(tag, inner) = req.to_value() else {
            panic!("request is not tagged");
        };
        let entries: Vec<_> = cbor::as_map(&inner)
            .unwrap()
            .iter()
            .filter(|(k, _)| *k != cbor::uint(5))
            .cloned()
            .collect();
        let value = Value::Tag(tag, Box::new(Value::Map(entries)));
        assert!(matches!(
            Request::from_value(&value),
            Err(MessageError::MalformedRequest(reason)) if reason == "missing timestamp"
        ));
    }
}
