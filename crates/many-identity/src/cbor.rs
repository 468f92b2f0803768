//! Small helpers over `ciborium::Value` shared by the identity and message
//! codecs.
//!
//! MANY structures are integer-keyed CBOR maps. These helpers keep map
//! insertion order (encoding is therefore stable for identical content) and
//! give typed access to labeled entries.

pub use ciborium::value::{Integer, Value};

/// CBOR tag for a MANY address.
pub const TAG_ADDRESS: u64 = 10000;
/// CBOR tag for a MANY request.
pub const TAG_REQUEST: u64 = 10001;
/// CBOR tag for a MANY response.
pub const TAG_RESPONSE: u64 = 10002;
/// CBOR tag for an epoch timestamp (RFC 8949).
pub const TAG_EPOCH_TIME: u64 = 1;
/// CBOR tag for COSE_Sign1 (RFC 9052).
pub const TAG_COSE_SIGN1: u64 = 18;

#[derive(Debug, thiserror::Error)]
#[error("cbor decode failed: {0}")]
pub struct DecodeError(pub String);

/// Serialize a value into CBOR bytes.
pub fn to_vec(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    // Writing into a Vec has no I/O failure mode.
    ciborium::ser::into_writer(value, &mut buf).expect("cbor encoding into Vec is infallible");
    buf
}

/// Parse CBOR bytes holding exactly one item into a value.
pub fn from_slice(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut cursor = std::io::Cursor::new(bytes);
    let value = ciborium::de::from_reader::<Value, _>(&mut cursor).map_err(|e| DecodeError(e.to_string()))?;
    let consumed = cursor.position();
    if consumed != bytes.len() as u64 {
        return Err(DecodeError(format!(
            "{} trailing bytes after item",
            bytes.len() as u64 - consumed
        )));
    }
    Ok(value)
}

pub fn int(v: i64) -> Value {
    Value::Integer(Integer::from(v))
}

pub fn uint(v: u64) -> Value {
    Value::Integer(Integer::from(v))
}

pub fn as_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(i) => Some(i128::from(*i)),
        _ => None,
    }
}

pub fn as_u64(value: &Value) -> Option<u64> {
    as_i128(value).and_then(|v| u64::try_from(v).ok())
}

pub fn as_i64(value: &Value) -> Option<i64> {
    as_i128(value).and_then(|v| i64::try_from(v).ok())
}

pub fn as_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Bytes(b) => Some(b.as_slice()),
        _ => None,
    }
}

pub fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) => Some(s.as_str()),
        _ => None,
    }
}

pub fn as_map(value: &Value) -> Option<&[(Value, Value)]> {
    match value {
        Value::Map(m) => Some(m.as_slice()),
        _ => None,
    }
}

pub fn as_array(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Array(a) => Some(a.as_slice()),
        _ => None,
    }
}

/// Strip one tag if it matches `tag`.
pub fn untag(value: &Value, tag: u64) -> Option<&Value> {
    match value {
        Value::Tag(t, inner) if *t == tag => Some(inner.as_ref()),
        _ => None,
    }
}

/// Look up an integer-labeled entry.
pub fn map_get(map: &[(Value, Value)], label: i64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| as_i128(k) == Some(i128::from(label)))
        .map(|(_, v)| v)
}

/// Look up a text-labeled entry.
pub fn map_get_text<'a>(map: &'a [(Value, Value)], label: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| as_text(k) == Some(label))
        .map(|(_, v)| v)
}

/// Builder for integer-labeled maps that keeps insertion order.
#[derive(Debug, Default, Clone)]
pub struct MapBuilder {
    entries: Vec<(Value, Value)>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, label: i64, value: Value) -> Self {
        self.entries.push((int(label), value));
        self
    }

    pub fn insert_opt(self, label: i64, value: Option<Value>) -> Self {
        match value {
            Some(v) => self.insert(label, v),
            None => self,
        }
    }

    pub fn insert_text(mut self, label: &str, value: Value) -> Self {
        self.entries.push((Value::Text(label.to_string()), value));
        self
    }

    pub fn build(self) -> Value {
        Value::Map(self.entries)
    }
}
