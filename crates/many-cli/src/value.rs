//! Rendering of CBOR payloads for humans and scripts.

use many_identity::cbor::Value;
use serde_json::{json, Map, Number};

/// JSON view of a CBOR value.
///
/// Byte strings become hex strings, integers outside the JSON-safe range
/// become decimal strings, and maps whose keys are all integers or text
/// become objects. Other maps are emitted as arrays of `[key, value]` pairs.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => {
            let i = i128::from(*i);
            if let Ok(v) = i64::try_from(i) {
                json!(v)
            } else if let Ok(v) = u64::try_from(i) {
                json!(v)
            } else {
                serde_json::Value::String(i.to_string())
            }
        }
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
        Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => {
            let keys: Option<Vec<String>> = entries.iter().map(|(k, _)| key_string(k)).collect();
            match keys {
                Some(keys) => {
                    let mut object = Map::with_capacity(entries.len());
                    for (key, (_, v)) in keys.into_iter().zip(entries) {
                        object.insert(key, to_json(v));
                    }
                    serde_json::Value::Object(object)
                }
                None => serde_json::Value::Array(
                    entries
                        .iter()
                        .map(|(k, v)| json!([to_json(k), to_json(v)]))
                        .collect(),
                ),
            }
        }
        Value::Tag(tag, inner) => json!({ "tag": tag, "value": to_json(inner) }),
        _ => serde_json::Value::Null,
    }
}

fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::Integer(i) => Some(i128::from(*i).to_string()),
        Value::Text(s) => Some(s.clone()),
        _ => None,
    }
}

/// Single-line diagnostic notation, close to RFC 8949 §8.
pub fn to_diagnostic(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(b) => format!("h'{}'", hex::encode(b)),
        Value::Text(s) => format!("{s:?}"),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_diagnostic).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", to_diagnostic(k), to_diagnostic(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tag(tag, inner) => format!("{tag}({})", to_diagnostic(inner)),
        _ => "undefined".to_string(),
    }
}
