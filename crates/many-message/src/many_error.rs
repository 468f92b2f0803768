//! Structured protocol errors.
//!
//! A `ManyError` carries a numeric code, an optional message template and a
//! map of substitution fields. Templates reference fields as `{name}`;
//! `{{` and `}}` are literal braces. Rendering never fails: references to
//! missing fields render as nothing.

use std::collections::BTreeMap;
use std::fmt;

use many_identity::cbor::{self, MapBuilder, Value};

use crate::MessageError;

const LABEL_CODE: i64 = 0;
const LABEL_MESSAGE: i64 = 1;
const LABEL_FIELDS: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyError {
    code: i64,
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl ManyError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Substitute fields into the template in a single left-to-right pass.
    pub fn render(&self) -> String {
        let Some(template) = self.message.as_deref() else {
            return format!("Unknown error (code {})", self.code);
        };

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(c) = rest.chars().next() {
            if rest.starts_with("{{") {
                out.push('{');
                rest = &rest[2..];
            } else if rest.starts_with("}}") {
                out.push('}');
                rest = &rest[2..];
            } else if c == '{' {
                match rest[1..].find('}') {
                    Some(end) => {
                        let key = &rest[1..1 + end];
                        if let Some(value) = self.fields.get(key) {
                            out.push_str(value);
                        }
                        rest = &rest[end + 2..];
                    }
                    None => {
                        // unterminated reference stays literal
                        out.push_str(rest);
                        break;
                    }
                }
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        out
    }

    pub fn to_value(&self) -> Value {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| (Value::Text(k.clone()), Value::Text(v.clone())))
            .collect::<Vec<_>>();
        MapBuilder::new()
            .insert(LABEL_CODE, cbor::int(self.code))
            .insert_opt(LABEL_MESSAGE, self.message.clone().map(Value::Text))
            .insert_opt(
                LABEL_FIELDS,
                (!fields.is_empty()).then_some(Value::Map(fields)),
            )
            .build()
    }

    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let map = cbor::as_map(value)
            .ok_or_else(|| MessageError::MalformedResponse("error is not a map".into()))?;

        let code = match cbor::map_get(map, LABEL_CODE) {
            None => 0,
            Some(v) => cbor::as_i64(v)
                .ok_or_else(|| MessageError::MalformedResponse("error code is not an integer".into()))?,
        };
        let message = match cbor::map_get(map, LABEL_MESSAGE) {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                cbor::as_text(v)
                    .ok_or_else(|| MessageError::MalformedResponse("error message is not text".into()))?
                    .to_string(),
            ),
        };

        let mut fields = BTreeMap::new();
        if let Some(v) = cbor::map_get(map, LABEL_FIELDS) {
            let entries = cbor::as_map(v)
                .ok_or_else(|| MessageError::MalformedResponse("error fields is not a map".into()))?;
            for (k, v) in entries {
                fields.insert(field_text(k), field_text(v));
            }
        }

        Ok(Self { code, message, fields })
    }
}

/// String form of a field value. Arrays join their elements with commas.
fn field_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Bytes(b) => hex::encode(b),
        Value::Null => "null".to_string(),
        Value::Array(items) => items.iter().map(field_text).collect::<Vec<_>>().join(","),
        Value::Map(entries) => {
            let inner = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", field_text(k), field_text(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{inner}}}")
        }
        Value::Tag(_, inner) => field_text(inner),
        _ => String::new(),
    }
}

impl fmt::Display for ManyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.render())
    }
}

impl std::error::Error for ManyError {}
