//! COSE_Sign1 envelope (RFC 9052 §4.2) around encoded MANY messages.
//!
//! The protected header carries the algorithm, the signer's address as
//! `kid`, and a `keyset` holding the signer's COSE_Key so that peers can
//! check the signature without a key directory.

use many_identity::cbor::{self, MapBuilder, Value, TAG_COSE_SIGN1};
use many_identity::{verify_signature, Address, Algorithm, CoseKey, Identity};
use tracing::debug;

use crate::request::Request;
use crate::MessageError;

const HEADER_ALG: i64 = 1;
const HEADER_KID: i64 = 4;
const HEADER_KEYSET: &str = "keyset";
const SIG_CONTEXT: &str = "Signature1";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtectedHeader {
    pub alg: Option<Algorithm>,
    pub kid: Option<Address>,
    pub keyset: Vec<CoseKey>,
}

impl ProtectedHeader {
    pub fn for_key(key: CoseKey) -> Self {
        Self {
            alg: Some(Algorithm::EdDsa),
            kid: Some(key.address()),
            keyset: vec![key],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let keyset = (!self.keyset.is_empty()).then(|| {
            let keys = self.keyset.iter().map(CoseKey::to_value).collect();
            Value::Bytes(cbor::to_vec(&Value::Array(keys)))
        });
        let mut map = MapBuilder::new()
            .insert_opt(HEADER_ALG, self.alg.map(|a| cbor::int(a.label())))
            .insert_opt(
                HEADER_KID,
                self.kid.as_ref().map(|k| Value::Bytes(k.as_bytes().to_vec())),
            );
        if let Some(keyset) = keyset {
            map = map.insert_text(HEADER_KEYSET, keyset);
        }
        cbor::to_vec(&map.build())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let value = cbor::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let map = cbor::as_map(&value).ok_or_else(|| malformed("protected header is not a map"))?;

        let alg = match cbor::map_get(map, HEADER_ALG) {
            None => None,
            Some(v) => Some(
                cbor::as_i64(v)
                    .and_then(Algorithm::from_label)
                    .ok_or_else(|| malformed("unsupported algorithm"))?,
            ),
        };
        let kid = match cbor::map_get(map, HEADER_KID) {
            None => None,
            Some(v) => Some(Address::from_value(v)?),
        };
        let keyset = match cbor::map_get_text(map, HEADER_KEYSET) {
            None => Vec::new(),
            Some(v) => {
                let bytes = cbor::as_bytes(v).ok_or_else(|| malformed("keyset is not a byte string"))?;
                let keys = cbor::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
                match keys {
                    Value::Array(keys) => keys
                        .iter()
                        .map(CoseKey::from_value)
                        .collect::<Result<Vec<_>, _>>()?,
                    // a lone key is tolerated
                    single @ Value::Map(_) => vec![CoseKey::from_value(&single)?],
                    _ => return Err(malformed("keyset is not an array")),
                }
            }
        };

        Ok(Self { alg, kid, keyset })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1 {
    pub protected: Vec<u8>,
    pub unprotected: Value,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    /// Sign `payload` with `signer`. Fails for signers without a key.
    pub fn sign(payload: Vec<u8>, signer: &dyn Identity) -> Result<Self, MessageError> {
        let key = signer
            .public_key()
            .ok_or(many_identity::IdentityError::AnonymousSigner)?;
        let protected = ProtectedHeader::for_key(key).to_bytes();
        let signature = signer.sign(&sig_structure(&protected, &payload))?;
        Ok(Self {
            protected,
            unprotected: Value::Map(Vec::new()),
            payload,
            signature: signature.to_vec(),
        })
    }

    pub fn protected_header(&self) -> Result<ProtectedHeader, MessageError> {
        ProtectedHeader::from_bytes(&self.protected)
    }

    /// Check the signature against the keyset in the protected header.
    ///
    /// Returns the signer's address, or `None` when the envelope carries no
    /// keyset and therefore nothing to check against.
    pub fn verify(&self) -> Result<Option<Address>, MessageError> {
        let header = self.protected_header()?;
        if header.keyset.is_empty() {
            return Ok(None);
        }
        let key = match &header.kid {
            Some(kid) => header.keyset.iter().find(|k| &k.address() == kid),
            None => header.keyset.first(),
        }
        .ok_or(MessageError::BadSignature)?;

        let signature: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| MessageError::BadSignature)?;
        verify_signature(&key.x, &sig_structure(&self.protected, &self.payload), &signature)
            .map_err(|_| MessageError::BadSignature)?;
        Ok(Some(key.address()))
    }

    pub fn to_value(&self) -> Value {
        Value::Tag(
            TAG_COSE_SIGN1,
            Box::new(Value::Array(vec![
                Value::Bytes(self.protected.clone()),
                self.unprotected.clone(),
                Value::Bytes(self.payload.clone()),
                Value::Bytes(self.signature.clone()),
            ])),
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        cbor::to_vec(&self.to_value())
    }

    /// Accepts the tagged form and the untagged four-element array.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let inner = cbor::untag(value, TAG_COSE_SIGN1).unwrap_or(value);
        let items = cbor::as_array(inner).ok_or_else(|| malformed("not an array"))?;
        let [protected, unprotected, payload, signature] = items else {
            return Err(malformed(format!("expected 4 elements, got {}", items.len())));
        };
        let bytes = |v: &Value, what: &str| {
            cbor::as_bytes(v)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| malformed(format!("{what} is not a byte string")))
        };
        Ok(Self {
            protected: bytes(protected, "protected header")?,
            unprotected: unprotected.clone(),
            payload: bytes(payload, "payload")?,
            signature: bytes(signature, "signature")?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let value = cbor::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        Self::from_value(&value)
    }
}

/// COSE `Sig_structure` for a Sign1 message with no external AAD.
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Vec<u8> {
    cbor::to_vec(&Value::Array(vec![
        Value::Text(SIG_CONTEXT.to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]))
}

/// Encode a request for the wire.
///
/// Anonymous senders produce the bare tagged request. Everyone else
/// produces a COSE_Sign1 signed by `sender`, whose address must be the
/// request's `from`.
pub fn encode_request(request: &Request, sender: &dyn Identity) -> Result<Vec<u8>, MessageError> {
    let payload = request.to_cbor();
    if sender.public_key().is_none() {
        debug!(method = %request.method, bytes = %hex::encode(&payload), "encoded anonymous request");
        return Ok(payload);
    }
    if request.from != sender.address() {
        return Err(MessageError::MalformedRequest(format!(
            "request sender {} does not match signer {}",
            request.from,
            sender.address()
        )));
    }

    let bytes = CoseSign1::sign(payload, sender)?.to_bytes();
    debug!(method = %request.method, bytes = %hex::encode(&bytes), "encoded signed request");
    Ok(bytes)
}

fn malformed(reason: impl Into<String>) -> MessageError {
    MessageError::MalformedEnvelope(reason.into())
}
