//! COSE_Key public key descriptor (RFC 9052 §7) for Ed25519 keys.
//!
//! The descriptor is a CBOR map with five integer labels. MANY derives
//! addresses from its encoded bytes, so the label order used when encoding
//! is fixed: kty, alg, crv, key_ops, x.

use ed25519_dalek::VerifyingKey;

use crate::address::Address;
use crate::cbor::{self, MapBuilder, Value};
use crate::identity::IdentityError;

/// Integer labels of the COSE_Key map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseKeyLabel {
    Kty = 1,
    Alg = 3,
    KeyOps = 4,
    Crv = -1,
    X = -2,
}

impl CoseKeyLabel {
    pub const fn label(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Octet key pair
    Okp,
}

impl KeyType {
    pub const fn label(self) -> i64 {
        match self {
            KeyType::Okp => 1,
        }
    }

    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            1 => Some(KeyType::Okp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    EdDsa,
}

impl Algorithm {
    pub const fn label(self) -> i64 {
        match self {
            Algorithm::EdDsa => -8,
        }
    }

    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            -8 => Some(Algorithm::EdDsa),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Ed25519,
}

impl Curve {
    pub const fn label(self) -> i64 {
        match self {
            Curve::Ed25519 => 6,
        }
    }

    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            6 => Some(Curve::Ed25519),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOperation {
    Sign,
    Verify,
}

impl KeyOperation {
    pub const fn label(self) -> i64 {
        match self {
            KeyOperation::Sign => 1,
            KeyOperation::Verify => 2,
        }
    }

    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            1 => Some(KeyOperation::Sign),
            2 => Some(KeyOperation::Verify),
            _ => None,
        }
    }
}

/// Exported public half of an Ed25519 identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    pub kty: KeyType,
    pub alg: Algorithm,
    pub crv: Curve,
    pub key_ops: Vec<KeyOperation>,
    pub x: [u8; 32],
}

impl CoseKey {
    /// Descriptor for an Ed25519 verifying key. Only `verify` is permitted.
    pub fn ed25519(public_key: [u8; 32]) -> Self {
        Self {
            kty: KeyType::Okp,
            alg: Algorithm::EdDsa,
            crv: Curve::Ed25519,
            key_ops: vec![KeyOperation::Verify],
            x: public_key,
        }
    }

    pub fn to_value(&self) -> Value {
        let ops = self
            .key_ops
            .iter()
            .map(|op| cbor::int(op.label()))
            .collect();
        MapBuilder::new()
            .insert(CoseKeyLabel::Kty.label(), cbor::int(self.kty.label()))
            .insert(CoseKeyLabel::Alg.label(), cbor::int(self.alg.label()))
            .insert(CoseKeyLabel::Crv.label(), cbor::int(self.crv.label()))
            .insert(CoseKeyLabel::KeyOps.label(), Value::Array(ops))
            .insert(CoseKeyLabel::X.label(), Value::Bytes(self.x.to_vec()))
            .build()
    }

    pub fn from_value(value: &Value) -> Result<Self, IdentityError> {
        let map = cbor::as_map(value).ok_or_else(|| invalid("not a map"))?;

        let label = |l: CoseKeyLabel| {
            cbor::map_get(map, l.label()).ok_or_else(|| invalid(format!("missing label {}", l.label())))
        };
        let int_label = |l: CoseKeyLabel| {
            label(l).and_then(|v| cbor::as_i64(v).ok_or_else(|| invalid(format!("label {} is not an integer", l.label()))))
        };

        let kty = KeyType::from_label(int_label(CoseKeyLabel::Kty)?)
            .ok_or_else(|| invalid("unsupported kty"))?;
        let alg = Algorithm::from_label(int_label(CoseKeyLabel::Alg)?)
            .ok_or_else(|| invalid("unsupported alg"))?;
        let crv = Curve::from_label(int_label(CoseKeyLabel::Crv)?)
            .ok_or_else(|| invalid("unsupported crv"))?;

        let key_ops = match cbor::map_get(map, CoseKeyLabel::KeyOps.label()) {
            None => Vec::new(),
            Some(v) => cbor::as_array(v)
                .ok_or_else(|| invalid("key_ops is not an array"))?
                .iter()
                .map(|op| {
                    cbor::as_i64(op)
                        .and_then(KeyOperation::from_label)
                        .ok_or_else(|| invalid("unsupported key operation"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let x_bytes = label(CoseKeyLabel::X)
            .and_then(|v| cbor::as_bytes(v).ok_or_else(|| invalid("x is not a byte string")))?;
        let x: [u8; 32] = x_bytes.try_into().map_err(|_| IdentityError::InvalidKeyLength {
            expected: 32,
            got: x_bytes.len(),
        })?;

        Ok(Self { kty, alg, crv, key_ops, x })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        cbor::to_vec(&self.to_value())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let value = cbor::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Address of the identity owning this key.
    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, IdentityError> {
        VerifyingKey::from_bytes(&self.x).map_err(|_| IdentityError::InvalidPublicKey)
    }
}

fn invalid(reason: impl Into<String>) -> IdentityError {
    IdentityError::InvalidCoseKey(reason.into())
}
