//! MANY addresses: the identity reference carried in `from`/`to` fields.
//!
//! Binary form is a tagged byte string. The first byte selects the kind:
//! `0x00` is the anonymous address, `0x01` is followed by the SHA3-224 of
//! the owner's encoded COSE_Key.
//!
//! Text form is `m` + lowercase unpadded base32 of the bytes + a two
//! character checksum. The anonymous address is always `maa`.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;

use crate::cbor::{self, Value, TAG_ADDRESS};
use crate::cose::CoseKey;
use crate::hash::derive_key_id;
use crate::identity::IdentityError;

const ANONYMOUS_TEXT: &str = "maa";
const KIND_ANONYMOUS: u8 = 0x00;
const KIND_PUBLIC_KEY: u8 = 0x01;
const CHECKSUM_LEN: usize = 2;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Vec<u8>);

impl Address {
    pub fn anonymous() -> Self {
        Self(vec![KIND_ANONYMOUS])
    }

    pub fn from_public_key(key: &CoseKey) -> Self {
        let id = derive_key_id(&key.to_bytes());
        let mut bytes = Vec::with_capacity(1 + id.len());
        bytes.push(KIND_PUBLIC_KEY);
        bytes.extend_from_slice(&id);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        if bytes.is_empty() {
            return Err(IdentityError::InvalidAddress("empty address".into()));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == [KIND_ANONYMOUS]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Tag(TAG_ADDRESS, Box::new(Value::Bytes(self.0.clone())))
    }

    /// Accepts the tagged form, and a bare byte string for lenient peers.
    pub fn from_value(value: &Value) -> Result<Self, IdentityError> {
        let inner = cbor::untag(value, TAG_ADDRESS).unwrap_or(value);
        let bytes = cbor::as_bytes(inner)
            .ok_or_else(|| IdentityError::InvalidAddress("expected a byte string".into()))?;
        Self::from_bytes(bytes)
    }
}

fn checksum(bytes: &[u8]) -> String {
    let crc = crc32fast::hash(bytes);
    let mut encoded = BASE32_NOPAD.encode(&crc.to_be_bytes()).to_ascii_lowercase();
    encoded.truncate(CHECKSUM_LEN);
    encoded
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            return f.write_str(ANONYMOUS_TEXT);
        }
        let body = BASE32_NOPAD.encode(&self.0).to_ascii_lowercase();
        write!(f, "m{}{}", body, checksum(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ANONYMOUS_TEXT {
            return Ok(Self::anonymous());
        }
        let rest = s
            .strip_prefix('m')
            .ok_or_else(|| IdentityError::InvalidAddress(format!("missing 'm' prefix: {s}")))?;
        if !rest.is_ascii() || rest.len() <= CHECKSUM_LEN {
            return Err(IdentityError::InvalidAddress(format!("too short: {s}")));
        }
        let (body, sum) = rest.split_at(rest.len() - CHECKSUM_LEN);
        let bytes = BASE32_NOPAD
            .decode(body.to_ascii_uppercase().as_bytes())
            .map_err(|e| IdentityError::InvalidAddress(e.to_string()))?;
        if checksum(&bytes) != sum {
            return Err(IdentityError::InvalidAddress(format!("bad checksum: {s}")));
        }
        Self::from_bytes(&bytes)
    }
}
