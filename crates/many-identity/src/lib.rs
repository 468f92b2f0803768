#![forbid(unsafe_code)]

pub mod address;
pub mod cbor;
pub mod cose;
pub mod hash;
pub mod identity;

#[cfg(test)]
mod proptests;

pub use address::Address;
pub use cose::{Algorithm, CoseKey, Curve, KeyOperation, KeyType};
pub use identity::{
    generate_mnemonic, verify, verify_signature, AnonymousIdentity, Ed25519Identity, Identity,
    IdentityError,
};
