//! Identity module for request signing keypairs.
//!
//! Provides Ed25519 signing, mnemonic and PEM import, and the anonymous
//! identity used for unauthenticated calls.

use bip39::{Language, Mnemonic};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::address::Address;
use crate::cose::CoseKey;

/// Error type for identity operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid mnemonic")]
    InvalidMnemonic,
    #[error("invalid PEM")]
    InvalidPem,
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid COSE key: {0}")]
    InvalidCoseKey(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("the anonymous identity cannot sign")]
    AnonymousSigner,
}

/// Anything that can appear as the sender of a request.
///
/// `public_key` returns `None` for the anonymous identity; envelopes from
/// such a sender are not signed.
pub trait Identity: Send + Sync {
    fn address(&self) -> Address;

    fn public_key(&self) -> Option<CoseKey>;

    fn sign(&self, message: &[u8]) -> Result<[u8; 64], IdentityError>;
}

/// The identity with no key material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn address(&self) -> Address {
        Address::anonymous()
    }

    fn public_key(&self) -> Option<CoseKey> {
        None
    }

    fn sign(&self, _message: &[u8]) -> Result<[u8; 64], IdentityError> {
        Err(IdentityError::AnonymousSigner)
    }
}

/// Generate a fresh 12-word BIP-39 recovery phrase.
pub fn generate_mnemonic() -> String {
    let mut entropy = Zeroizing::new([0u8; 16]);
    OsRng.fill_bytes(&mut entropy[..]);
    // 128 bits is a valid BIP-39 entropy length
    Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .expect("16 bytes of entropy always form a mnemonic")
        .to_string()
}

/// An Ed25519 keypair identity.
///
/// Immutable once constructed. `SigningKey` zeroizes itself on drop.
#[derive(Clone)]
pub struct Ed25519Identity {
    sign_key: SigningKey,
}

impl Ed25519Identity {
    /// Generate a new random identity using a secure random source.
    pub fn generate() -> Self {
        Self {
            sign_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create an identity from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            sign_key: SigningKey::from_bytes(seed),
        }
    }

    /// Derive an identity from a BIP-39 phrase.
    ///
    /// Whitespace is normalized before validation. The key seed is the first
    /// 32 bytes of the BIP-39 seed (empty passphrase).
    pub fn from_mnemonic(phrase: &str) -> Result<Self, IdentityError> {
        let sanitized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &sanitized)
            .map_err(|_| IdentityError::InvalidMnemonic)?;

        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
        let mut key_seed = Zeroizing::new([0u8; 32]);
        key_seed.copy_from_slice(&seed[..32]);
        Ok(Self::from_seed(&key_seed))
    }

    /// Import a PKCS#8 PEM private key. The embedded private key bytes are
    /// used as the Ed25519 seed.
    pub fn from_pem(pem: &str) -> Result<Self, IdentityError> {
        let sign_key = SigningKey::from_pkcs8_pem(pem.trim()).map_err(|_| IdentityError::InvalidPem)?;
        Ok(Self { sign_key })
    }

    /// Export as a PKCS#8 `PRIVATE KEY` PEM document.
    pub fn to_pem(&self) -> Result<Zeroizing<String>, IdentityError> {
        self.sign_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|_| IdentityError::InvalidPem)
    }

    /// Get the Ed25519 public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.sign_key.verifying_key().to_bytes()
    }

    /// Private key bytes: seed followed by the public key.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.sign_key.to_keypair_bytes())
    }

    /// Sign a message using Ed25519.
    ///
    /// Returns a 64-byte signature.
    pub fn sign_bytes(&self, message: &[u8]) -> [u8; 64] {
        let signature: Signature = self.sign_key.sign(message);
        signature.to_bytes()
    }

    /// Verify a signature against this identity's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        verify(message, signature, &self.public_key_bytes())
    }

    pub fn public_key_descriptor(&self) -> CoseKey {
        CoseKey::ed25519(self.public_key_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.sign_key.verifying_key()
    }
}

impl Identity for Ed25519Identity {
    fn address(&self) -> Address {
        Address::from_public_key(&self.public_key_descriptor())
    }

    fn public_key(&self) -> Option<CoseKey> {
        Some(self.public_key_descriptor())
    }

    fn sign(&self, message: &[u8]) -> Result<[u8; 64], IdentityError> {
        Ok(self.sign_bytes(message))
    }
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Identity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature.
///
/// # Arguments
/// * `pub_key` - The signer's Ed25519 public key (32 bytes)
/// * `message` - The message that was signed
/// * `signature` - The 64-byte Ed25519 signature
pub fn verify_signature(
    pub_key: &[u8; 32],
    message: &[u8],
    signature: &[u8; 64],
) -> Result<(), IdentityError> {
    let verifying_key =
        VerifyingKey::from_bytes(pub_key).map_err(|_| IdentityError::InvalidPublicKey)?;
    let sig = Signature::from_bytes(signature);
    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| IdentityError::InvalidSignature)
}

/// Boolean form of [`verify_signature`] over unsized inputs. Wrong lengths
/// verify as false.
pub fn verify(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let (Ok(pub_key), Ok(sig)) = (
        <&[u8; 32]>::try_from(public_key),
        <&[u8; 64]>::try_from(signature),
    ) else {
        return false;
    };
    verify_signature(pub_key, message, sig).is_ok()
}
