//! Selecting the identity requests are sent as
//!
//! The identity comes from, in order of preference:
//! - a PEM file given with `--pem`
//! - a mnemonic given with `--mnemonic` or `MANY_MNEMONIC`
//! - `identity.pem_path` in the config file
//! - otherwise the anonymous identity

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use many_identity::{Ed25519Identity, Identity, IdentityError};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::IdentityConfig;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("Failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write key file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: IdentityError,
    },

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Where the signing identity comes from
#[derive(Clone, PartialEq, Eq)]
pub enum IdentitySource {
    Pem(PathBuf),
    Mnemonic(Zeroizing<String>),
    Anonymous,
}

impl std::fmt::Debug for IdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pem(path) => f.debug_tuple("Pem").field(path).finish(),
            Self::Mnemonic(_) => f.write_str("Mnemonic(..)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl IdentitySource {
    /// Resolve command-line flags against the configuration.
    pub fn resolve(pem: Option<&Path>, mnemonic: Option<&str>, config: &IdentityConfig) -> Self {
        if let Some(path) = pem {
            return Self::Pem(path.to_path_buf());
        }
        if let Some(phrase) = mnemonic {
            return Self::Mnemonic(Zeroizing::new(phrase.to_string()));
        }
        match &config.pem_path {
            Some(path) => Self::Pem(path.clone()),
            None => Self::Anonymous,
        }
    }

    /// The signing key, or `None` for the anonymous identity.
    pub fn load_key(&self) -> Result<Option<Ed25519Identity>, KeyFileError> {
        match self {
            Self::Pem(path) => {
                let identity = load_pem(path)?;
                debug!(path = %path.display(), address = %identity.address(), "loaded PEM identity");
                Ok(Some(identity))
            }
            Self::Mnemonic(phrase) => Ok(Some(Ed25519Identity::from_mnemonic(phrase)?)),
            Self::Anonymous => Ok(None),
        }
    }
}

/// Read an Ed25519 key from a PKCS#8 PEM file.
pub fn load_pem(path: &Path) -> Result<Ed25519Identity, KeyFileError> {
    let contents = Zeroizing::new(fs::read_to_string(path).map_err(|source| KeyFileError::Read {
        path: path.to_path_buf(),
        source,
    })?);
    Ed25519Identity::from_pem(&contents).map_err(|source| KeyFileError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the key as PKCS#8 PEM, readable only by the owner on Unix.
pub fn write_pem(identity: &Ed25519Identity, path: &Path) -> Result<(), KeyFileError> {
    let pem = identity.to_pem()?;
    let write_err = |source| KeyFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    // Write atomically using a temp file
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }
    file.write_all(pem.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, path).map_err(write_err)
}
