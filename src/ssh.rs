//! SSH public keys used to authenticate clients.
//!
//! Keys are kept in the OpenSSH wire encoding (`string type, string key`) so
//! they round-trip through `authorized_keys`-style base64 unchanged.

use std::{fmt, fs, io, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{VerifyingKey, PUBLIC_KEY_LENGTH};
use thiserror::Error;

/// OpenSSH name of Ed25519 keys, the only supported type.
pub const ED25519_KEY_TYPE: &str = "ssh-ed25519";

/// Error returned when importing a key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key material is malformed.
    #[error(
        "Failed importing public key from base64 format. Key: {key}, Type: {key_type}: \
         {reason}"
    )]
    ImportFailure {
        /// The encoded key as given.
        key: String,
        /// The key type as given.
        key_type: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The key file could not be read.
    #[error(
        "Can't import ssh public key from file {path} as it doesn't exist or permission \
         denied"
    )]
    FileAccessFailure {
        /// Path as given.
        path: String,
        /// Underlying read error.
        #[source]
        source: io::Error,
    },
    /// The key type is not `ssh-ed25519`.
    #[error("unsupported ssh key type {0}")]
    UnsupportedKeyType(String),
}

/// A validated SSH public key with its original wire encoding.
#[derive(Clone)]
pub struct SshPublicKey {
    key_type: String,
    blob: Vec<u8>,
    key: VerifyingKey,
}

impl SshPublicKey {
    /// Import the base64 wire encoding of a key of type `key_type`.
    pub fn from_base64(base64: &str, key_type: &str) -> Result<Self, KeyError> {
        if key_type != ED25519_KEY_TYPE {
            return Err(KeyError::UnsupportedKeyType(key_type.to_string()));
        }
        let import_failure = |reason: String| KeyError::ImportFailure {
            key: base64.to_string(),
            key_type: key_type.to_string(),
            reason,
        };

        let blob = STANDARD
            .decode(base64.trim())
            .map_err(|err| import_failure(err.to_string()))?;
        let key = parse_ed25519_blob(&blob).map_err(import_failure)?;

        Ok(Self {
            key_type: key_type.to_string(),
            blob,
            key,
        })
    }

    /// Import the first key line (`type base64 [comment]`) of an OpenSSH
    /// public key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| KeyError::FileAccessFailure {
            path: path.display().to_string(),
            source,
        })?;

        let line = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .unwrap_or_default();
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(key_type), Some(base64)) => Self::from_base64(base64, key_type),
            _ => Err(KeyError::ImportFailure {
                key: line.to_string(),
                key_type: String::new(),
                reason: format!("{} holds no public key line", path.display()),
            }),
        }
    }

    /// Base64 wire encoding, as accepted by [`SshPublicKey::from_base64`].
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.blob)
    }

    /// OpenSSH key type, e.g. `ssh-ed25519`.
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// The key for signature checks.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

impl PartialEq for SshPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_type == other.key_type && self.key == other.key
    }
}

impl Eq for SshPublicKey {}

impl fmt::Debug for SshPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshPublicKey")
            .field("key_type", &self.key_type)
            .field("key", &self.to_base64())
            .finish()
    }
}

fn read_string<'a>(buf: &mut &'a [u8]) -> Option<&'a [u8]> {
    let (len, rest) = buf.split_first_chunk::<4>()?;
    let len = u32::from_be_bytes(*len) as usize;
    if rest.len() < len {
        return None;
    }
    let (value, rest) = rest.split_at(len);
    *buf = rest;
    Some(value)
}

fn parse_ed25519_blob(blob: &[u8]) -> Result<VerifyingKey, String> {
    let mut buf = blob;
    let key_type = read_string(&mut buf).ok_or("truncated key type")?;
    if key_type != ED25519_KEY_TYPE.as_bytes() {
        return Err(format!(
            "encoded key type {} does not match {ED25519_KEY_TYPE}",
            String::from_utf8_lossy(key_type)
        ));
    }
    let key = read_string(&mut buf).ok_or("truncated key material")?;
    if !buf.is_empty() {
        return Err(format!("{} trailing bytes after key", buf.len()));
    }
    let key: &[u8; PUBLIC_KEY_LENGTH] = key
        .try_into()
        .map_err(|_| format!("ed25519 key must be {PUBLIC_KEY_LENGTH} bytes, got {}", key.len()))?;
    VerifyingKey::from_bytes(key).map_err(|err| err.to_string())
}
