//! Crate-level error taxonomy.
//!
//! Module-local errors (`NameError`, `MasterKeyError`, `ConfigError`,
//! `ProviderError`) describe *what* failed; [`VaultError`] is the stable
//! surface callers match on. Messages may include storage paths but never
//! key material, passwords, or derived secrets.

use std::fmt;
use thiserror::Error;

use crate::provider::ProviderError;

/// What a decryption or signature failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionTarget {
    /// The vault as a whole (masterkey unwrap, config integrity).
    Vault,
    /// A single encrypted item name.
    ItemName,
    /// An encrypted file header.
    FileHeader,
    /// Encrypted file content.
    FileContent,
}

impl fmt::Display for DecryptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecryptionTarget::Vault => "vault",
            DecryptionTarget::ItemName => "item name",
            DecryptionTarget::FileHeader => "file header",
            DecryptionTarget::FileContent => "file content",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// A path that must not exist already does (`create`, `create_directory`).
    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    /// Authenticated decryption failed.
    ///
    /// For [`DecryptionTarget::Vault`] this almost always means a wrong
    /// password (AES-KW integrity check); for
    /// [`DecryptionTarget::ItemName`] it means the stored name was tampered
    /// with, moved between directories, or encrypted under a different key.
    /// The cause is deliberately opaque.
    #[error("failed to decrypt {target} ({})", item.as_deref().unwrap_or("no item context"))]
    Decryption {
        target: DecryptionTarget,
        item: Option<String>,
    },

    /// JWT signature verification of the vault config failed.
    #[error("signature verification failed for {target} configuration")]
    InvalidSignature { target: DecryptionTarget },

    /// An error surfaced from the storage backend, propagated unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A vault document could not be parsed or carries unsupported values.
    #[error("malformed {what}: {reason}")]
    Document { what: &'static str, reason: String },

    /// An internal cryptographic operation failed unexpectedly.
    #[error("cryptographic failure: {reason}")]
    Crypto { reason: String },
}

impl VaultError {
    /// Decryption failure for the vault key hierarchy.
    pub(crate) fn vault_decryption() -> Self {
        VaultError::Decryption {
            target: DecryptionTarget::Vault,
            item: None,
        }
    }

    /// Decryption failure for a single item name.
    pub(crate) fn item_name_decryption(item: impl Into<String>) -> Self {
        VaultError::Decryption {
            target: DecryptionTarget::ItemName,
            item: Some(item.into()),
        }
    }

    pub(crate) fn crypto(reason: impl Into<String>) -> Self {
        VaultError::Crypto {
            reason: reason.into(),
        }
    }
}
