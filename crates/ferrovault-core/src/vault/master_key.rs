#![forbid(unsafe_code)]

//! The `masterkey.cryptomator` document.
//!
//! Holds the two master keys wrapped (RFC 3394) under a KEK derived from the
//! user password via scrypt, plus the scrypt parameters, the salt, and an
//! HMAC over the vault format number that lets an unlocked vault detect a
//! downgraded or tampered document.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::key_wrap::{self, UnwrapError, WrapError};
use crate::crypto::keys::{EncryptionKey, MacKey, MasterKey};

/// Legacy masterkey file version; fixed at 999 since vault format 8.
pub const MASTERKEY_VERSION: u32 = 999;

/// Default scrypt cost parameter N (2^15).
pub const DEFAULT_SCRYPT_COST_PARAM: u32 = 32768;
/// Default scrypt block size parameter r.
pub const DEFAULT_SCRYPT_BLOCK_SIZE: u32 = 8;

/// scrypt parallelization is fixed at 1 by the vault format.
const SCRYPT_PARALLELIZATION: u32 = 1;
const SCRYPT_SALT_LENGTH: usize = 32;

/// Errors from reading, unlocking, or producing a masterkey document.
#[derive(Error, Debug)]
pub enum MasterKeyError {
    #[error("invalid scrypt parameters: {0}")]
    InvalidScryptParams(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The RFC 3394 integrity check failed during unwrapping.
    ///
    /// Wrong password and tampered document are cryptographically
    /// indistinguishable here; wrong password is by far the common cause.
    #[error("key unwrap failed: incorrect password or corrupted vault")]
    KeyUnwrap,

    #[error("wrapped key is malformed")]
    MalformedWrappedKey,

    #[error("unwrapped key has invalid length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("key wrap failed: {0}")]
    Wrap(#[from] WrapError),

    #[error("masterkey document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rng failure: {0}")]
    Rng(String),

    /// The format MAC did not verify; the document was tampered with or the
    /// vault config's format claim does not belong to this masterkey.
    #[error("vault format MAC mismatch")]
    VersionMacMismatch,
}

impl From<UnwrapError> for MasterKeyError {
    fn from(err: UnwrapError) -> Self {
        match err {
            UnwrapError::IntegrityCheckFailed => MasterKeyError::KeyUnwrap,
            UnwrapError::InvalidCiphertextLength | UnwrapError::CiphertextTooShort => {
                MasterKeyError::MalformedWrappedKey
            }
        }
    }
}

/// The JSON body of `masterkey.cryptomator`.
#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyFile {
    /// Legacy version field; always 999.
    pub version: u32,

    /// scrypt salt (32 random bytes).
    #[serde_as(as = "Base64")]
    pub scrypt_salt: Vec<u8>,

    /// scrypt cost parameter N; must be a power of two.
    pub scrypt_cost_param: u32,

    /// scrypt block size parameter r.
    pub scrypt_block_size: u32,

    /// The wrapped AES master key (RFC 3394 ciphertext).
    #[serde_as(as = "Base64")]
    pub primary_master_key: Vec<u8>,

    /// The wrapped HMAC master key (RFC 3394 ciphertext).
    #[serde_as(as = "Base64")]
    pub hmac_master_key: Vec<u8>,

    /// HMAC-SHA256 of the UTF-8 decimal vault format, keyed by the MAC key.
    #[serde_as(as = "Base64")]
    pub version_mac: Vec<u8>,
}

impl MasterKeyFile {
    /// Parse the document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, MasterKeyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the document to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, MasterKeyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Derive the KEK from a password using the document's scrypt parameters.
    pub fn derive_kek(&self, password: &str) -> Result<SecretBox<[u8; 32]>, MasterKeyError> {
        derive_kek(
            password,
            &self.scrypt_salt,
            self.scrypt_cost_param,
            self.scrypt_block_size,
        )
    }

    /// Unlock the document: derive the KEK and unwrap both master keys.
    pub fn unlock(&self, password: &str) -> Result<MasterKey, MasterKeyError> {
        let kek = self.derive_kek(password)?;
        self.unlock_with_kek(&kek)
    }

    fn unlock_with_kek(&self, kek: &SecretBox<[u8; 32]>) -> Result<MasterKey, MasterKeyError> {
        let enc_raw = key_wrap::unwrap_key(&self.primary_master_key, kek.expose_secret())?;
        let enc_bytes: [u8; 32] =
            enc_raw
                .as_slice()
                .try_into()
                .map_err(|_| MasterKeyError::InvalidKeyLength {
                    expected: 32,
                    actual: enc_raw.len(),
                })?;

        let mac_raw = key_wrap::unwrap_key(&self.hmac_master_key, kek.expose_secret())?;
        let mac_bytes: [u8; 32] =
            mac_raw
                .as_slice()
                .try_into()
                .map_err(|_| MasterKeyError::InvalidKeyLength {
                    expected: 32,
                    actual: mac_raw.len(),
                })?;

        Ok(MasterKey::new(
            EncryptionKey::new(enc_bytes),
            MacKey::new(mac_bytes),
        ))
    }

    /// Check the format MAC against the vault format announced by the
    /// (already signature-verified) vault config.
    pub fn verify_version_mac(
        &self,
        master_key: &MasterKey,
        format: i32,
    ) -> Result<(), MasterKeyError> {
        master_key.with_mac_key(|mac_key| {
            let key = hmac::Key::new(hmac::HMAC_SHA256, mac_key);
            hmac::verify(&key, format.to_string().as_bytes(), &self.version_mac)
                .map_err(|_| MasterKeyError::VersionMacMismatch)
        })
    }
}

/// Derive a 32-byte KEK with `scrypt(password, salt, N, r, p=1)`.
fn derive_kek(
    password: &str,
    salt: &[u8],
    cost_param: u32,
    block_size: u32,
) -> Result<SecretBox<[u8; 32]>, MasterKeyError> {
    if cost_param < 2 || !cost_param.is_power_of_two() {
        return Err(MasterKeyError::InvalidScryptParams(format!(
            "cost parameter {cost_param} is not a power of two"
        )));
    }
    let log2_n = cost_param.trailing_zeros() as u8;

    let params = scrypt::Params::new(log2_n, block_size, SCRYPT_PARALLELIZATION, 32).map_err(
        |e| {
            MasterKeyError::InvalidScryptParams(format!(
                "N=2^{log2_n}, r={block_size}, p={SCRYPT_PARALLELIZATION}: {e}"
            ))
        },
    )?;

    let mut kek = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut kek[..])
        .map_err(|e| MasterKeyError::KeyDerivation(e.to_string()))?;

    Ok(SecretBox::new(Box::new(*kek)))
}

/// Build a masterkey document wrapping `master_key` under `password`.
///
/// `format` is the vault format the document belongs to; its decimal UTF-8
/// rendering is what the `versionMac` covers.
pub fn create_masterkey_file(
    master_key: &MasterKey,
    password: &str,
    format: i32,
    cost_param: u32,
    block_size: u32,
) -> Result<MasterKeyFile, MasterKeyError> {
    let mut salt = vec![0u8; SCRYPT_SALT_LENGTH];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| MasterKeyError::Rng("failed to generate scrypt salt".to_string()))?;

    let kek = derive_kek(password, &salt, cost_param, block_size)?;

    // Wrap order matches the reference implementations: encryption key first.
    let wrapped_enc =
        master_key.with_enc_key(|key| key_wrap::wrap_key(key, kek.expose_secret()))?;
    let wrapped_mac =
        master_key.with_mac_key(|key| key_wrap::wrap_key(key, kek.expose_secret()))?;

    let version_mac = master_key.with_mac_key(|key| {
        let hmac_key = hmac::Key::new(hmac::HMAC_SHA256, key);
        hmac::sign(&hmac_key, format.to_string().as_bytes())
            .as_ref()
            .to_vec()
    });

    Ok(MasterKeyFile {
        version: MASTERKEY_VERSION,
        scrypt_salt: salt,
        scrypt_cost_param: cost_param,
        scrypt_block_size: block_size,
        primary_master_key: wrapped_enc,
        hmac_master_key: wrapped_mac,
        version_mac,
    })
}

/// Re-wrap the master keys of an existing document under a new password.
///
/// The master keys themselves never change, only the password-derived KEK.
/// Returns the JSON text of the replacement document.
pub fn change_password(
    document_json: &str,
    old_password: &str,
    new_password: &str,
    format: i32,
) -> Result<String, MasterKeyError> {
    let document = MasterKeyFile::from_json(document_json)?;
    let master_key = document.unlock(old_password)?;
    let replacement = create_masterkey_file(
        &master_key,
        new_password,
        format,
        document.scrypt_cost_param,
        document.scrypt_block_size,
    )?;
    replacement.to_json()
}
