#![forbid(unsafe_code)]

//! Opaque key handles for the vault master keys.
//!
//! The two 256-bit master keys are held in zeroize-on-drop newtypes and are
//! only ever exposed through scoped access methods. The 64-byte combined key
//! exists in two orderings, both of which matter for interoperability:
//!
//! - AES-SIV takes **MAC key first, then encryption key** ([`MasterKey::with_siv_key`]).
//! - JWT signing takes **encryption key first, then MAC key** ([`MasterKey::with_jwt_key`]).
//!
//! This asymmetry is part of the vault format and must not be "fixed".

use generic_array::{GenericArray, typenum::U64};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// A 256-bit AES key. Zeroed on drop.
pub struct EncryptionKey(Zeroizing<[u8; 32]>);

impl EncryptionKey {
    /// Wrap raw key material. The caller should zeroize its own copy.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A 256-bit HMAC-SHA256 key. Zeroed on drop.
pub struct MacKey(Zeroizing<[u8; 32]>);

impl MacKey {
    /// Wrap raw key material. The caller should zeroize its own copy.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// The master key pair of an unlocked vault.
///
/// Once constructed this is the sole persistent handle to key material; all
/// transient buffers built from it (SIV key, JWT key) are zeroed as soon as
/// the scoped callback returns.
pub struct MasterKey {
    enc: EncryptionKey,
    mac: MacKey,
}

/// 64-byte scratch key that zeroes itself when dropped.
struct CombinedKey(GenericArray<u8, U64>);

impl Drop for CombinedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl MasterKey {
    /// Pair an encryption key with a MAC key.
    pub fn new(enc: EncryptionKey, mac: MacKey) -> Self {
        Self { enc, mac }
    }

    /// Generate a fresh random master key pair from the system CSPRNG.
    pub fn random() -> Self {
        let mut enc = Zeroizing::new([0u8; 32]);
        let mut mac = Zeroizing::new([0u8; 32]);
        rand::rng().fill_bytes(&mut enc[..]);
        rand::rng().fill_bytes(&mut mac[..]);
        Self {
            enc: EncryptionKey::new(*enc),
            mac: MacKey::new(*mac),
        }
    }

    /// Scoped access to the raw encryption key.
    pub fn with_enc_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.enc.as_bytes())
    }

    /// Scoped access to the raw MAC key.
    pub fn with_mac_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.mac.as_bytes())
    }

    /// Scoped access to the combined key in AES-SIV order (MAC ‖ ENC).
    ///
    /// The 64-byte buffer is zeroed after the callback completes.
    pub fn with_siv_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&GenericArray<u8, U64>) -> R,
    {
        let mut key = CombinedKey(GenericArray::default());
        key.0[..32].copy_from_slice(self.mac.as_bytes());
        key.0[32..].copy_from_slice(self.enc.as_bytes());
        f(&key.0)
    }

    /// Scoped access to the combined key in JWT-signing order (ENC ‖ MAC).
    ///
    /// The 64-byte buffer is zeroed after the callback completes.
    pub fn with_jwt_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        let mut key = CombinedKey(GenericArray::default());
        key.0[..32].copy_from_slice(self.enc.as_bytes());
        key.0[32..].copy_from_slice(self.mac.as_bytes());
        f(&key.0)
    }

    /// Build a `jsonwebtoken` encoding key for signing the vault config.
    ///
    /// `EncodingKey` copies the secret internally; the scratch buffer is
    /// zeroed before this returns.
    pub fn create_jwt_encoding_key(&self) -> jsonwebtoken::EncodingKey {
        self.with_jwt_key(jsonwebtoken::EncodingKey::from_secret)
    }

    /// Validate and decode a JWT signed with the combined ENC ‖ MAC key.
    pub fn validate_jwt<T>(
        &self,
        token: &str,
        validation: &jsonwebtoken::Validation,
    ) -> Result<T, jsonwebtoken::errors::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        self.with_jwt_key(|key_bytes| {
            let decoding_key = jsonwebtoken::DecodingKey::from_secret(key_bytes);
            jsonwebtoken::decode::<T>(token, &decoding_key, validation)
                .map(|token_data| token_data.claims)
        })
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes must never reach logs.
        f.write_str("MasterKey(..)")
    }
}
