//! Cryptographic primitives for the vault key hierarchy.

pub mod key_wrap;
pub mod keys;

pub use keys::{EncryptionKey, MacKey, MasterKey};
