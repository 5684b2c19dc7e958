#![forbid(unsafe_code)]

//! AES key wrapping as defined in IETF RFC 3394.
//!
//! Used to protect the two master keys under the scrypt-derived KEK inside
//! `masterkey.cryptomator`. Only AES-256 KEKs are supported, which is all the
//! vault format uses.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Initial value from RFC 3394 section 2.2.3.1.
const IV_3394: [u8; 8] = [0xa6; 8];

/// Errors from wrapping key material.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WrapError {
    /// The plaintext must be a non-empty multiple of 64 bits.
    #[error("key material to wrap must be a non-empty multiple of 8 bytes")]
    InvalidPlaintextLength,
}

/// Errors from unwrapping key material.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnwrapError {
    /// The ciphertext must be a multiple of 64 bits.
    #[error("wrapped key must be a multiple of 8 bytes")]
    InvalidCiphertextLength,
    /// The ciphertext must carry at least the integrity block plus one data block.
    #[error("wrapped key is too short")]
    CiphertextTooShort,
    /// The integrity register did not match the RFC 3394 IV after unwrapping.
    ///
    /// With a passphrase-derived KEK this is indistinguishable from a wrong
    /// passphrase.
    #[error("integrity check failed while unwrapping key")]
    IntegrityCheckFailed,
}

/// Wrap `plaintext` under `kek` per RFC 3394 section 2.2.1.
///
/// Returns `IV' ‖ R[1..n]`, 8 bytes longer than the input.
pub fn wrap_key(plaintext: &[u8], kek: &[u8; 32]) -> Result<Vec<u8>, WrapError> {
    if plaintext.is_empty() || plaintext.len() % 8 != 0 {
        return Err(WrapError::InvalidPlaintextLength);
    }

    let cipher = Aes256::new(kek.into());
    let n = plaintext.len() / 8;

    let mut a = Zeroizing::new(IV_3394);
    let mut registers = Zeroizing::new(plaintext.to_vec());
    let mut block = Block::default();

    for j in 0..6 {
        for i in 0..n {
            // B = AES(K, A | R[i])
            block[..8].copy_from_slice(&a[..]);
            block[8..].copy_from_slice(&registers[i * 8..(i + 1) * 8]);
            cipher.encrypt_block(&mut block);

            // A = MSB(64, B) ^ t where t = (n * j) + i + 1
            let t = (n * j + i + 1) as u64;
            a.copy_from_slice(&block[..8]);
            for (byte, t_byte) in a.iter_mut().zip(t.to_be_bytes()) {
                *byte ^= t_byte;
            }

            // R[i] = LSB(64, B)
            registers[i * 8..(i + 1) * 8].copy_from_slice(&block[8..]);
        }
    }
    block.zeroize();

    let mut ciphertext = Vec::with_capacity(8 + registers.len());
    ciphertext.extend_from_slice(&a[..]);
    ciphertext.extend_from_slice(&registers);
    Ok(ciphertext)
}

/// Unwrap `ciphertext` under `kek` per RFC 3394 section 2.2.2.
///
/// The result is zeroed on drop; callers move the bytes into a key handle.
pub fn unwrap_key(ciphertext: &[u8], kek: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>, UnwrapError> {
    if ciphertext.len() % 8 != 0 {
        return Err(UnwrapError::InvalidCiphertextLength);
    }
    if ciphertext.len() < 24 {
        return Err(UnwrapError::CiphertextTooShort);
    }

    let cipher = Aes256::new(kek.into());
    let n = ciphertext.len() / 8 - 1;

    let mut a = Zeroizing::new([0u8; 8]);
    a.copy_from_slice(&ciphertext[..8]);
    let mut registers = Zeroizing::new(ciphertext[8..].to_vec());
    let mut block = Block::default();

    for j in (0..6).rev() {
        for i in (0..n).rev() {
            // A = A ^ t; B = AES-1(K, A | R[i])
            let t = (n * j + i + 1) as u64;
            for (byte, t_byte) in a.iter_mut().zip(t.to_be_bytes()) {
                *byte ^= t_byte;
            }
            block[..8].copy_from_slice(&a[..]);
            block[8..].copy_from_slice(&registers[i * 8..(i + 1) * 8]);
            cipher.decrypt_block(&mut block);

            a.copy_from_slice(&block[..8]);
            registers[i * 8..(i + 1) * 8].copy_from_slice(&block[8..]);
        }
    }
    block.zeroize();

    if a[..] != IV_3394 {
        return Err(UnwrapError::IntegrityCheckFailed);
    }
    Ok(registers)
}
