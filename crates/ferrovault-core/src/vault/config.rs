#![forbid(unsafe_code)]

//! The `vault.cryptomator` document.
//!
//! A compact JWS (HS256) whose claims bind the vault format, the filename
//! shortening threshold, and the cipher combination to the master key
//! hierarchy. The signing secret is the 64-byte `ENC ‖ MAC` concatenation —
//! note this is the opposite ordering from the AES-SIV key.

use jsonwebtoken::{Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::crypto::keys::MasterKey;

/// The only vault format this crate understands.
pub const VAULT_FORMAT: i32 = 8;

/// Default shortening threshold for encoded filenames.
pub const DEFAULT_SHORTENING_THRESHOLD: usize = 220;

/// Fixed `kid` header value pointing at the sibling masterkey document.
pub const MASTERKEY_KID: &str = "masterkeyfile:masterkey.cryptomator";

/// Cipher combination of a vault.
///
/// Only `SIV_CTRMAC` (AES-SIV names, AES-CTR + HMAC-SHA256 content) is
/// supported; other combinations are rejected when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherCombo {
    SivCtrMac,
}

impl CipherCombo {
    pub fn as_str(self) -> &'static str {
        match self {
            CipherCombo::SivCtrMac => "SIV_CTRMAC",
        }
    }
}

/// Error returned when parsing an unsupported cipher combo string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCipherComboError(String);

impl fmt::Display for ParseCipherComboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported cipher combo: {}", self.0)
    }
}

impl std::error::Error for ParseCipherComboError {}

impl FromStr for CipherCombo {
    type Err = ParseCipherComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIV_CTRMAC" => Ok(CipherCombo::SivCtrMac),
            _ => Err(ParseCipherComboError(s.to_owned())),
        }
    }
}

/// Errors from signing or verifying the vault config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The token announces an algorithm other than HS256.
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported cipher combo: {0}")]
    UnsupportedCipherCombo(String),

    #[error("unsupported vault format: {0}")]
    UnsupportedFormat(i32),
}

impl ConfigError {
    /// Whether this error means the token's signature did not verify, as
    /// opposed to the token being malformed or carrying unsupported claims.
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            ConfigError::Jwt(e)
                if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::InvalidSignature)
        )
    }
}

/// Claims carried by `vault.cryptomator`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfigClaims {
    pub format: i32,
    #[serde(default = "default_shortening_threshold")]
    pub shortening_threshold: i32,
    /// Freshly generated UUIDv4 labeling this config; carried but not
    /// validated beyond existence.
    pub jti: String,
    pub cipher_combo: String,
}

fn default_shortening_threshold() -> i32 {
    DEFAULT_SHORTENING_THRESHOLD as i32
}

impl VaultConfigClaims {
    /// Claims for a fresh vault with a random `jti`.
    pub fn new(shortening_threshold: usize) -> Self {
        Self {
            format: VAULT_FORMAT,
            shortening_threshold: shortening_threshold as i32,
            jti: uuid::Uuid::new_v4().to_string(),
            cipher_combo: CipherCombo::SivCtrMac.as_str().to_string(),
        }
    }

    /// The shortening threshold clamped to a usable range.
    pub fn shortening_threshold(&self) -> usize {
        self.shortening_threshold.max(0) as usize
    }
}

/// Sign the claims into a compact JWS with the fixed header
/// `{ kid: "masterkeyfile:masterkey.cryptomator", typ: "JWT", alg: "HS256" }`.
pub fn sign_vault_config(
    claims: &VaultConfigClaims,
    master_key: &MasterKey,
) -> Result<String, ConfigError> {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(MASTERKEY_KID.to_string());

    let encoding_key = master_key.create_jwt_encoding_key();
    Ok(jsonwebtoken::encode(&header, claims, &encoding_key)?)
}

/// Verify a vault config token and return its claims.
///
/// Rejects any algorithm other than HS256 before touching the signature, and
/// rejects supported-but-wrong `format`/`cipherCombo` values after it.
pub fn verify_vault_config(
    token: &str,
    master_key: &MasterKey,
) -> Result<VaultConfigClaims, ConfigError> {
    let header = jsonwebtoken::decode_header(token)?;
    if header.alg != Algorithm::HS256 {
        return Err(ConfigError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let claims: VaultConfigClaims = master_key.validate_jwt(token, &validation)?;

    claims
        .cipher_combo
        .parse::<CipherCombo>()
        .map_err(|_| ConfigError::UnsupportedCipherCombo(claims.cipher_combo.clone()))?;
    if claims.format != VAULT_FORMAT {
        return Err(ConfigError::UnsupportedFormat(claims.format));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose};

    #[test]
    fn sign_verify_roundtrip() {
        let master_key = MasterKey::random();
        let claims = VaultConfigClaims::new(220);

        let token = sign_vault_config(&claims, &master_key).unwrap();
        let verified = verify_vault_config(&token, &master_key).unwrap();
        assert_eq!(claims, verified);
    }

    #[test]
    fn emitted_header_is_fixed() {
        let master_key = MasterKey::random();
        let token = sign_vault_config(&VaultConfigClaims::new(220), &master_key).unwrap();

        let header_b64 = token.split('.').next().unwrap();
        let header_json = String::from_utf8(
            general_purpose::URL_SAFE_NO_PAD
                .decode(header_b64.as_bytes())
                .unwrap(),
        )
        .unwrap();

        assert!(header_json.contains("\"alg\":\"HS256\""));
        assert!(header_json.contains("\"typ\":\"JWT\""));
        assert!(header_json.contains("\"kid\":\"masterkeyfile:masterkey.cryptomator\""));
    }

    #[test]
    fn wrong_key_fails_verification_as_signature_error() {
        let signer = MasterKey::random();
        let verifier = MasterKey::random();
        let token = sign_vault_config(&VaultConfigClaims::new(220), &signer).unwrap();

        let err = verify_vault_config(&token, &verifier).unwrap_err();
        assert!(err.is_signature_failure(), "unexpected error: {err}");
    }

    #[test]
    fn flipped_signature_bit_fails_verification() {
        let master_key = MasterKey::random();
        let token = sign_vault_config(&VaultConfigClaims::new(220), &master_key).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut sig = general_purpose::URL_SAFE_NO_PAD
            .decode(parts[2].as_bytes())
            .unwrap();
        sig[0] ^= 0x01;
        parts[2] = general_purpose::URL_SAFE_NO_PAD.encode(&sig);
        let tampered = parts.join(".");

        let err = verify_vault_config(&tampered, &master_key).unwrap_err();
        assert!(err.is_signature_failure(), "unexpected error: {err}");
    }

    #[test]
    fn rejects_non_hs256_algorithms() {
        let master_key = MasterKey::random();
        let claims = VaultConfigClaims::new(220);

        let header = Header::new(Algorithm::HS384);
        let token = master_key.with_jwt_key(|key| {
            jsonwebtoken::encode(
                &header,
                &claims,
                &jsonwebtoken::EncodingKey::from_secret(key),
            )
            .unwrap()
        });

        assert!(matches!(
            verify_vault_config(&token, &master_key),
            Err(ConfigError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_unknown_cipher_combo() {
        let master_key = MasterKey::random();
        let mut claims = VaultConfigClaims::new(220);
        claims.cipher_combo = "SIV_GCM".to_string();

        let token = sign_vault_config(&claims, &master_key).unwrap();
        assert!(matches!(
            verify_vault_config(&token, &master_key),
            Err(ConfigError::UnsupportedCipherCombo(_))
        ));
    }

    #[test]
    fn rejects_wrong_format() {
        let master_key = MasterKey::random();
        let mut claims = VaultConfigClaims::new(220);
        claims.format = 7;

        let token = sign_vault_config(&claims, &master_key).unwrap();
        assert!(matches!(
            verify_vault_config(&token, &master_key),
            Err(ConfigError::UnsupportedFormat(7))
        ));
    }

    #[test]
    fn jti_is_a_uuid_and_unique_per_config() {
        let a = VaultConfigClaims::new(220);
        let b = VaultConfigClaims::new(220);
        assert_ne!(a.jti, b.jti);
        assert!(uuid::Uuid::parse_str(&a.jti).is_ok());
    }

    #[test]
    fn missing_threshold_defaults_to_220() {
        let json = r#"{"format":8,"jti":"x","cipherCombo":"SIV_CTRMAC"}"#;
        let claims: VaultConfigClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.shortening_threshold(), 220);
    }
}
