//! Subkey derivation using HKDF-SHA256.
//!
//! From a single master secret we derive:
//! - A **domain registration key** (MAC key for registration tokens).
//! - An **encryption id** naming the current private-JWK encryption epoch.
//! - An **encryption key** (AES-128) for sealing private JWKs.
//!
//! HKDF (RFC 5869) first extracts a pseudo-random key from the master
//! secret with the application name as salt, then expands it once per
//! context label (`info`) into independent subkeys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{HcjwkError, Result};

/// Minimum decoded length of the master secret (128 bits).
pub const MASTER_SECRET_MIN_LEN: usize = 16;

/// Configured master-secret value that requests an ephemeral secret.
pub const RANDOM_MASTER_SECRET: &str = "random";

/// A context label and the number of bytes to expand for it.
#[derive(Debug, Clone, Copy)]
pub struct HkdfInfo {
    pub info: &'static [u8],
    pub length: usize,
}

/// MAC key for the domain registration token.
pub const DOMAIN_REG_KEY_INFO: HkdfInfo = HkdfInfo {
    info: b"domain registration key",
    length: 32,
};

/// Identifier of the AES key that encrypts private JWKs.
pub const ENCRYPTION_ID_INFO: HkdfInfo = HkdfInfo {
    info: b"hostconf JWK encryption id",
    length: 8,
};

/// AES-128-GCM key for private JWKs.
pub const ENCRYPTION_KEY_INFO: HkdfInfo = HkdfInfo {
    info: b"hostconf JWK encryption key",
    length: 16,
};

/// Derive `hi.length` bytes from `master_secret`, salted with `salt`.
///
/// The same inputs always produce the same output.
pub fn derive(master_secret: &[u8], salt: &[u8], hi: HkdfInfo) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_secret);

    let mut okm = Zeroizing::new(vec![0u8; hi.length]);
    hk.expand(hi.info, &mut okm)
        .map_err(|e| HcjwkError::Derivation(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// Decode a configured master secret (URL-safe base64, padding optional).
///
/// `random` yields a fresh ephemeral secret; anything that does not
/// decode to at least 16 bytes is a configuration error.
pub fn decode_master_secret(encoded: &str) -> Result<Zeroizing<Vec<u8>>> {
    let encoded = encoded.trim();

    if encoded == RANDOM_MASTER_SECRET {
        tracing::warn!("using an ephemeral random master secret, keys will not survive a restart");
        let mut secret = Zeroizing::new(vec![0u8; MASTER_SECRET_MIN_LEN]);
        rand::rng().fill_bytes(&mut secret);
        return Ok(secret);
    }

    let secret = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map(Zeroizing::new)
        .map_err(|e| HcjwkError::config("secret", format!("failed to decode master secret: {e}")))?;

    if secret.len() < MASTER_SECRET_MIN_LEN {
        return Err(HcjwkError::config(
            "secret",
            format!(
                "master secret is too short, expected at least {MASTER_SECRET_MIN_LEN} bytes (got {})",
                secret.len()
            ),
        ));
    }

    Ok(secret)
}

/// Generate a new master secret, encoded the way the config expects it.
pub fn generate_master_secret() -> String {
    let mut raw = Zeroizing::new([0u8; MASTER_SECRET_MIN_LEN]);
    rand::rng().fill_bytes(&mut raw[..]);
    URL_SAFE_NO_PAD.encode(&raw[..])
}

/// The subkeys derived from the master secret at startup.
///
/// Derived exactly once and read-only afterwards. Key bytes are wiped
/// from memory on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AppSecrets {
    domain_reg_key: [u8; 32],
    encryption_key: [u8; 16],
    encryption_id: String,
}

impl AppSecrets {
    /// Decode `encoded` and derive every subkey with `app_name` as salt.
    pub fn from_master_secret(encoded: &str, app_name: &str) -> Result<Self> {
        let secret = decode_master_secret(encoded)?;
        Self::derive(&secret, app_name.as_bytes())
    }

    /// Derive every subkey from raw master-secret bytes.
    pub fn derive(master_secret: &[u8], salt: &[u8]) -> Result<Self> {
        let mut secrets = Self {
            domain_reg_key: [0u8; 32],
            encryption_key: [0u8; 16],
            encryption_id: String::new(),
        };

        let reg = derive(master_secret, salt, DOMAIN_REG_KEY_INFO)?;
        secrets.domain_reg_key.copy_from_slice(&reg);

        let key = derive(master_secret, salt, ENCRYPTION_KEY_INFO)?;
        secrets.encryption_key.copy_from_slice(&key);

        let id = derive(master_secret, salt, ENCRYPTION_ID_INFO)?;
        secrets.encryption_id = hex::encode(id.as_slice());

        Ok(secrets)
    }

    /// MAC key for domain registration tokens.
    pub fn domain_reg_key(&self) -> &[u8; 32] {
        &self.domain_reg_key
    }

    /// AES-128 key for private JWK envelopes.
    pub fn encryption_key(&self) -> &[u8; 16] {
        &self.encryption_key
    }

    /// Hex label of the current encryption epoch (16 characters).
    pub fn encryption_id(&self) -> &str {
        &self.encryption_id
    }
}

impl std::fmt::Debug for AppSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSecrets")
            .field("encryption_id", &self.encryption_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"idmsvc-backend";

    #[test]
    fn derive_matches_known_answer() {
        let hi = HkdfInfo {
            info: b"test",
            length: 8,
        };
        let out = derive(b"mainSecret", SALT, hi).unwrap();
        assert_eq!(
            out.as_slice(),
            &[0xe7, 0x84, 0x18, 0xae, 0xc6, 0x4d, 0xe5, 0x42]
        );
    }

    #[test]
    fn derive_honours_requested_length() {
        for hi in [DOMAIN_REG_KEY_INFO, ENCRYPTION_ID_INFO, ENCRYPTION_KEY_INFO] {
            assert_eq!(derive(b"mainSecret", SALT, hi).unwrap().len(), hi.length);
        }
    }

    #[test]
    fn derive_rejects_oversized_output() {
        let hi = HkdfInfo {
            info: b"too long",
            length: 255 * 32 + 1,
        };
        assert!(matches!(
            derive(b"mainSecret", SALT, hi),
            Err(HcjwkError::Derivation(_))
        ));
    }

    #[test]
    fn app_secrets_for_zero_secret() {
        let secrets = AppSecrets::derive(&[0u8; 16], SALT).unwrap();
        assert_eq!(secrets.encryption_id(), "df180658d865cd56");
        assert_eq!(
            hex::encode(secrets.encryption_key()),
            "e16c6e437a5137b619151243fec2bb31"
        );
        assert_eq!(
            hex::encode(secrets.domain_reg_key()),
            "045611527a81d6948d65eb8d3db43aa6c15299a0c0864e87dd318dcec708049c"
        );
    }

    #[test]
    fn different_salt_gives_different_subkeys() {
        let a = AppSecrets::derive(&[0u8; 16], SALT).unwrap();
        let b = AppSecrets::derive(&[0u8; 16], b"other-service").unwrap();
        assert_ne!(a.encryption_id(), b.encryption_id());
        assert_ne!(a.encryption_key(), b.encryption_key());
    }

    #[test]
    fn decode_accepts_padded_and_unpadded() {
        let unpadded = URL_SAFE_NO_PAD.encode([7u8; 16]);
        let padded = format!("{unpadded}==");
        assert_eq!(decode_master_secret(&unpadded).unwrap().as_slice(), &[7u8; 16]);
        assert_eq!(decode_master_secret(&padded).unwrap().as_slice(), &[7u8; 16]);
    }

    #[test]
    fn decode_rejects_short_secret() {
        let short = URL_SAFE_NO_PAD.encode([1u8; 15]);
        let err = decode_master_secret(&short).unwrap_err();
        assert!(matches!(err, HcjwkError::Config { field: "secret", .. }));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_master_secret("not base64 !!"),
            Err(HcjwkError::Config { field: "secret", .. })
        ));
    }

    #[test]
    fn random_secret_is_accepted_and_ephemeral() {
        let a = decode_master_secret(RANDOM_MASTER_SECRET).unwrap();
        let b = decode_master_secret(RANDOM_MASTER_SECRET).unwrap();
        assert_eq!(a.len(), MASTER_SECRET_MIN_LEN);
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn generated_secret_decodes() {
        let encoded = generate_master_secret();
        assert_eq!(
            decode_master_secret(&encoded).unwrap().len(),
            MASTER_SECRET_MIN_LEN
        );
    }

    #[test]
    fn debug_does_not_print_key_bytes() {
        let secrets = AppSecrets::derive(&[0u8; 16], SALT).unwrap();
        let shown = format!("{secrets:?}");
        assert!(shown.contains("df180658d865cd56"));
        assert!(!shown.contains("e16c6e43"));
    }
}
