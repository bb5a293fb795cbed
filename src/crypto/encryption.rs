//! AES-128-GCM envelope encryption of private JWKs.
//!
//! Each call to `seal` serializes the key, draws a fresh random 12-byte
//! nonce, and prepends it to the ciphertext. `open` splits the nonce back
//! out before decrypting and parses the plaintext as a single JWK.
//!
//! Layout of a sealed envelope:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::{HcjwkError, Result};
use crate::jwk::Jwk;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Seals and opens private JWKs under one fixed 16-byte subkey.
pub struct EnvelopeCipher {
    cipher: Aes128Gcm,
}

impl EnvelopeCipher {
    pub fn new(key: &[u8; 16]) -> Self {
        Self {
            cipher: Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key)),
        }
    }

    /// Encrypt `jwk`, returning nonce || ciphertext || tag.
    pub fn seal(&self, jwk: &Jwk) -> Result<Vec<u8>> {
        self.seal_with_rng(&mut rand::rng(), jwk)
    }

    /// Like `seal`, drawing the nonce from `rng`.
    pub fn seal_with_rng(&self, rng: &mut dyn RngCore, jwk: &Jwk) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(jwk.to_json()?);

        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| HcjwkError::Generation(format!("failed to seal JWK: {e}")))?;

        // Prepend the nonce so the record only needs to store one blob.
        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypt an envelope produced by `seal` and parse the JWK inside.
    ///
    /// The parsed key is not validated; callers classify it themselves.
    pub fn open(&self, sealed: &[u8]) -> Result<Jwk> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(HcjwkError::Decryption("input too short".into()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| HcjwkError::Decryption("authentication tag mismatch".into()))?;

        Jwk::from_json(&plaintext).map_err(|e| HcjwkError::Encoding(e.to_string()))
    }
}
