//! `KeyRecord`: one stored signing key.
//!
//! The public JWK is stored as plaintext JSON, the private JWK only as a
//! sealed envelope tagged with the encryption id it was sealed under.

use chrono::{DateTime, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::crypto::EnvelopeCipher;
use crate::errors::{HcjwkError, Result};
use crate::jwk::{parse_one, Jwk, KeyRejection, KeyState};

/// A persisted signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Primary key; equals the JWK's kid.
    pub kid: String,
    /// Serialized public JWK.
    pub public_jwk: String,
    /// nonce || ciphertext || tag of the serialized private JWK.
    pub encrypted_jwk: Vec<u8>,
    /// Hex label of the subkey `encrypted_jwk` was sealed under.
    pub encryption_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Build a record for a freshly generated private key.
    ///
    /// The sealed bytes are opened again and compared with `private`
    /// before the record is returned, so a record never carries an
    /// envelope that cannot be read back under the current subkey.
    pub fn seal(
        private: &Jwk,
        cipher: &EnvelopeCipher,
        rng: &mut dyn RngCore,
        encryption_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if !private.is_private() {
            return Err(HcjwkError::Validation(format!(
                "key '{}' has no private part",
                private.kid
            )));
        }
        let exp = private
            .exp
            .ok_or_else(|| HcjwkError::Validation("missing or invalid 'exp'".into()))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| HcjwkError::Validation(format!("'exp' {exp} is out of range")))?;

        let encrypted_jwk = cipher.seal_with_rng(rng, private)?;
        if cipher.open(&encrypted_jwk)? != *private {
            return Err(HcjwkError::Generation(
                "sealed JWK does not round-trip".into(),
            ));
        }

        let public_jwk = String::from_utf8(private.public().to_json()?)
            .map_err(|e| HcjwkError::Encoding(format!("public JWK is not UTF-8: {e}")))?;

        Ok(Self {
            kid: private.kid.clone(),
            public_jwk,
            encrypted_jwk,
            encryption_id: encryption_id.to_string(),
            expires_at,
            revoked_at: None,
            created_at,
        })
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Parse and validate the stored public JWK.
    pub fn public_jwk(&self, now: DateTime<Utc>) -> std::result::Result<Jwk, KeyRejection> {
        let key = parse_one(self.public_jwk.as_bytes(), now)?;
        if key.kid != self.kid {
            return Err(KeyRejection::Invalid(format!(
                "public JWK kid '{}' does not match record",
                key.kid
            )));
        }
        Ok(key)
    }

    /// State of the public JWK bytes alone; revocation is not considered.
    pub fn public_state(&self, now: DateTime<Utc>) -> KeyState {
        state_of(self.public_jwk(now))
    }

    /// Decrypt and validate the private JWK.
    ///
    /// Revocation and the record's own expiry are checked before any
    /// decryption. Envelopes from another encryption epoch are invalid.
    pub fn private_jwk(
        &self,
        cipher: &EnvelopeCipher,
        encryption_id: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Jwk, KeyRejection> {
        if self.is_revoked() {
            return Err(KeyRejection::Revoked);
        }
        if self.is_expired(now) {
            return Err(KeyRejection::Expired);
        }
        let same_epoch: bool = self
            .encryption_id
            .as_bytes()
            .ct_eq(encryption_id.as_bytes())
            .into();
        if !same_epoch {
            return Err(KeyRejection::Invalid(format!(
                "encrypted for encryption id '{}'",
                self.encryption_id
            )));
        }

        let key = cipher
            .open(&self.encrypted_jwk)
            .map_err(|e| KeyRejection::Invalid(e.to_string()))?;
        key.validate(now)
            .map_err(|e| KeyRejection::Invalid(format!("decrypted JWK rejected: {e}")))?;

        if !key.is_private() {
            return Err(KeyRejection::Invalid("decrypted JWK has no private part".into()));
        }
        if key.kid != self.kid {
            return Err(KeyRejection::Invalid(format!(
                "decrypted JWK kid '{}' does not match record",
                key.kid
            )));
        }
        if key.exp != Some(self.expires_at.timestamp()) {
            return Err(KeyRejection::Invalid(
                "decrypted JWK exp does not match expires_at".into(),
            ));
        }
        Ok(key)
    }

    /// Projection of `private_jwk` onto `KeyState`.
    pub fn private_state(
        &self,
        cipher: &EnvelopeCipher,
        encryption_id: &str,
        now: DateTime<Utc>,
    ) -> KeyState {
        state_of(self.private_jwk(cipher, encryption_id, now))
    }
}

fn state_of(result: std::result::Result<Jwk, KeyRejection>) -> KeyState {
    match result {
        Ok(_) => KeyState::Valid,
        Err(rejection) => rejection.state(),
    }
}
