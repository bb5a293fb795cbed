//! Key classification.
//!
//! Every JWK (and every stored key record) falls into exactly one
//! `KeyState`. `KeyRejection` carries the reason a key is not `valid`.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::key::Jwk;
use crate::errors::HcjwkError;

pub const KTY_EC: &str = "EC";
pub const CRV_P256: &str = "P-256";
pub const USE_SIG: &str = "sig";
pub const ALG_ES256: &str = "ES256";

/// Classified state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Parses, correct curve/usage/alg, `exp` in the future.
    Valid,
    /// Structurally fine but `exp` is not in the future.
    Expired,
    /// Fails a structural check (or cannot be decrypted).
    Invalid,
    /// Marked revoked in the database. Never derived from key bytes.
    Revoked,
}

impl KeyState {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyState::Valid => "valid",
            KeyState::Expired => "expired",
            KeyState::Invalid => "invalid",
            KeyState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a key was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRejection {
    #[error("key has expired")]
    Expired,

    #[error("key has been revoked")]
    Revoked,

    #[error("{0}")]
    Invalid(String),
}

impl KeyRejection {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// The `KeyState` this rejection corresponds to.
    pub fn state(&self) -> KeyState {
        match self {
            KeyRejection::Expired => KeyState::Expired,
            KeyRejection::Revoked => KeyState::Revoked,
            KeyRejection::Invalid(_) => KeyState::Invalid,
        }
    }
}

impl From<KeyRejection> for HcjwkError {
    fn from(rejection: KeyRejection) -> Self {
        HcjwkError::Validation(rejection.to_string())
    }
}

/// Check `key` against the fixed requirements, in order.
///
/// The first failing rule decides the outcome.
pub fn validate(key: &Jwk, now: DateTime<Utc>) -> Result<(), KeyRejection> {
    if key.kty != KTY_EC {
        return Err(KeyRejection::invalid(format!(
            "wrong key type '{}'",
            key.kty
        )));
    }
    if key.crv != CRV_P256 {
        return Err(KeyRejection::invalid(format!("wrong curve '{}'", key.crv)));
    }
    if key.kid.is_empty() {
        return Err(KeyRejection::invalid("kid is empty"));
    }
    if key.key_use != USE_SIG {
        return Err(KeyRejection::invalid(format!(
            "wrong key usage '{}'",
            key.key_use
        )));
    }
    if key.alg != ALG_ES256 {
        return Err(KeyRejection::invalid(format!(
            "wrong key alg '{}'",
            key.alg
        )));
    }
    let exp = key
        .exp
        .ok_or_else(|| KeyRejection::invalid("missing or invalid 'exp'"))?;
    if exp <= now.timestamp() {
        return Err(KeyRejection::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh(now: DateTime<Utc>) -> Jwk {
        Jwk::generate(now + Duration::hours(1)).unwrap()
    }

    fn rejected_as(key: &Jwk, now: DateTime<Utc>) -> KeyState {
        match validate(key, now) {
            Ok(()) => KeyState::Valid,
            Err(r) => r.state(),
        }
    }

    #[test]
    fn generated_key_is_valid() {
        let now = Utc::now();
        assert_eq!(rejected_as(&fresh(now), now), KeyState::Valid);
    }

    #[test]
    fn wrong_kty_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.kty = "RSA".into();
        let err = validate(&key, now).unwrap_err();
        assert_eq!(err.state(), KeyState::Invalid);
        assert!(err.to_string().contains("wrong key type"));
    }

    #[test]
    fn wrong_curve_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.crv = "P-384".into();
        let err = validate(&key, now).unwrap_err();
        assert!(err.to_string().contains("wrong curve"));
    }

    #[test]
    fn empty_kid_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.kid.clear();
        assert_eq!(rejected_as(&key, now), KeyState::Invalid);
    }

    #[test]
    fn wrong_use_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.key_use = "enc".into();
        assert_eq!(rejected_as(&key, now), KeyState::Invalid);
    }

    #[test]
    fn wrong_alg_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.alg = "ES384".into();
        assert_eq!(rejected_as(&key, now), KeyState::Invalid);
    }

    #[test]
    fn missing_exp_is_invalid() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.exp = None;
        assert_eq!(rejected_as(&key, now), KeyState::Invalid);
    }

    #[test]
    fn exp_equal_to_now_is_expired() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.exp = Some(now.timestamp());
        assert_eq!(validate(&key, now), Err(KeyRejection::Expired));
    }

    #[test]
    fn invalid_rule_wins_over_expiry() {
        let now = Utc::now();
        let mut key = fresh(now);
        key.exp = Some(now.timestamp() - 10);
        key.alg = "none".into();
        assert_eq!(rejected_as(&key, now), KeyState::Invalid);
    }

    #[test]
    fn state_strings() {
        assert_eq!(KeyState::Valid.to_string(), "valid");
        assert_eq!(KeyState::Expired.to_string(), "expired");
        assert_eq!(KeyState::Invalid.to_string(), "invalid");
        assert_eq!(KeyState::Revoked.to_string(), "revoked");
    }
}
