//! P-256 JSON Web Keys.
//!
//! A `Jwk` always holds valid P-256 key material; the metadata members
//! (`kty`, `crv`, `kid`, `use`, `alg`, `exp`) are kept as read from the
//! wire so `validate` can classify keys that break the rules.
//!
//! Serialized member order is fixed:
//!   kty, crv, kid, use, alg, exp, x, y[, d]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, FieldBytes, PublicKey, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::state::{self, KeyRejection, KeyState, ALG_ES256, CRV_P256, KTY_EC, USE_SIG};
use crate::errors::{HcjwkError, Result};

/// Number of thumbprint characters used as `kid`.
pub const KID_LEN: usize = 8;

/// Size of a P-256 coordinate or scalar in bytes.
const COORD_LEN: usize = 32;

/// Attempts at drawing a scalar in range before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 16;

/// An EC P-256 key with its JWK metadata.
#[derive(Clone)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub kid: String,
    pub key_use: String,
    pub alg: String,
    /// Non-standard expiration claim, Unix seconds.
    pub exp: Option<i64>,
    public_key: PublicKey,
    secret_key: Option<SecretKey>,
}

/// JSON shape of a single key.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct JwkWire {
    #[serde(default)]
    kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crv: Option<String>,
    #[serde(default)]
    kid: String,
    #[serde(rename = "use", default)]
    key_use: String,
    #[serde(default)]
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
}

impl Jwk {
    /// Generate a private signing key that expires at `expires_at`.
    pub fn generate(expires_at: DateTime<Utc>) -> Result<Self> {
        Self::generate_with_rng(&mut rand::rng(), expires_at)
    }

    /// Like `generate`, drawing the private scalar from `rng`.
    pub fn generate_with_rng(rng: &mut dyn RngCore, expires_at: DateTime<Utc>) -> Result<Self> {
        let mut raw = Zeroizing::new([0u8; COORD_LEN]);
        let mut secret_key = None;
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            rng.fill_bytes(&mut raw[..]);
            // Zero and values >= n are rejected; draw again.
            if let Ok(sk) = SecretKey::from_slice(&raw[..]) {
                secret_key = Some(sk);
                break;
            }
        }
        let secret_key = secret_key.ok_or_else(|| {
            HcjwkError::Generation("random source did not yield a P-256 scalar".into())
        })?;

        let public_key = secret_key.public_key();
        let kid = thumbprint_kid(&public_key)?;

        Ok(Self {
            kty: KTY_EC.to_string(),
            crv: CRV_P256.to_string(),
            kid,
            key_use: USE_SIG.to_string(),
            alg: ALG_ES256.to_string(),
            exp: Some(expires_at.timestamp()),
            public_key,
            secret_key: Some(secret_key),
        })
    }

    /// Public projection. Metadata is preserved, the private scalar dropped.
    pub fn public(&self) -> Self {
        Self {
            secret_key: None,
            ..self.clone()
        }
    }

    pub fn is_private(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn secret_key(&self) -> Option<&SecretKey> {
        self.secret_key.as_ref()
    }

    /// Base64url `x` and `y` members.
    pub(crate) fn coordinates_b64(&self) -> Result<(String, String)> {
        let (x, y) = coordinates(&self.public_key)?;
        Ok((URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y)))
    }

    /// RFC 7638 SHA-256 thumbprint of the public component.
    pub fn thumbprint(&self) -> Result<[u8; 32]> {
        thumbprint(&self.public_key)
    }

    /// Check the fixed requirements (see `state::validate`).
    pub fn validate(&self, now: DateTime<Utc>) -> std::result::Result<(), KeyRejection> {
        state::validate(self, now)
    }

    /// Projection of `validate` onto `KeyState`.
    pub fn state(&self, now: DateTime<Utc>) -> KeyState {
        match self.validate(now) {
            Ok(()) => KeyState::Valid,
            Err(rejection) => rejection.state(),
        }
    }

    /// Serialize to the canonical JSON representation.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let wire = self.to_wire()?;
        serde_json::to_vec(&wire)
            .map_err(|e| HcjwkError::Encoding(format!("failed to serialize JWK: {e}")))
    }

    /// Decode a single JWK without checking its metadata or expiry.
    ///
    /// Fails only when the bytes are not a JWK carrying usable P-256
    /// key material.
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, KeyRejection> {
        let wire: JwkWire = serde_json::from_slice(bytes)
            .map_err(|e| KeyRejection::invalid(format!("failed to parse JWK: {e}")))?;
        Self::from_wire(wire)
    }

    pub(crate) fn to_wire(&self) -> Result<JwkWire> {
        let (x, y) = self.coordinates_b64()?;
        Ok(JwkWire {
            kty: self.kty.clone(),
            crv: Some(self.crv.clone()),
            kid: self.kid.clone(),
            key_use: self.key_use.clone(),
            alg: self.alg.clone(),
            exp: self.exp.map(serde_json::Value::from),
            x: Some(x),
            y: Some(y),
            d: self
                .secret_key
                .as_ref()
                .map(|sk| URL_SAFE_NO_PAD.encode(sk.to_bytes())),
        })
    }

    pub(crate) fn from_wire(wire: JwkWire) -> std::result::Result<Self, KeyRejection> {
        // Only EC P-256 material can be represented at all.
        if wire.kty != KTY_EC {
            return Err(KeyRejection::invalid(format!(
                "wrong key type '{}'",
                wire.kty
            )));
        }
        let crv = wire.crv.unwrap_or_default();
        if crv != CRV_P256 {
            return Err(KeyRejection::invalid(format!("wrong curve '{crv}'")));
        }

        let x = decode_coordinate("x", wire.x.as_deref())?;
        let y = decode_coordinate("y", wire.y.as_deref())?;
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&x),
            FieldBytes::from_slice(&y),
            false,
        );
        let public_key = Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
            .ok_or_else(|| KeyRejection::invalid("point is not on the P-256 curve"))?;

        let secret_key = match wire.d.as_deref() {
            Some(d) => {
                let d = Zeroizing::new(decode_coordinate("d", Some(d))?);
                let sk = SecretKey::from_slice(&d)
                    .map_err(|_| KeyRejection::invalid("'d' is not a valid P-256 scalar"))?;
                if sk.public_key() != public_key {
                    return Err(KeyRejection::invalid(
                        "private key does not match public key",
                    ));
                }
                Some(sk)
            }
            None => None,
        };

        // A non-integer `exp` is kept as missing; `validate` rejects it.
        let exp = wire.exp.as_ref().and_then(serde_json::Value::as_i64);

        Ok(Self {
            kty: wire.kty,
            crv,
            kid: wire.kid,
            key_use: wire.key_use,
            alg: wire.alg,
            exp,
            public_key,
            secret_key,
        })
    }
}

impl PartialEq for Jwk {
    fn eq(&self, other: &Self) -> bool {
        self.kty == other.kty
            && self.crv == other.crv
            && self.kid == other.kid
            && self.key_use == other.key_use
            && self.alg == other.alg
            && self.exp == other.exp
            && self.public_key == other.public_key
            && self.secret_key.as_ref().map(SecretKey::to_bytes)
                == other.secret_key.as_ref().map(SecretKey::to_bytes)
    }
}

impl Eq for Jwk {}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("kid", &self.kid)
            .field("use", &self.key_use)
            .field("alg", &self.alg)
            .field("exp", &self.exp)
            .field("private", &self.is_private())
            .finish()
    }
}

/// Parse and validate a single JWK.
///
/// Only a `valid` key is returned; otherwise the rejection says whether
/// the key was `expired` or `invalid`, and why.
pub fn parse_one(bytes: &[u8], now: DateTime<Utc>) -> std::result::Result<Jwk, KeyRejection> {
    let key = Jwk::from_json(bytes)?;
    key.validate(now)?;
    Ok(key)
}

/// RFC 7638 thumbprint: SHA-256 over `{"crv","kty","x","y"}` in that order.
pub fn thumbprint(public_key: &PublicKey) -> Result<[u8; 32]> {
    let (x, y) = coordinates(public_key)?;
    let canonical = format!(
        r#"{{"crv":"{CRV_P256}","kty":"{KTY_EC}","x":"{}","y":"{}"}}"#,
        URL_SAFE_NO_PAD.encode(x),
        URL_SAFE_NO_PAD.encode(y),
    );
    Ok(Sha256::digest(canonical.as_bytes()).into())
}

/// First `KID_LEN` characters of the base64url thumbprint.
pub fn thumbprint_kid(public_key: &PublicKey) -> Result<String> {
    let mut encoded = URL_SAFE_NO_PAD.encode(thumbprint(public_key)?);
    encoded.truncate(KID_LEN);
    Ok(encoded)
}

fn coordinates(public_key: &PublicKey) -> Result<(FieldBytes, FieldBytes)> {
    let point = public_key.to_encoded_point(false);
    match (point.x(), point.y()) {
        (Some(x), Some(y)) => Ok((*x, *y)),
        _ => Err(HcjwkError::Encoding(
            "public key has no affine coordinates".into(),
        )),
    }
}

fn decode_coordinate(
    name: &str,
    value: Option<&str>,
) -> std::result::Result<Vec<u8>, KeyRejection> {
    let value = value.ok_or_else(|| KeyRejection::invalid(format!("missing '{name}'")))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| KeyRejection::invalid(format!("'{name}' is not base64url")))?;
    if bytes.len() != COORD_LEN {
        return Err(KeyRejection::invalid(format!(
            "'{name}' must be {COORD_LEN} bytes (got {})",
            bytes.len()
        )));
    }
    Ok(bytes)
}
