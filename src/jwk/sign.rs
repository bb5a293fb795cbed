//! ES256 JWT signing and verification.
//!
//! Tokens carry the header `{"typ":"JWT","alg":"ES256","kid":"<kid>"}`.
//! Registered claims are passed through untouched; only the signature,
//! the algorithm and the signing key's own validity are checked here.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use p256::pkcs8::EncodePrivateKey;

use super::set::JwkSet;
use super::Jwk;
use crate::errors::{HcjwkError, Result};

/// Sign `claims` with a private key that is valid at `now`.
pub fn sign_claims(key: &Jwk, claims: &serde_json::Value, now: DateTime<Utc>) -> Result<String> {
    key.validate(now)?;
    let secret_key = key
        .secret_key()
        .ok_or_else(|| HcjwkError::Validation(format!("key '{}' has no private part", key.kid)))?;

    let der = secret_key
        .to_pkcs8_der()
        .map_err(|e| HcjwkError::Encoding(format!("failed to encode private key: {e}")))?;

    let header = Header {
        kid: Some(key.kid.clone()),
        ..Header::new(Algorithm::ES256)
    };
    encode(&header, claims, &EncodingKey::from_ec_der(der.as_bytes())).map_err(token_error)
}

/// Verify a compact token against `keys` and return its claims.
///
/// The key is selected by the header `kid`; a kid not in the set is
/// reported as not found.
pub fn verify_claims(token: &str, keys: &JwkSet, now: DateTime<Utc>) -> Result<serde_json::Value> {
    let header = decode_header(token).map_err(token_error)?;
    if header.alg != Algorithm::ES256 {
        return Err(HcjwkError::Validation(format!(
            "unsupported JWS alg '{:?}'",
            header.alg
        )));
    }
    let kid = header
        .kid
        .ok_or_else(|| HcjwkError::Validation("token header has no kid".into()))?;

    let key = keys
        .find(&kid)
        .ok_or_else(|| HcjwkError::NotFound(kid.clone()))?;
    key.validate(now)?;

    let (x, y) = key.coordinates_b64()?;
    let decoding_key = DecodingKey::from_ec_components(&x, &y).map_err(token_error)?;

    let mut validation = Validation::new(Algorithm::ES256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(token_error)?;
    Ok(data.claims)
}

fn token_error(err: JwtError) -> HcjwkError {
    match err.kind() {
        ErrorKind::InvalidSignature => HcjwkError::Validation("signature verification failed".into()),
        ErrorKind::InvalidAlgorithm => HcjwkError::Validation("unsupported JWS alg".into()),
        _ => HcjwkError::Encoding(format!("malformed token: {err}")),
    }
}
