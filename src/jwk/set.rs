//! JWK sets (`{"keys": [...]}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{Jwk, JwkWire};
use super::state::KeyRejection;
use crate::errors::{HcjwkError, Result};

/// An ordered set of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Serialize, Deserialize)]
struct JwkSetWire {
    keys: Vec<serde_json::Value>,
}

impl JwkSet {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Find a key by its `kid`.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    pub fn kids(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.kid.as_str()).collect()
    }

    /// Serialize as a standard JWK set document.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let keys = self
            .keys
            .iter()
            .map(|k| {
                let wire = k.to_wire()?;
                serde_json::to_value(wire)
                    .map_err(|e| HcjwkError::Encoding(format!("failed to serialize JWK: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        serde_json::to_vec(&JwkSetWire { keys })
            .map_err(|e| HcjwkError::Encoding(format!("failed to serialize JWK set: {e}")))
    }
}

/// Parse and validate a JWK set.
///
/// Valid keys are kept, expired keys are skipped, and any invalid key
/// fails the whole set.
pub fn parse_set(bytes: &[u8], now: DateTime<Utc>) -> Result<JwkSet> {
    let wire: JwkSetWire = serde_json::from_slice(bytes)
        .map_err(|e| HcjwkError::Encoding(format!("failed to parse JWK set: {e}")))?;

    let mut set = JwkSet::default();
    for (i, value) in wire.keys.into_iter().enumerate() {
        let parsed = serde_json::from_value::<JwkWire>(value)
            .map_err(|e| KeyRejection::invalid(format!("failed to parse JWK: {e}")))
            .and_then(Jwk::from_wire)
            .and_then(|key| key.validate(now).map(|()| key));

        match parsed {
            Ok(key) => set.keys.push(key),
            Err(KeyRejection::Expired) => continue,
            Err(rejection) => {
                return Err(HcjwkError::Validation(format!(
                    "invalid key {i}: {rejection}"
                )));
            }
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn set_roundtrip_keeps_valid_keys() {
        let now = Utc::now();
        let a = Jwk::generate(now + Duration::hours(1)).unwrap().public();
        let b = Jwk::generate(now + Duration::hours(2)).unwrap().public();
        let set = JwkSet::new(vec![a.clone(), b.clone()]);

        let parsed = parse_set(&set.to_json().unwrap(), now).unwrap();
        assert_eq!(parsed.keys, vec![a, b]);
    }

    #[test]
    fn expired_keys_are_skipped() {
        let now = Utc::now();
        let valid = Jwk::generate(now + Duration::hours(1)).unwrap().public();
        let expired = Jwk::generate(now - Duration::hours(1)).unwrap().public();
        let set = JwkSet::new(vec![expired, valid.clone()]);

        let parsed = parse_set(&set.to_json().unwrap(), now).unwrap();
        assert_eq!(parsed.kids(), vec![valid.kid.as_str()]);
    }

    #[test]
    fn invalid_key_fails_the_set() {
        let now = Utc::now();
        let mut bad = Jwk::generate(now + Duration::hours(1)).unwrap().public();
        bad.key_use = "enc".into();
        let good = Jwk::generate(now + Duration::hours(1)).unwrap().public();
        let set = JwkSet::new(vec![good, bad]);

        let err = parse_set(&set.to_json().unwrap(), now).unwrap_err();
        assert!(err.to_string().contains("invalid key 1"));
    }

    #[test]
    fn empty_set_serializes_as_empty_array() {
        let json = JwkSet::default().to_json().unwrap();
        assert_eq!(json, br#"{"keys":[]}"#);
    }

    #[test]
    fn non_set_document_is_an_encoding_error() {
        assert!(matches!(
            parse_set(b"[]", Utc::now()),
            Err(HcjwkError::Encoding(_))
        ));
    }

    #[test]
    fn find_by_kid() {
        let key = Jwk::generate(Utc::now() + Duration::hours(1)).unwrap();
        let set = JwkSet::new(vec![key.public()]);
        assert!(set.find(&key.kid).is_some());
        assert!(set.find("missing!").is_none());
    }
}
