//! JSON Web Key codec for ES256 signing keys.
//!
//! This module provides:
//! - The `Jwk` type with generation, thumbprint kid, and JSON codec (`key`)
//! - `KeyState` classification and `validate` (`state`)
//! - JWK set serialization and parsing (`set`)
//! - ES256 compact token signing and verification (`sign`)

pub mod key;
pub mod set;
pub mod sign;
pub mod state;

// Re-export the most commonly used items.
pub use key::{parse_one, thumbprint_kid, Jwk, KID_LEN};
pub use set::{parse_set, JwkSet};
pub use sign::{sign_claims, verify_claims};
pub use state::{validate, KeyRejection, KeyState};
