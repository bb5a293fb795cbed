//! Cryptographic primitives for HCJWK.
//!
//! This module provides:
//! - HKDF-SHA256 subkey derivation from the master secret (`keys`)
//! - AES-128-GCM envelope encryption of private JWKs (`encryption`)

pub mod encryption;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{AppSecrets, EnvelopeCipher, ...};
pub use encryption::EnvelopeCipher;
pub use keys::{decode_master_secret, derive, generate_master_secret, AppSecrets, HkdfInfo};
