use thiserror::Error;

/// All errors that can occur in HCJWK.
#[derive(Debug, Error)]
pub enum HcjwkError {
    // --- Startup errors ---
    #[error("Configuration error in '{field}': {reason}")]
    Config { field: &'static str, reason: String },

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    // --- Key material errors ---
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("JWK encoding error: {0}")]
    Encoding(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("JWK validation failed: {0}")]
    Validation(String),

    // --- Storage errors ---
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JWK with kid '{0}' already exists")]
    DuplicateKid(String),

    #[error("JWK with kid '{0}' not found")]
    NotFound(String),

    #[error("JWK with kid '{0}' has been revoked")]
    Revoked(String),

    #[error("No valid signing key available")]
    NoSigningKey,

    // --- Operation errors ---
    #[error("Operation cancelled before commit")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HcjwkError {
    /// Shorthand for a configuration error on a named settings field.
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for HCJWK results.
pub type Result<T> = std::result::Result<T, HcjwkError>;
