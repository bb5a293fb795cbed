//! Structured JSON logs on stderr.
//!
//! `RUST_LOG`, when set, wins over the configured level.

use tracing_subscriber::EnvFilter;

use crate::errors::{HcjwkError, Result};

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| HcjwkError::config("log_level", format!("failed to initialise logging: {e}")))
}
