//! `hcjwk secret-generate`: print a fresh master secret.
//!
//! Usage:
//!   HCJWK_SECRET=$(hcjwk secret-generate) hcjwk refresh

use crate::crypto::generate_master_secret;
use crate::errors::Result;

/// Execute the `secret-generate` command.
pub fn execute() -> Result<()> {
    println!("{}", generate_master_secret());
    Ok(())
}
