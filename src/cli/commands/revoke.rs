//! `hcjwk revoke <kid>`: revoke a signing key.

use crate::cli::{key_manager, output, Cli};
use crate::errors::Result;
use crate::rotation::CancelToken;

/// Execute the `revoke` command.
pub fn execute(cli: &Cli, kid: &str) -> Result<()> {
    let mut manager = key_manager(cli)?;
    let record = manager.revoke(kid, &CancelToken::new())?;

    output::success(&format!("Revoked key '{}'", record.kid));
    output::tip("Run `hcjwk refresh` to mint a replacement if needed.");

    Ok(())
}
