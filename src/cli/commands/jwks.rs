//! `hcjwk jwks`: print the public JWK set served to verifiers.

use std::io::Write;

use crate::cli::{key_manager, Cli};
use crate::errors::Result;

/// Execute the `jwks` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut manager = key_manager(cli)?;
    let body = manager.public_jwks_json()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    writeln!(stdout)?;

    Ok(())
}
