//! `hcjwk purge`: delete expired keys.

use crate::cli::{key_manager, output, Cli};
use crate::errors::Result;
use crate::rotation::CancelToken;

/// Execute the `purge` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut manager = key_manager(cli)?;
    let purged = manager.purge(&CancelToken::new())?;

    if purged.is_empty() {
        output::info("Nothing to purge.");
    } else {
        output::success(&format!("Purged {} expired key(s)", purged.len()));
        for record in &purged {
            println!("  {}", record.kid);
        }
    }

    Ok(())
}
