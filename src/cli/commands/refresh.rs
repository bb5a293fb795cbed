//! `hcjwk refresh`: ensure a fresh signing key exists.

use crate::cli::{key_manager, output, Cli};
use crate::errors::Result;
use crate::rotation::CancelToken;

/// Execute the `refresh` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut manager = key_manager(cli)?;
    let report = manager.refresh(&CancelToken::new())?;

    match report.created {
        Some(ref kid) => output::success(&format!("Created new signing key '{kid}'")),
        None => output::info(&format!(
            "{} valid key(s), at least one outlives the renewal threshold; nothing to do",
            report.valid
        )),
    }
    if report.invalid > 0 {
        output::tip(&format!(
            "{} key(s) could not be decrypted or validated; run `hcjwk list` for details",
            report.invalid
        ));
    }

    Ok(())
}
