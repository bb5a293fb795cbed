//! `hcjwk list`: display all keys in a table.

use crate::cli::{key_manager, output, Cli};
use crate::errors::Result;
use crate::jwk::KeyState;
use crate::rotation::CancelToken;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut manager = key_manager(cli)?;
    let keys = manager.list(&CancelToken::new())?;

    let valid = keys
        .iter()
        .filter(|k| k.private_state == KeyState::Valid)
        .count();
    output::info(&format!("{} key(s), {valid} valid", keys.len()));

    output::print_keys_table(&keys);

    Ok(())
}
