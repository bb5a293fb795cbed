//! `hcjwk completions`: generate shell completion scripts.
//!
//! Usage:
//!   hcjwk completions bash > ~/.bash_completion.d/hcjwk
//!   hcjwk completions zsh

use std::io;

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::Result;

/// Execute the `completions` command.
pub fn execute(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "hcjwk", &mut io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_every_subcommand() {
        let mut cmd = Cli::command();
        let mut out = Vec::new();
        generate(Shell::Bash, &mut cmd, "hcjwk", &mut out);
        let script = String::from_utf8(out).unwrap();
        for sub in ["refresh", "revoke", "purge", "list", "jwks", "secret-generate"] {
            assert!(script.contains(sub), "missing {sub}");
        }
    }
}
