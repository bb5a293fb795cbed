//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::jwk::KeyState;
use crate::rotation::KeyListing;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Color a key state for table output.
pub fn colorize_state(state: KeyState) -> String {
    match state {
        KeyState::Valid => style(state).green().to_string(),
        KeyState::Expired => style(state).yellow().to_string(),
        KeyState::Invalid => style(state).red().bold().to_string(),
        KeyState::Revoked => style(state).red().to_string(),
    }
}

/// Print a table of keys (Kid, Public, Private, Expires, Revoked).
pub fn print_keys_table(keys: &[KeyListing]) {
    if keys.is_empty() {
        info("No keys in the database yet.");
        tip("Run `hcjwk refresh` to create the first signing key.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Kid", "Public", "Private", "Expires", "Revoked"]);

    for k in keys {
        table.add_row(vec![
            k.kid.clone(),
            colorize_state(k.public_state),
            colorize_state(k.private_state),
            k.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            k.revoked_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        ]);
    }

    println!("{table}");
}
