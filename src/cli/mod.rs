//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::errors::Result;
use crate::rotation::KeyManager;

/// HCJWK CLI: host-configuration signing-key manager.
#[derive(Parser)]
#[command(
    name = "hcjwk",
    about = "Host-configuration signing-key manager",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (missing file means defaults)
    #[arg(long, default_value = "hcjwk.toml", global = true)]
    pub config: PathBuf,

    /// Path to the SQLite key database
    #[arg(long, env = "HCJWK_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, env = "HCJWK_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Make sure a fresh valid signing key exists, minting one if needed
    Refresh,

    /// Revoke a signing key
    Revoke {
        /// Key id (kid) to revoke
        kid: String,
    },

    /// Delete every key whose expiry has passed
    Purge,

    /// List all keys with their public and private state
    List,

    /// Print the public JWK set as JSON
    Jwks,

    /// Print a fresh random master secret
    SecretGenerate,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Subcommand name, used in failure logs.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Refresh => "refresh",
            Commands::Revoke { .. } => "revoke",
            Commands::Purge => "purge",
            Commands::List => "list",
            Commands::Jwks => "jwks",
            Commands::SecretGenerate => "secret-generate",
            Commands::Completions { .. } => "completions",
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve settings: config file, then `HCJWK_*` variables, then flags.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(&cli.config)?;
    settings.apply_env(|name| std::env::var(name).ok())?;
    if let Some(ref database) = cli.database {
        settings.database = database.clone();
    }
    settings.validate()?;
    Ok(settings)
}

/// Build a `KeyManager` from the resolved settings.
pub fn key_manager(cli: &Cli) -> Result<KeyManager> {
    let settings = load_settings(cli)?;
    tracing::debug!(settings = ?settings, "Loaded settings");
    KeyManager::from_settings(&settings)
}
