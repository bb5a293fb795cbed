use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{HcjwkError, Result};

/// How `refresh` opens its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshLocking {
    /// `BEGIN IMMEDIATE`: take the write lock before listing keys.
    #[default]
    Immediate,
    /// `BEGIN DEFERRED`: take the write lock on first insert.
    Deferred,
}

impl FromStr for RefreshLocking {
    type Err = HcjwkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "deferred" => Ok(Self::Deferred),
            other => Err(HcjwkError::config(
                "refresh_locking",
                format!("unknown locking mode '{other}', use 'immediate' or 'deferred'"),
            )),
        }
    }
}

/// Service configuration, loaded from `hcjwk.toml`.
///
/// Every field except `secret` has a default, and every field can be
/// overridden by an `HCJWK_*` environment variable.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Encoded master secret, or `random` for a throwaway one.
    #[serde(default)]
    pub secret: Option<String>,

    /// Lifetime of a newly created key (e.g. "90d").
    #[serde(default = "default_validity")]
    pub validity: String,

    /// A key this close to expiry no longer counts as fresh (e.g. "30d").
    #[serde(default = "default_renewal_threshold")]
    pub renewal_threshold: String,

    /// HKDF salt.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Path of the SQLite key database.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default)]
    pub refresh_locking: RefreshLocking,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_validity() -> String {
    "90d".to_string()
}

fn default_renewal_threshold() -> String {
    "30d".to_string()
}

fn default_app_name() -> String {
    "idmsvc-backend".to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("hcjwk.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret: None,
            validity: default_validity(),
            renewal_threshold: default_renewal_threshold(),
            app_name: default_app_name(),
            database: default_database(),
            refresh_locking: RefreshLocking::default(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("validity", &self.validity)
            .field("renewal_threshold", &self.renewal_threshold)
            .field("app_name", &self.app_name)
            .field("database", &self.database)
            .field("refresh_locking", &self.refresh_locking)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents).map_err(|e| {
            HcjwkError::config("file", format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Override fields from `HCJWK_*` variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("HCJWK_SECRET") {
            self.secret = Some(v);
        }
        if let Some(v) = var("HCJWK_VALIDITY") {
            self.validity = v;
        }
        if let Some(v) = var("HCJWK_RENEWAL_THRESHOLD") {
            self.renewal_threshold = v;
        }
        if let Some(v) = var("HCJWK_APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = var("HCJWK_DATABASE") {
            self.database = PathBuf::from(v);
        }
        if let Some(v) = var("HCJWK_REFRESH_LOCKING") {
            self.refresh_locking = v.parse()?;
        }
        if let Some(v) = var("HCJWK_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = v.trim().parse().map_err(|_| {
                HcjwkError::config("busy_timeout_ms", format!("'{v}' is not a number"))
            })?;
        }
        Ok(())
    }

    /// Check everything that can be checked without deriving keys.
    pub fn validate(&self) -> Result<()> {
        match self.secret.as_deref() {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(HcjwkError::config("secret", "a master secret is required")),
        }
        if self.app_name.is_empty() {
            return Err(HcjwkError::config("app_name", "must not be empty"));
        }
        self.validity()?;
        self.renewal_threshold()?;
        Ok(())
    }

    /// The configured secret, or a config error when unset.
    pub fn secret(&self) -> Result<&str> {
        self.secret
            .as_deref()
            .ok_or_else(|| HcjwkError::config("secret", "a master secret is required"))
    }

    pub fn validity(&self) -> Result<Duration> {
        parse_duration(&self.validity).map_err(|reason| HcjwkError::config("validity", reason))
    }

    pub fn renewal_threshold(&self) -> Result<Duration> {
        parse_duration(&self.renewal_threshold)
            .map_err(|reason| HcjwkError::config("renewal_threshold", reason))
    }

    pub fn busy_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Parse a duration like "90d", "2h", "30m" or "45s".
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else if let Some(s) = input.strip_suffix('s') {
        (s, 's')
    } else {
        return Err(format!(
            "invalid duration '{input}', use a format like 90d, 2h, 30m or 45s"
        ));
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| format!("invalid duration '{input}', number part is not valid"))?;

    let duration = match unit {
        'd' => Duration::try_days(num),
        'h' => Duration::try_hours(num),
        'm' => Duration::try_minutes(num),
        _ => Duration::try_seconds(num),
    };
    duration.ok_or_else(|| format!("duration '{input}' is out of range"))
}

// ── Tests ────────────────────────────────────────────────────────────
