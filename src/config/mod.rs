//! Configuration: `hcjwk.toml` plus `HCJWK_*` environment overrides.

pub mod settings;

pub use settings::{parse_duration, RefreshLocking, Settings};
