//! One module per subcommand, each exposing `execute`.

pub mod completions;
pub mod jwks;
pub mod list;
pub mod purge;
pub mod refresh;
pub mod revoke;
pub mod secret_generate;
