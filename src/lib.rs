pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod jwk;
pub mod rotation;
pub mod store;
pub mod telemetry;
