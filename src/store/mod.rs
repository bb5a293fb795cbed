//! Key record storage.

pub mod record;
pub mod repository;

pub use record::KeyRecord;
pub use repository::{open, open_in_memory, PublicKeys};
