//! Rotation orchestrator: policy, time source, cancellation, and the
//! `KeyManager` that ties them to the key store.

pub mod cancel;
pub mod clock;
pub mod manager;
pub mod policy;

pub use cancel::CancelToken;
pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::{KeyListing, KeyManager, RefreshReport};
pub use policy::RotationPolicy;
