//! Types shared between the proxcast server and its clients.

pub mod config;
pub mod protocol;
pub mod receivers;
pub mod spatial;

pub use config::ProximityConfig;
pub use receivers::{ProximityKind, ReceiverMode};
pub use spatial::{GridCoordinate, Vector};
