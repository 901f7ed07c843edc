//! Real-time notification delivery.
//!
//! Observers (typically WebSocket connections) register with an
//! [`ObserverRegistry`]; a [`Broadcaster`] serializes each notification once
//! and fans it out to a snapshot of the registry concurrently.

pub mod broadcaster;
pub mod error;
pub mod metrics;
pub mod registry;

pub use broadcaster::{BroadcastReport, Broadcaster, BroadcasterConfig};
pub use error::{SendError, SendResult};
pub use registry::{Observer, ObserverId, ObserverRegistry};
