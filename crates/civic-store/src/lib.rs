//! Detection record persistence.
//!
//! Records are written through the [`DetectionSink`] trait. Two sinks ship
//! here: an in-process [`MemorySink`] and an append-only [`JsonlSink`]. Either
//! can be wrapped in a [`RetryingSink`] to ride out transient failures.

pub mod config;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod sink;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use jsonl::JsonlSink;
pub use memory::MemorySink;
pub use retry::{RetryConfig, RetryingSink};
pub use sink::DetectionSink;
