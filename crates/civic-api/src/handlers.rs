//! Request handlers.

pub mod detections;
pub mod health;
pub mod notifications;
pub mod upload;

pub use detections::*;
pub use health::*;
pub use notifications::*;
pub use upload::*;
