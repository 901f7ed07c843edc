//! Shared data models for CivicWatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Detection classes, bounding boxes and detections
//! - Per-upload detection records
//! - Department routing
//! - Real-time notification payloads

pub mod department;
pub mod detection;
pub mod notification;
pub mod record;

// Re-export common types
pub use department::Department;
pub use detection::{
    round_confidence, BoundingBox, Detection, DetectionClass, OperatingMode, PixelRect,
    HIGH_PRIORITY_CLASSES,
};
pub use notification::{Notification, NotificationType};
pub use record::{DetectionRecord, GeoPoint, GeoPointError, RecordId, StoredRecord, UploadProvenance};
