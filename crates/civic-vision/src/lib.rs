//! Image analysis for civic issue reports.
//!
//! Decodes uploads, runs an object-detection backend and turns its output
//! into labelled [`Detection`](civic_models::Detection)s, estimating pothole
//! age where appropriate.

pub mod age;
pub mod backend;
pub mod backends;
pub mod classifier;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scene;

pub use age::{estimate_age_days, FALLBACK_AGE_DAYS, MAX_AGE_DAYS};
pub use backend::{ObjectDetector, RawCandidate};
pub use backends::HttpDetector;
pub use classifier::{synthetic_detection, Classification, DetectionClassifier};
pub use config::DetectorConfig;
pub use error::{VisionError, VisionResult};
pub use scene::SceneImage;
