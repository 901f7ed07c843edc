//! Object-detection capability.
//!
//! A backend turns an image into raw candidates: numeric class id, confidence
//! and a pixel-space box. It knows nothing about labels, priorities or ages;
//! those are applied by [`DetectionClassifier`](crate::DetectionClassifier).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use civic_models::BoundingBox;

use crate::error::VisionResult;
use crate::scene::SceneImage;

/// One raw detection as produced by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub class_id: i64,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl RawCandidate {
    pub fn new(class_id: i64, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Pluggable object-detection backend.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &str;

    /// Run detection once over the whole image, returning candidates in model order.
    async fn detect(&self, image: &SceneImage) -> VisionResult<Vec<RawCandidate>>;

    /// Verify the backend can serve requests.
    async fn check_ready(&self) -> VisionResult<()> {
        Ok(())
    }
}
