//! Detection classification.
//!
//! Wraps a detection backend and turns its raw candidates into domain
//! [`Detection`]s:
//!
//! 1. Run the backend once per image.
//! 2. Label each candidate's class id (`unknown` for unmapped ids).
//! 3. Track the distinct classes seen so far, in candidate order.
//! 4. For a pothole, skip age estimation when a high-priority class (fire)
//!    is already in the seen set. The detection is still emitted.
//! 5. Otherwise crop the pothole box and estimate its age; invalid boxes
//!    emit the detection without an age.
//!
//! With no backend the classifier runs in [`OperatingMode::Degraded`] and
//! answers every image with one fixed synthetic detection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use civic_models::{
    BoundingBox, Detection, DetectionClass, OperatingMode, HIGH_PRIORITY_CLASSES,
};

use crate::age::{estimate_age_days, FALLBACK_AGE_DAYS};
use crate::backend::{ObjectDetector, RawCandidate};
use crate::error::{VisionError, VisionResult};
use crate::metrics;
use crate::scene::SceneImage;

/// Result of classifying one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Whether the detections came from a real backend
    pub mode: OperatingMode,
    /// Detections in backend order
    pub detections: Vec<Detection>,
    /// Pothole age estimations skipped because of a high-priority class
    pub ages_suppressed: usize,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

enum Engine {
    Backend(Arc<dyn ObjectDetector>),
    Synthetic,
}

/// Turns uploaded images into detections.
pub struct DetectionClassifier {
    engine: Engine,
}

impl DetectionClassifier {
    /// Create a classifier backed by a detector.
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        info!(backend = detector.name(), "Detection classifier ready");
        Self {
            engine: Engine::Backend(detector),
        }
    }

    /// Create a classifier in degraded mode.
    pub fn degraded() -> Self {
        warn!("No detection backend loaded - classifier running in degraded mode");
        Self {
            engine: Engine::Synthetic,
        }
    }

    /// Normal mode when a detector is available, degraded otherwise.
    pub fn from_detector(detector: Option<Arc<dyn ObjectDetector>>) -> Self {
        match detector {
            Some(detector) => Self::new(detector),
            None => Self::degraded(),
        }
    }

    pub fn mode(&self) -> OperatingMode {
        match self.engine {
            Engine::Backend(_) => OperatingMode::Normal,
            Engine::Synthetic => OperatingMode::Degraded,
        }
    }

    pub fn backend_name(&self) -> Option<&str> {
        match &self.engine {
            Engine::Backend(detector) => Some(detector.name()),
            Engine::Synthetic => None,
        }
    }

    /// Check the backend is reachable. Always fine in degraded mode.
    pub async fn check_ready(&self) -> VisionResult<()> {
        match &self.engine {
            Engine::Backend(detector) => detector.check_ready().await,
            Engine::Synthetic => Ok(()),
        }
    }

    /// Decode and classify an encoded image.
    ///
    /// Undecodable input fails with [`VisionError::Decode`] in both modes.
    pub async fn classify(&self, encoded: Vec<u8>) -> VisionResult<Classification> {
        let image = SceneImage::decode_blocking(encoded).await?;
        self.classify_image(&image).await
    }

    /// Classify an already decoded image.
    pub async fn classify_image(&self, image: &SceneImage) -> VisionResult<Classification> {
        let detector = match &self.engine {
            Engine::Backend(detector) => detector,
            Engine::Synthetic => {
                warn!("Using synthetic detection - no detection backend loaded");
                metrics::record_classification(OperatingMode::Degraded);
                return Ok(Classification {
                    mode: OperatingMode::Degraded,
                    detections: vec![synthetic_detection()],
                    ages_suppressed: 0,
                });
            }
        };

        let start = Instant::now();
        let candidates = detector.detect(image).await.map_err(|e| {
            metrics::record_backend_failure(detector.name());
            match e {
                VisionError::Decode(_) | VisionError::Backend(_) => e,
                other => VisionError::backend(other.to_string()),
            }
        })?;
        metrics::record_backend_call(detector.name(), start.elapsed().as_secs_f64());

        debug!(
            backend = detector.name(),
            candidates = candidates.len(),
            width = image.width(),
            height = image.height(),
            "Backend returned candidates"
        );

        let pixels = image.pixels_arc();
        let labeled = tokio::task::spawn_blocking(move || label_candidates(&pixels, candidates))
            .await
            .map_err(|e| VisionError::internal(format!("classification task failed: {}", e)))?;

        for det in &labeled.detections {
            metrics::record_detection(det.class);
        }
        metrics::record_classification(OperatingMode::Normal);

        Ok(Classification {
            mode: OperatingMode::Normal,
            detections: labeled.detections,
            ages_suppressed: labeled.ages_suppressed,
        })
    }
}

/// The detection returned for every image in degraded mode.
pub fn synthetic_detection() -> Detection {
    Detection::new(
        DetectionClass::Pothole,
        0.85,
        BoundingBox::new(100.0, 100.0, 200.0, 200.0),
    )
    .with_age(Some(FALLBACK_AGE_DAYS))
}

struct Labeled {
    detections: Vec<Detection>,
    ages_suppressed: usize,
}

/// Apply labels, priority suppression and age estimation in candidate order.
fn label_candidates(image: &DynamicImage, candidates: Vec<RawCandidate>) -> Labeled {
    let (width, height) = image.dimensions();
    let mut seen: HashSet<DetectionClass> = HashSet::new();
    let mut detections = Vec::with_capacity(candidates.len());
    let mut ages_suppressed = 0;

    for candidate in candidates {
        let class = DetectionClass::from_class_id(candidate.class_id);
        seen.insert(class);

        let age_days = if class == DetectionClass::Pothole {
            if HIGH_PRIORITY_CLASSES.iter().any(|p| seen.contains(p)) {
                debug!("Skipping pothole age estimation - high priority class detected");
                metrics::record_age_suppressed();
                ages_suppressed += 1;
                None
            } else {
                match candidate.bbox.crop_region(width, height) {
                    Some(rect) => {
                        let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
                        Some(estimate_age_days(&crop))
                    }
                    None => {
                        warn!(bbox = ?candidate.bbox, "Invalid bounding box for pothole age estimation");
                        metrics::record_age_invalid_box();
                        None
                    }
                }
            }
        } else {
            None
        };

        let confidence = if candidate.confidence.is_finite() {
            candidate.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        debug!(class = %class, confidence, "Detected");
        detections.push(Detection::new(class, confidence, candidate.bbox).with_age(age_days));
    }

    Labeled {
        detections,
        ages_suppressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_support::{checkerboard, png_bytes};
    use async_trait::async_trait;

    struct ScriptedDetector(Vec<RawCandidate>);

    #[async_trait]
    impl ObjectDetector for ScriptedDetector {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn detect(&self, _image: &SceneImage) -> VisionResult<Vec<RawCandidate>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl ObjectDetector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        async fn detect(&self, _image: &SceneImage) -> VisionResult<Vec<RawCandidate>> {
            Err(VisionError::internal("inference exploded"))
        }
    }

    fn classifier(candidates: Vec<RawCandidate>) -> DetectionClassifier {
        DetectionClassifier::new(Arc::new(ScriptedDetector(candidates)))
    }

    fn scene() -> Vec<u8> {
        png_bytes(&checkerboard(320, 240))
    }

    fn valid_box() -> BoundingBox {
        BoundingBox::new(20.0, 20.0, 120.0, 100.0)
    }

    const POTHOLE: i64 = 0;
    const FIRE: i64 = 1;
    const GARBAGE: i64 = 3;

    #[tokio::test]
    async fn test_zero_candidates() {
        let result = classifier(vec![]).classify(scene()).await.unwrap();
        assert_eq!(result.mode, OperatingMode::Normal);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_pothole_gets_age_and_garbage_does_not() {
        let result = classifier(vec![
            RawCandidate::new(POTHOLE, 0.9, valid_box()),
            RawCandidate::new(GARBAGE, 0.7, BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
        ])
        .classify(scene())
        .await
        .unwrap();

        assert_eq!(result.detections.len(), 2);
        let pothole = &result.detections[0];
        assert_eq!(pothole.class, DetectionClass::Pothole);
        let age = pothole.age_days.expect("pothole should be aged");
        assert!(age <= 365);

        let garbage = &result.detections[1];
        assert_eq!(garbage.class, DetectionClass::Garbage);
        assert_eq!(garbage.age_days, None);
        assert_eq!(result.ages_suppressed, 0);
    }

    #[tokio::test]
    async fn test_fire_before_pothole_suppresses_age() {
        let result = classifier(vec![
            RawCandidate::new(FIRE, 0.8, valid_box()),
            RawCandidate::new(POTHOLE, 0.9, valid_box()),
        ])
        .classify(scene())
        .await
        .unwrap();

        // The pothole is still emitted, only its age is omitted.
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[1].class, DetectionClass::Pothole);
        assert_eq!(result.detections[1].age_days, None);
        assert_eq!(result.ages_suppressed, 1);
    }

    #[tokio::test]
    async fn test_pothole_before_fire_is_aged() {
        let result = classifier(vec![
            RawCandidate::new(POTHOLE, 0.9, valid_box()),
            RawCandidate::new(FIRE, 0.8, valid_box()),
            RawCandidate::new(POTHOLE, 0.6, valid_box()),
        ])
        .classify(scene())
        .await
        .unwrap();

        assert!(result.detections[0].age_days.is_some());
        assert_eq!(result.detections[1].class, DetectionClass::Fire);
        assert_eq!(result.detections[2].age_days, None);
        assert_eq!(result.ages_suppressed, 1);
    }

    #[tokio::test]
    async fn test_invalid_box_omits_age() {
        let result = classifier(vec![
            RawCandidate::new(POTHOLE, 0.9, BoundingBox::new(300.0, 200.0, 400.0, 260.0)),
            RawCandidate::new(POTHOLE, 0.9, BoundingBox::new(50.0, 50.0, 50.0, 90.0)),
        ])
        .classify(scene())
        .await
        .unwrap();

        assert_eq!(result.detections.len(), 2);
        assert!(result.detections.iter().all(|d| d.age_days.is_none()));
        assert_eq!(result.ages_suppressed, 0);
    }

    #[tokio::test]
    async fn test_order_labels_and_rounding() {
        let result = classifier(vec![
            RawCandidate::new(GARBAGE, 0.123456, valid_box()),
            RawCandidate::new(42, 0.5, valid_box()),
            RawCandidate::new(2, 1.7, valid_box()),
        ])
        .classify(scene())
        .await
        .unwrap();

        let classes: Vec<_> = result.detections.iter().map(|d| d.class).collect();
        assert_eq!(
            classes,
            vec![DetectionClass::Garbage, DetectionClass::Unknown, DetectionClass::Waterlogging]
        );
        assert_eq!(result.detections[0].confidence, 0.123);
        assert_eq!(result.detections[2].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_decode_error_propagates() {
        let err = classifier(vec![RawCandidate::new(POTHOLE, 0.9, valid_box())])
            .classify(b"not an image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::Decode(_)));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let err = DetectionClassifier::new(Arc::new(FailingDetector))
            .classify(scene())
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::Backend(_)));
    }

    #[tokio::test]
    async fn test_degraded_mode_is_explicit() {
        let classifier = DetectionClassifier::from_detector(None);
        assert_eq!(classifier.mode(), OperatingMode::Degraded);
        assert!(classifier.backend_name().is_none());

        let result = classifier.classify(scene()).await.unwrap();
        assert_eq!(result.mode, OperatingMode::Degraded);
        assert_eq!(result.detections, vec![synthetic_detection()]);
        assert_eq!(result.detections[0].age_days, Some(30));
    }

    #[tokio::test]
    async fn test_degraded_mode_still_rejects_garbage() {
        let err = DetectionClassifier::degraded()
            .classify(b"\x00\x01\x02".to_vec())
            .await
            .unwrap_err();
        assert!(err.is_decode());
    }
}
