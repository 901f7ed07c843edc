//! Local YOLOv8 detector on ONNX Runtime.
//!
//! The model is expected to be trained on the four civic classes, giving an
//! output of shape `[1, 4 + 4, N]`: box centre/size followed by one score per
//! class.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use civic_models::BoundingBox;

use crate::backend::{ObjectDetector, RawCandidate};
use crate::error::{VisionError, VisionResult};
use crate::scene::SceneImage;

const NUM_CLASSES: usize = 4;

#[derive(Debug, Clone)]
pub struct OnnxDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Square model input size
    pub input_size: u32,
}

impl Default for OnnxDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/best.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

struct Inner {
    session: Mutex<Session>,
    config: OnnxDetectorConfig,
}

/// ONNX Runtime detection backend.
pub struct OnnxDetector {
    inner: Arc<Inner>,
}

impl OnnxDetector {
    /// Load the model. Fails if the file is missing or cannot be loaded.
    pub fn new(config: OnnxDetectorConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "ONNX detector initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner { session, config }),
        })
    }
}

#[async_trait]
impl ObjectDetector for OnnxDetector {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn detect(&self, image: &SceneImage) -> VisionResult<Vec<RawCandidate>> {
        let inner = Arc::clone(&self.inner);
        let pixels = image.pixels_arc();
        tokio::task::spawn_blocking(move || inner.detect_image(&pixels))
            .await
            .map_err(|e| VisionError::internal(format!("inference task failed: {}", e)))?
    }
}

impl Inner {
    fn detect_image(&self, img: &DynamicImage) -> VisionResult<Vec<RawCandidate>> {
        let (width, height) = img.dimensions();
        let input = self.preprocess(img)?;
        let outputs = self.run_inference(input)?;
        let detections = postprocess(&outputs, width, height, &self.config)?;
        debug!(count = detections.len(), "ONNX detection completed");
        Ok(detections)
    }

    /// Resize to the model input, scale to [0, 1] and lay out as NCHW.
    fn preprocess(&self, img: &DynamicImage) -> VisionResult<Value> {
        let size = self.config.input_size;
        let rgb = img
            .resize_exact(size, size, image::imageops::FilterType::Triangle)
            .to_rgb8();
        let side = size as usize;

        let mut chw: Vec<f32> = Vec::with_capacity(3 * side * side);
        for c in 0..3 {
            for y in 0..size {
                for x in 0..size {
                    chw.push(rgb.get_pixel(x, y)[c] as f32 / 255.0);
                }
            }
        }

        Tensor::from_array((vec![1usize, 3, side, side], chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::internal(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::backend(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::backend("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::backend(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

/// Decode `[1, 4 + classes, N]` output into pixel-space candidates, best
/// class per box, thresholded and NMS-filtered, ordered by confidence.
fn postprocess(
    outputs: &[f32],
    orig_width: u32,
    orig_height: u32,
    config: &OnnxDetectorConfig,
) -> VisionResult<Vec<RawCandidate>> {
    let num_features = 4 + NUM_CLASSES;
    if outputs.is_empty() || outputs.len() % num_features != 0 {
        return Err(VisionError::backend(format!(
            "Unexpected output size {} for {} features",
            outputs.len(),
            num_features
        )));
    }
    let num_boxes = outputs.len() / num_features;

    let output = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
        .map_err(|e| VisionError::backend(format!("Failed to reshape output: {}", e)))?;
    let rows = output.t();

    let input_size = config.input_size as f32;
    let scale_w = orig_width as f32 / input_size;
    let scale_h = orig_height as f32 / input_size;
    let (max_x, max_y) = (orig_width as f32, orig_height as f32);

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let (cx, cy, w, h) = (rows[[i, 0]], rows[[i, 1]], rows[[i, 2]], rows[[i, 3]]);

        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..NUM_CLASSES {
            let score = rows[[i, 4 + c]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < config.confidence_threshold {
            continue;
        }

        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, max_y);

        candidates.push(RawCandidate::new(
            best_class as i64,
            best_score as f64,
            BoundingBox::new(x1 as f64, y1 as f64, x2 as f64, y2 as f64),
        ));
    }

    Ok(non_maximum_suppression(candidates, config.nms_threshold as f64))
}

/// Per-class NMS; survivors come out in descending confidence.
fn non_maximum_suppression(mut candidates: Vec<RawCandidate>, threshold: f64) -> Vec<RawCandidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawCandidate> = Vec::new();
    for candidate in candidates {
        let overlaps = keep.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = inter_w * inter_h;

    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| VisionError::internal(format!("Failed to read model file: {}", e)))?;

    Session::builder()
        .map_err(|e| VisionError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(class_id: i64, confidence: f64, bbox: [f64; 4]) -> RawCandidate {
        RawCandidate::new(class_id, confidence, BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]))
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-9);
        assert_eq!(iou(&a, &BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn test_nms_keeps_other_classes() {
        let kept = non_maximum_suppression(
            vec![
                cand(0, 0.6, [0.0, 0.0, 10.0, 10.0]),
                cand(0, 0.9, [1.0, 1.0, 10.0, 10.0]),
                cand(1, 0.7, [0.0, 0.0, 10.0, 10.0]),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn test_postprocess_scales_to_image() {
        // Two boxes, features laid out row-major as [feature][box].
        let config = OnnxDetectorConfig {
            input_size: 100,
            ..Default::default()
        };
        #[rustfmt::skip]
        let outputs = vec![
            50.0, 10.0, // cx
            50.0, 10.0, // cy
            20.0, 4.0,  // w
            20.0, 4.0,  // h
            0.1, 0.05,  // pothole
            0.9, 0.05,  // fire
            0.0, 0.05,  // waterlogging
            0.0, 0.05,  // garbage
        ];
        let candidates = postprocess(&outputs, 200, 100, &config).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
        assert_eq!(candidates[0].bbox, BoundingBox::new(80.0, 40.0, 120.0, 60.0));
    }

    #[test]
    fn test_postprocess_rejects_bad_shape() {
        let err = postprocess(&[0.0; 7], 10, 10, &OnnxDetectorConfig::default()).unwrap_err();
        assert!(matches!(err, VisionError::Backend(_)));
    }
}
