//! Remote detector reached over HTTP.
//!
//! The detection service accepts `POST {base}/detect` with the encoded image
//! as a multipart `file` part and answers:
//!
//! ```json
//! {"detections": [{"class_id": 0, "confidence": 0.91, "bbox": [x1, y1, x2, y2]}]}
//! ```
//!
//! `GET {base}/health` is used as the readiness probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::backend::{ObjectDetector, RawCandidate};
use crate::error::{VisionError, VisionResult};
use crate::scene::SceneImage;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawCandidate>,
}

/// HTTP detection backend.
pub struct HttpDetector {
    base_url: String,
    client: Client,
}

impl HttpDetector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VisionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    fn name(&self) -> &str {
        "http"
    }

    async fn detect(&self, image: &SceneImage) -> VisionResult<Vec<RawCandidate>> {
        let url = format!("{}/detect", self.base_url);

        let part = Part::bytes(image.encoded().to_vec())
            .file_name("upload")
            .mime_str("application/octet-stream")
            .map_err(|e| VisionError::internal(format!("Invalid multipart part: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VisionError::backend(format!("Detector request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::backend(format!(
                "Detector returned {}: {}",
                status, error_text
            )));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| VisionError::backend(format!("Failed to parse detector response: {}", e)))?;

        debug!(count = body.detections.len(), "Remote detection completed");
        Ok(body.detections)
    }

    async fn check_ready(&self) -> VisionResult<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VisionError::unavailable(format!("Detector unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(VisionError::unavailable(format!(
                "Detector health returned {}",
                response.status()
            )))
        }
    }
}
