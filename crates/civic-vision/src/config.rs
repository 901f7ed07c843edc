//! Detector backend selection.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::ObjectDetector;
use crate::backends::HttpDetector;
use crate::classifier::DetectionClassifier;

/// Which detection backend to load at startup.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Local ONNX model (needs the `onnx` feature)
    pub model_path: Option<String>,
    /// Base URL of a remote detection service
    pub detector_url: Option<String>,
    /// Request timeout for the remote service
    pub detector_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            detector_url: None,
            detector_timeout: Duration::from_secs(30),
        }
    }
}

impl DetectorConfig {
    /// Load from `MODEL_PATH`, `DETECTOR_URL` and `DETECTOR_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self {
            model_path: non_empty_var("MODEL_PATH"),
            detector_url: non_empty_var("DETECTOR_URL"),
            detector_timeout: Duration::from_secs(
                env::var("DETECTOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Load the first backend that comes up: ONNX model, then remote service.
    /// Returns a degraded classifier when neither is available.
    pub async fn build(&self) -> DetectionClassifier {
        DetectionClassifier::from_detector(self.load_detector().await)
    }

    async fn load_detector(&self) -> Option<Arc<dyn ObjectDetector>> {
        if let Some(path) = &self.model_path {
            match load_onnx(path) {
                Some(detector) => return Some(detector),
                None => warn!(model_path = %path, "Could not load ONNX model, trying next backend"),
            }
        }

        if let Some(url) = &self.detector_url {
            match HttpDetector::new(url.clone(), self.detector_timeout) {
                Ok(detector) => match detector.check_ready().await {
                    Ok(()) => {
                        info!(url = %url, "Using remote detection service");
                        return Some(Arc::new(detector));
                    }
                    Err(e) => warn!(url = %url, error = %e, "Remote detector not ready"),
                },
                Err(e) => warn!(error = %e, "Could not create remote detector"),
            }
        }

        None
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &str) -> Option<Arc<dyn ObjectDetector>> {
    use crate::backends::{OnnxDetector, OnnxDetectorConfig};

    let config = OnnxDetectorConfig {
        model_path: path.to_string(),
        ..Default::default()
    };
    match OnnxDetector::new(config) {
        Ok(detector) => Some(Arc::new(detector)),
        Err(e) => {
            warn!(error = %e, "ONNX detector failed to load");
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &str) -> Option<Arc<dyn ObjectDetector>> {
    warn!("MODEL_PATH set but built without the onnx feature");
    None
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_models::OperatingMode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_no_backend_is_degraded() {
        let classifier = DetectorConfig::default().build().await;
        assert_eq!(classifier.mode(), OperatingMode::Degraded);
    }

    #[tokio::test]
    async fn test_missing_model_falls_through_to_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = DetectorConfig {
            model_path: Some("/nonexistent/model.onnx".to_string()),
            detector_url: Some(server.uri()),
            detector_timeout: Duration::from_secs(1),
        };
        let classifier = config.build().await;
        assert_eq!(classifier.mode(), OperatingMode::Normal);
        assert_eq!(classifier.backend_name(), Some("http"));
    }

    #[tokio::test]
    async fn test_unhealthy_http_backend_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = DetectorConfig {
            detector_url: Some(server.uri()),
            ..Default::default()
        };
        assert_eq!(config.build().await.mode(), OperatingMode::Degraded);
    }
}
