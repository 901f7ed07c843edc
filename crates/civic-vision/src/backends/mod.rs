//! Detection backend implementations.

mod http;
#[cfg(feature = "onnx")]
mod onnx;

pub use http::HttpDetector;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxDetector, OnnxDetectorConfig};
