//! Error types for vision operations.

use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while analyzing an image.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Detection backend failed: {0}")]
    Backend(String),

    #[error("Detection backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a backend failure error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True if the image itself could not be analyzed (as opposed to the backend failing).
    pub fn is_decode(&self) -> bool {
        matches!(self, VisionError::Decode(_))
    }
}

impl From<image::ImageError> for VisionError {
    fn from(e: image::ImageError) -> Self {
        VisionError::Decode(e.to_string())
    }
}
