//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use civic_store::StoreError;
use civic_vision::VisionError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The uploaded image could not be analyzed
    #[error("Could not analyze image: {0}")]
    AnalysisFailed(String),

    #[error("Detection backend failed: {0}")]
    DetectionBackend(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AnalysisFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DetectionBackend(_) => StatusCode::BAD_GATEWAY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::AnalysisFailed(_) => "analysis_failed",
            ApiError::DetectionBackend(_) => "detection_backend_failed",
            ApiError::RateLimited => "rate_limited",
            ApiError::Store(_) => "storage_failed",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<VisionError> for ApiError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::Decode(msg) => ApiError::AnalysisFailed(msg),
            VisionError::Backend(msg)
            | VisionError::BackendUnavailable(msg)
            | VisionError::ModelNotFound(msg) => ApiError::DetectionBackend(msg),
            VisionError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

/// Response extension marking a body that carries internal error detail.
///
/// The router swaps such bodies for a generic message in production.
#[derive(Debug, Clone, Copy)]
pub struct InternalErrorDetail {
    pub code: &'static str,
}

/// Generic body for an internal error whose detail must not leave the server.
pub fn redacted_response(status: StatusCode, code: &'static str) -> Response {
    let body = ErrorResponse {
        detail: "An internal error occurred".to_string(),
        code,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let internal = matches!(self, ApiError::Internal(_) | ApiError::Store(_));

        let body = ErrorResponse {
            detail: self.to_string(),
            code,
        };
        let mut response = (status, Json(body)).into_response();
        if internal {
            response.extensions_mut().insert(InternalErrorDetail { code });
        }
        if matches!(self, ApiError::RateLimited) {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_mapping() {
        let err = ApiError::from(VisionError::decode("truncated"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "analysis_failed");

        let err = ApiError::from(VisionError::backend("timeout"));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "detection_backend_failed");
    }

    #[test]
    fn test_bad_request() {
        let err = ApiError::bad_request("File must be an image");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn test_internal_errors_are_marked() {
        let response = ApiError::from(StoreError::unavailable("db down")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let marker = response.extensions().get::<InternalErrorDetail>().unwrap();
        assert_eq!(marker.code, "storage_failed");

        let response = ApiError::bad_request("nope").into_response();
        assert!(response.extensions().get::<InternalErrorDetail>().is_none());
    }
}
