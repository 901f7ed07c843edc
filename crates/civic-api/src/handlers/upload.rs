//! Image upload handler.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use civic_models::{Detection, GeoPoint, OperatingMode, RecordId};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::IngestRequest;
use crate::state::AppState;

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// `success`, or `partial` when analysis worked but the record was not stored
    pub status: &'static str,
    pub inference_mode: OperatingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    pub detections: Vec<Detection>,
    pub total_detections: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Option<Vec<u8>>,
    latitude: Option<String>,
    longitude: Option<String>,
    timestamp: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        let invalid = |e: axum::extract::multipart::MultipartError| {
            ApiError::bad_request(format!("Invalid multipart body: {}", e))
        };

        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.filename = field.file_name().map(str::to_string);
                    form.content_type = field.content_type().map(str::to_string);
                    form.bytes = Some(field.bytes().await.map_err(invalid)?.to_vec());
                }
                "latitude" => form.latitude = Some(field.text().await.map_err(invalid)?),
                "longitude" => form.longitude = Some(field.text().await.map_err(invalid)?),
                "timestamp" => form.timestamp = Some(field.text().await.map_err(invalid)?),
                _ => {}
            }
        }

        Ok(form)
    }

    fn into_request(self) -> ApiResult<IngestRequest> {
        let bytes = self
            .bytes
            .ok_or_else(|| ApiError::bad_request("Missing file field"))?;

        let is_image = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::bad_request("File must be an image"));
        }

        let location = GeoPoint::parse_optional(self.latitude.as_deref(), self.longitude.as_deref())
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(IngestRequest {
            filename: self.filename.unwrap_or_else(|| "upload".to_string()),
            bytes,
            location,
            client_timestamp: self.timestamp.filter(|t| !t.trim().is_empty()),
        })
    }
}

/// Accept an image, analyze it, store the record and alert observers.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let start = Instant::now();

    let request = match UploadForm::read(multipart).await.and_then(UploadForm::into_request) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected upload");
            metrics::record_upload(e.code(), start.elapsed().as_secs_f64());
            return Err(e);
        }
    };

    let outcome = match state.ingestion.ingest(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let e = ApiError::from(e);
            metrics::record_upload(e.code(), start.elapsed().as_secs_f64());
            return Err(e);
        }
    };

    let status = if outcome.is_persisted() { "success" } else { "partial" };
    metrics::record_upload(status, start.elapsed().as_secs_f64());

    let total = outcome.record.total_detections();
    Ok(Json(UploadResponse {
        status,
        inference_mode: outcome.record.inference_mode(),
        record_id: outcome.record_id,
        detections: outcome.record.detections().to_vec(),
        total_detections: total,
        message: format!("Processed {} detections", total),
        storage_error: outcome.storage_error,
    }))
}
