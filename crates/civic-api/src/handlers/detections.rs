//! Stored record queries.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use civic_models::{DetectionClass, StoredRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct DetectionsQuery {
    pub limit: Option<usize>,
    pub class: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectionsResponse {
    pub records: Vec<StoredRecord>,
    pub count: usize,
}

/// Most recent records, newest first, optionally only those with `class`.
pub async fn list_detections(
    State(state): State<AppState>,
    Query(query): Query<DetectionsQuery>,
) -> ApiResult<Json<DetectionsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let records = match query.class.as_deref().filter(|c| !c.is_empty()) {
        Some(class) => {
            let class: DetectionClass = class.parse().map_err(ApiError::BadRequest)?;
            state.sink.by_class(class, limit).await?
        }
        None => state.sink.recent(limit).await?,
    };

    Ok(Json(DetectionsResponse {
        count: records.len(),
        records,
    }))
}
