//! Operator notifications.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use civic_notify::BroadcastReport;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SystemMessageRequest {
    pub message: String,
}

/// Broadcast a system message to every connected observer.
pub async fn send_system_notification(
    State(state): State<AppState>,
    Json(body): Json<SystemMessageRequest>,
) -> ApiResult<Json<BroadcastReport>> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let report = state.broadcaster.broadcast_system_message(message).await;
    info!(
        attempted = report.attempted,
        delivered = report.delivered,
        "System notification sent"
    );
    Ok(Json(report))
}
