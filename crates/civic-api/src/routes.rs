//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    health, list_detections, ready, root, send_system_notification, upload_image,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, redact_internal_errors, request_id, request_logging,
    security_headers, IpRateLimiter,
};
use crate::state::AppState;
use crate::ws::ws_notifications;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = IpRateLimiter::new(state.config.rate_limit_rps);

    // Uploads run inference, so they are rate limited per client
    let upload_routes = Router::new()
        .route("/upload", post(upload_image))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let api_routes = Router::new()
        .route("/detections", get(list_detections))
        .route("/notifications/system", post(send_system_notification));

    let ws_routes = Router::new().route("/ws", get(ws_notifications));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(upload_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn_with_state(state.clone(), redact_internal_errors))
        // Axum's default 2MB body limit is replaced by the configured one
        .layer(axum::extract::DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
