//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "civic_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "civic_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "civic_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "civic_ws_connections_total";
    pub const WS_MESSAGES_RECEIVED: &str = "civic_ws_messages_received_total";

    // Ingestion metrics
    pub const UPLOADS_TOTAL: &str = "civic_uploads_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "civic_upload_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "civic_rate_limit_hits_total";
}

/// Routes with their own label; anything else is grouped.
const KNOWN_PATHS: &[&str] = &[
    "/",
    "/upload",
    "/ws",
    "/detections",
    "/notifications/system",
    "/health",
    "/ready",
    "/metrics",
];

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

pub fn record_ws_message_received() {
    counter!(names::WS_MESSAGES_RECEIVED).increment(1);
}

/// Record a finished upload by outcome (`success`, `partial`, or an error code).
pub fn record_upload(outcome: &'static str, duration_secs: f64) {
    counter!(names::UPLOADS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint).to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Keep path label cardinality bounded.
fn sanitize_path(path: &str) -> &str {
    KNOWN_PATHS
        .iter()
        .copied()
        .find(|known| *known == path)
        .unwrap_or("other")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
