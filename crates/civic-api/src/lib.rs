//! Axum HTTP/WebSocket server for civic issue reports.
//!
//! This crate provides:
//! - Image upload and ingestion (classify, persist, notify)
//! - Live detection alerts over WebSocket
//! - Record queries and operator system messages
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{IngestOutcome, IngestRequest, IngestionService};
pub use state::AppState;
