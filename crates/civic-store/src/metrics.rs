//! Persistence metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const APPENDS_TOTAL: &str = "civic_store_appends_total";
    pub const APPEND_LATENCY_SECONDS: &str = "civic_store_append_latency_seconds";
    pub const RETRIES_TOTAL: &str = "civic_store_retries_total";
}

pub fn record_append(sink: &str, success: bool, latency_secs: f64) {
    let status = if success { "ok" } else { "error" };
    counter!(names::APPENDS_TOTAL, "sink" => sink.to_string(), "status" => status).increment(1);
    histogram!(names::APPEND_LATENCY_SECONDS, "sink" => sink.to_string()).record(latency_secs);
}

pub fn record_retry(sink: &str) {
    counter!(names::RETRIES_TOTAL, "sink" => sink.to_string()).increment(1);
}
