//! Vision metrics.

use metrics::{counter, histogram};

use civic_models::{DetectionClass, OperatingMode};

/// Metric names as constants for consistency.
pub mod names {
    pub const CLASSIFICATIONS_TOTAL: &str = "civic_classifications_total";
    pub const DETECTIONS_TOTAL: &str = "civic_detections_total";
    pub const AGE_SUPPRESSED_TOTAL: &str = "civic_pothole_age_suppressed_total";
    pub const AGE_SKIPPED_INVALID_BOX_TOTAL: &str = "civic_pothole_age_invalid_box_total";
    pub const BACKEND_DURATION_SECONDS: &str = "civic_detector_duration_seconds";
    pub const BACKEND_FAILURES_TOTAL: &str = "civic_detector_failures_total";
}

pub fn record_classification(mode: OperatingMode) {
    counter!(names::CLASSIFICATIONS_TOTAL, "mode" => mode.as_str()).increment(1);
}

pub fn record_detection(class: DetectionClass) {
    counter!(names::DETECTIONS_TOTAL, "class" => class.as_str()).increment(1);
}

pub fn record_age_suppressed() {
    counter!(names::AGE_SUPPRESSED_TOTAL).increment(1);
}

pub fn record_age_invalid_box() {
    counter!(names::AGE_SKIPPED_INVALID_BOX_TOTAL).increment(1);
}

pub fn record_backend_call(backend: &str, duration_secs: f64) {
    histogram!(names::BACKEND_DURATION_SECONDS, "backend" => backend.to_string())
        .record(duration_secs);
}

pub fn record_backend_failure(backend: &str) {
    counter!(names::BACKEND_FAILURES_TOTAL, "backend" => backend.to_string()).increment(1);
}
