//! Notification metrics.

use metrics::{counter, gauge};

pub mod names {
    pub const NOTIFICATIONS_SENT_TOTAL: &str = "civic_notifications_sent_total";
    pub const NOTIFICATION_FAILURES_TOTAL: &str = "civic_notification_failures_total";
    pub const OBSERVERS_CONNECTED: &str = "civic_observers_connected";
}

pub fn record_sent(kind: &'static str) {
    counter!(names::NOTIFICATIONS_SENT_TOTAL, "type" => kind).increment(1);
}

pub fn record_failure(kind: &'static str, reason: &'static str) {
    counter!(names::NOTIFICATION_FAILURES_TOTAL, "type" => kind, "reason" => reason).increment(1);
}

pub fn set_observers(count: usize) {
    gauge!(names::OBSERVERS_CONNECTED).set(count as f64);
}
