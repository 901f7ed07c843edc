//! Concurrent notification fan-out.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use civic_models::{Detection, Notification};

use crate::error::{SendError, SendResult};
use crate::metrics;
use crate::registry::{ObserverId, ObserverRegistry};

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Deadline for one observer to receive a whole broadcast round
    pub send_timeout: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(2000),
        }
    }
}

impl BroadcasterConfig {
    /// Load from `NOTIFY_SEND_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let send_timeout = env::var("NOTIFY_SEND_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Self::default().send_timeout);
        Self { send_timeout }
    }
}

/// Outcome of one broadcast round, counted per observer and notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl BroadcastReport {
    /// Add another report's counts into this one.
    pub fn absorb(&mut self, other: BroadcastReport) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.timed_out += other.timed_out;
    }
}

/// A serialized notification ready to hand to observers.
struct Payload {
    kind: &'static str,
    text: Arc<str>,
}

/// Sends notifications to every registered observer.
///
/// A slow or broken observer never blocks the others or fails the
/// broadcast; it is logged and counted. Dead observers are not removed here,
/// their own connection handling does that.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ObserverRegistry>,
    config: BroadcasterConfig,
}

impl Broadcaster {
    pub fn new(registry: Arc<ObserverRegistry>, config: BroadcasterConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }

    /// Broadcast a detection alert routed to the detection's department.
    pub async fn broadcast(&self, detection: &Detection) -> BroadcastReport {
        self.send(&Notification::for_detection(detection)).await
    }

    /// Broadcast one alert per detection, in detection order, as a single
    /// fan-out round.
    pub async fn broadcast_batch(&self, detections: &[Detection]) -> BroadcastReport {
        let notifications: Vec<Notification> =
            detections.iter().map(Notification::for_detection).collect();
        self.send_all(&notifications).await
    }

    /// Broadcast an operator message.
    pub async fn broadcast_system_message(&self, message: impl Into<String>) -> BroadcastReport {
        self.send(&Notification::system(message)).await
    }

    pub async fn send(&self, notification: &Notification) -> BroadcastReport {
        self.send_all(std::slice::from_ref(notification)).await
    }

    /// Serialize each notification once and deliver the batch to a snapshot
    /// of the registry.
    ///
    /// Every observer gets its own task that sends the batch in order. The
    /// whole batch shares one `send_timeout` deadline per observer; whatever
    /// is still unsent when it passes counts as timed out.
    pub async fn send_all(&self, notifications: &[Notification]) -> BroadcastReport {
        if notifications.is_empty() {
            return BroadcastReport::default();
        }

        let observers = self.registry.snapshot().await;
        if observers.is_empty() {
            debug!(
                notifications = notifications.len(),
                "No observers connected, skipping broadcast"
            );
            return BroadcastReport::default();
        }

        let payloads: Arc<[Payload]> = notifications
            .iter()
            .filter_map(|notification| {
                let kind = notification.notification_type().as_str();
                match notification.to_json() {
                    Ok(text) => Some(Payload {
                        kind,
                        text: text.into(),
                    }),
                    Err(e) => {
                        let e = SendError::from(e);
                        error!(kind, error = %e, "Failed to serialize notification");
                        metrics::record_failure(kind, e.reason());
                        None
                    }
                }
            })
            .collect();
        if payloads.is_empty() {
            return BroadcastReport::default();
        }

        let timeout = self.config.send_timeout;
        let mut tasks: JoinSet<(ObserverId, Vec<SendResult<()>>)> = JoinSet::new();
        for observer in observers {
            let payloads = Arc::clone(&payloads);
            tasks.spawn(async move {
                let deadline = Instant::now() + timeout;
                let mut results = Vec::with_capacity(payloads.len());
                for payload in payloads.iter() {
                    match tokio::time::timeout_at(deadline, observer.send_text(&payload.text)).await {
                        Ok(result) => results.push(result),
                        Err(_) => break,
                    }
                }
                let timeout_ms = timeout.as_millis() as u64;
                results.resize_with(payloads.len(), || Err(SendError::TimedOut(timeout_ms)));
                (observer.id(), results)
            });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (id, results) = match joined {
                Ok(joined) => joined,
                Err(e) => {
                    error!(error = %e, "Notification task panicked");
                    for payload in payloads.iter() {
                        report.attempted += 1;
                        report.failed += 1;
                        metrics::record_failure(payload.kind, "panic");
                    }
                    continue;
                }
            };

            for (payload, result) in payloads.iter().zip(results) {
                report.attempted += 1;
                match result {
                    Ok(()) => {
                        report.delivered += 1;
                        metrics::record_sent(payload.kind);
                    }
                    Err(e) => {
                        if matches!(e, SendError::TimedOut(_)) {
                            report.timed_out += 1;
                        } else {
                            report.failed += 1;
                        }
                        warn!(observer_id = %id, kind = payload.kind, error = %e, "Notification delivery failed");
                        metrics::record_failure(payload.kind, e.reason());
                    }
                }
            }
        }

        debug!(
            notifications = payloads.len(),
            attempted = report.attempted,
            delivered = report.delivered,
            "Broadcast complete"
        );
        report
    }
}
