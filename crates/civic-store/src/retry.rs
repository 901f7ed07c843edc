//! Retry wrapper with exponential backoff and jitter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info_span, warn, Instrument};

use civic_models::{DetectionClass, DetectionRecord, StoredRecord};

use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::sink::DetectionSink;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Load from `STORE_RETRY_MAX`, `STORE_RETRY_BASE_MS` and `STORE_RETRY_MAX_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str| std::env::var(key).ok();

        Self {
            max_retries: var("STORE_RETRY_MAX")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay_ms: var("STORE_RETRY_BASE_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: var("STORE_RETRY_MAX_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
        }
    }
}

/// Wraps a sink and retries retryable failures.
///
/// Reads retry on [`StoreError::is_retryable`]. Appends retry only on
/// [`StoreError::is_retryable_append`], where nothing was written.
pub struct RetryingSink {
    inner: Arc<dyn DetectionSink>,
    config: RetryConfig,
}

impl RetryingSink {
    pub fn new(inner: Arc<dyn DetectionSink>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        retryable: fn(&StoreError) -> bool,
        op: F,
    ) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        let sink = self.inner.name();
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let span = info_span!("store_retry", sink, operation, attempt = attempt + 1);

            match op().instrument(span).await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt < self.config.max_retries => {
                    let delay = calculate_delay(&self.config, attempt);
                    warn!(
                        sink,
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Store operation failed, retrying: {}",
                        e
                    );
                    metrics::record_retry(sink);
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| StoreError::unavailable("retries exhausted")))
    }
}

#[async_trait]
impl DetectionSink for RetryingSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn append(&self, record: &DetectionRecord) -> StoreResult<StoredRecord> {
        let start = Instant::now();
        let result = self
            .with_retry("append", StoreError::is_retryable_append, || {
                self.inner.append(record)
            })
            .await;
        metrics::record_append(self.inner.name(), result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        self.with_retry("recent", StoreError::is_retryable, || self.inner.recent(limit))
            .await
    }

    async fn by_class(&self, class: DetectionClass, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        self.with_retry("by_class", StoreError::is_retryable, || {
            self.inner.by_class(class, limit)
        })
        .await
    }

    async fn check_ready(&self) -> StoreResult<()> {
        self.inner.check_ready().await
    }
}

/// Exponential backoff with full jitter, never below the base delay.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    // Pseudo-random factor from the clock.
    let jittered = if capped_delay > 0 {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}
