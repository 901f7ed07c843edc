//! Sink selection.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::StoreResult;
use crate::jsonl::JsonlSink;
use crate::memory::MemorySink;
use crate::retry::{RetryConfig, RetryingSink};
use crate::sink::DetectionSink;

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// JSON Lines file; records stay in memory when unset
    pub records_path: Option<PathBuf>,
    pub retry: RetryConfig,
}

impl StoreConfig {
    /// Load from `RECORDS_PATH` and the retry variables.
    pub fn from_env() -> Self {
        Self {
            records_path: env::var("RECORDS_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            retry: RetryConfig::from_env(),
        }
    }

    /// Open the configured sink behind a retry wrapper.
    pub async fn build(&self) -> StoreResult<Arc<dyn DetectionSink>> {
        let inner: Arc<dyn DetectionSink> = match &self.records_path {
            Some(path) => Arc::new(JsonlSink::open(path.clone()).await?),
            None => {
                info!("RECORDS_PATH not set, keeping detection records in memory");
                Arc::new(MemorySink::new())
            }
        };
        Ok(Arc::new(RetryingSink::new(inner, self.retry.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_memory_by_default() {
        let sink = StoreConfig::default().build().await.unwrap();
        assert_eq!(sink.name(), "memory");
    }

    #[tokio::test]
    async fn test_build_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            records_path: Some(dir.path().join("records.jsonl")),
            ..Default::default()
        };
        let sink = config.build().await.unwrap();
        assert_eq!(sink.name(), "jsonl");
        assert!(sink.check_ready().await.is_ok());
    }
}
