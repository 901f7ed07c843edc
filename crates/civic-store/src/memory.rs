//! In-process sink.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use civic_models::{DetectionClass, DetectionRecord, StoredRecord};

use crate::error::StoreResult;
use crate::sink::DetectionSink;

/// Keeps records in memory, newest at the front.
///
/// With a capacity set, the oldest records are dropped once it is reached.
#[derive(Default)]
pub struct MemorySink {
    records: RwLock<VecDeque<StoredRecord>>,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DetectionSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, record: &DetectionRecord) -> StoreResult<StoredRecord> {
        let stored = StoredRecord::new(record.clone());
        let mut records = self.records.write().await;
        records.push_front(stored.clone());
        if let Some(capacity) = self.capacity {
            records.truncate(capacity);
        }
        Ok(stored)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        Ok(self.records.read().await.iter().take(limit).cloned().collect())
    }

    async fn by_class(&self, class: DetectionClass, limit: usize) -> StoreResult<Vec<StoredRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.record.contains_class(class))
            .take(limit)
            .cloned()
            .collect())
    }
}
