//! The persistence seam.

use async_trait::async_trait;

use civic_models::{DetectionClass, DetectionRecord, StoredRecord};

use crate::error::StoreResult;

/// Durable home for detection records.
///
/// Each successful `append` persists exactly one record and returns it with
/// the identifier the sink assigned. Reads return newest first.
#[async_trait]
pub trait DetectionSink: Send + Sync {
    /// Short sink name for logs and metrics.
    fn name(&self) -> &str;

    async fn append(&self, record: &DetectionRecord) -> StoreResult<StoredRecord>;

    /// Most recent records, newest first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<StoredRecord>>;

    /// Most recent records containing `class`, newest first.
    async fn by_class(&self, class: DetectionClass, limit: usize) -> StoreResult<Vec<StoredRecord>>;

    /// Verify the sink can accept writes.
    async fn check_ready(&self) -> StoreResult<()> {
        Ok(())
    }
}
