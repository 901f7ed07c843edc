//! Upload ingestion: classify, persist, notify.
//!
//! One upload produces one [`DetectionRecord`]. Classification failures abort
//! the upload before anything is stored or sent. A persistence failure is
//! reported back to the caller but does not stop the live alerts.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use civic_models::{DetectionRecord, GeoPoint, RecordId, UploadProvenance};
use civic_notify::{BroadcastReport, Broadcaster};
use civic_store::DetectionSink;
use civic_vision::{DetectionClassifier, VisionResult};

/// One uploaded image plus its client-supplied metadata.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub location: Option<GeoPoint>,
    pub client_timestamp: Option<String>,
}

/// Result of a successful analysis.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub record: DetectionRecord,
    /// Set when the record was persisted
    pub record_id: Option<RecordId>,
    /// Set when persisting failed
    pub storage_error: Option<String>,
    pub broadcast: BroadcastReport,
}

impl IngestOutcome {
    pub fn is_persisted(&self) -> bool {
        self.record_id.is_some()
    }
}

/// Drives one upload through the pipeline.
#[derive(Clone)]
pub struct IngestionService {
    classifier: Arc<DetectionClassifier>,
    sink: Arc<dyn DetectionSink>,
    broadcaster: Broadcaster,
}

impl IngestionService {
    pub fn new(
        classifier: Arc<DetectionClassifier>,
        sink: Arc<dyn DetectionSink>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            classifier,
            sink,
            broadcaster,
        }
    }

    pub async fn ingest(&self, request: IngestRequest) -> VisionResult<IngestOutcome> {
        let upload_id = Uuid::new_v4();
        let span = info_span!("ingest", %upload_id, filename = %request.filename);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: IngestRequest) -> VisionResult<IngestOutcome> {
        info!(
            bytes = request.bytes.len(),
            has_location = request.location.is_some(),
            "Received upload"
        );

        let classification = self.classifier.classify(request.bytes).await?;
        if classification.mode.is_degraded() {
            warn!("Upload analyzed in degraded mode, detections are synthetic");
        }

        let provenance = UploadProvenance::new(request.filename)
            .with_location(request.location)
            .with_client_timestamp(request.client_timestamp);
        let record = DetectionRecord::new(provenance, classification.mode, classification.detections);

        let (record_id, storage_error) = match self.sink.append(&record).await {
            Ok(stored) => {
                info!(record_id = %stored.id, sink = self.sink.name(), "Detection record stored");
                (Some(stored.id), None)
            }
            Err(e) => {
                warn!(sink = self.sink.name(), error = %e, "Failed to persist detection record");
                (None, Some(e.to_string()))
            }
        };

        // One alert per detection, in detection order, fanned out in one round
        let broadcast = self.broadcaster.broadcast_batch(record.detections()).await;

        info!(
            detections = record.total_detections(),
            mode = %record.inference_mode(),
            observers_reached = broadcast.delivered,
            persisted = record_id.is_some(),
            "Upload processed"
        );

        Ok(IngestOutcome {
            record,
            record_id,
            storage_error,
            broadcast,
        })
    }
}
