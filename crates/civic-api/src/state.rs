//! Application state.

use std::sync::Arc;

use civic_notify::{Broadcaster, BroadcasterConfig, ObserverRegistry};
use civic_store::DetectionSink;
use civic_vision::DetectionClassifier;

use crate::config::ApiConfig;
use crate::services::IngestionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub classifier: Arc<DetectionClassifier>,
    pub sink: Arc<dyn DetectionSink>,
    pub registry: Arc<ObserverRegistry>,
    pub broadcaster: Broadcaster,
    pub ingestion: IngestionService,
}

impl AppState {
    /// Load the detector and open the record sink described by `config`.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let classifier = config.detector.build().await;
        let sink = config.store.build().await?;
        let notify = config.notify.clone();
        Ok(Self::from_parts(config, classifier, sink, notify))
    }

    /// Assemble state from already constructed components.
    pub fn from_parts(
        config: ApiConfig,
        classifier: DetectionClassifier,
        sink: Arc<dyn DetectionSink>,
        notify: BroadcasterConfig,
    ) -> Self {
        let classifier = Arc::new(classifier);
        let registry = Arc::new(ObserverRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), notify);
        let ingestion =
            IngestionService::new(Arc::clone(&classifier), Arc::clone(&sink), broadcaster.clone());

        Self {
            config,
            classifier,
            sink,
            registry,
            broadcaster,
            ingestion,
        }
    }
}
