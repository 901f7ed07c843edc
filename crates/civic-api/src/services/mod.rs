//! Business logic services.

pub mod ingestion;

pub use ingestion::{IngestOutcome, IngestRequest, IngestionService};
