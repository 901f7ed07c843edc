//! Per-upload detection records.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::detection::{Detection, DetectionClass, OperatingMode};

/// Identifier assigned by a sink when a record is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoPointError {
    #[error("latitude and longitude must be supplied together")]
    Incomplete,

    #[error("invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// WGS84 location attached to an upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointError::OutOfRange { field: "latitude", value: latitude });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointError::OutOfRange { field: "longitude", value: longitude });
        }
        Ok(Self { latitude, longitude })
    }

    /// Parse optional form fields. Both absent (or blank) is `Ok(None)`.
    pub fn parse_optional(
        latitude: Option<&str>,
        longitude: Option<&str>,
    ) -> Result<Option<Self>, GeoPointError> {
        let latitude = latitude.map(str::trim).filter(|s| !s.is_empty());
        let longitude = longitude.map(str::trim).filter(|s| !s.is_empty());

        match (latitude, longitude) {
            (None, None) => Ok(None),
            (Some(lat), Some(lon)) => {
                let lat = parse_coordinate("latitude", lat)?;
                let lon = parse_coordinate("longitude", lon)?;
                Self::new(lat, lon).map(Some)
            }
            _ => Err(GeoPointError::Incomplete),
        }
    }
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<f64, GeoPointError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeoPointError::Invalid { field, value: value.to_string() })
}

/// Where an upload came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadProvenance {
    /// Original file name supplied by the client
    pub filename: String,
    /// Optional capture location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Client-supplied capture timestamp, stored verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<String>,
    /// Server ingestion timestamp
    pub upload_timestamp: DateTime<Utc>,
}

impl UploadProvenance {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            location: None,
            client_timestamp: None,
            upload_timestamp: Utc::now(),
        }
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    pub fn with_client_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.client_timestamp = timestamp;
        self
    }
}

/// All detections from one uploaded image.
///
/// Built once per upload and never mutated afterwards; fields are only
/// reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionRecord {
    #[serde(flatten)]
    provenance: UploadProvenance,
    inference_mode: OperatingMode,
    detections: Vec<Detection>,
    total_detections: usize,
    detected_classes: BTreeSet<DetectionClass>,
}

impl DetectionRecord {
    /// Create a record, deriving the count and the set of distinct classes.
    /// Detection order is kept as produced by the model.
    pub fn new(
        provenance: UploadProvenance,
        inference_mode: OperatingMode,
        detections: Vec<Detection>,
    ) -> Self {
        let detected_classes = detections.iter().map(|d| d.class).collect();
        Self {
            provenance,
            inference_mode,
            total_detections: detections.len(),
            detections,
            detected_classes,
        }
    }

    pub fn provenance(&self) -> &UploadProvenance {
        &self.provenance
    }

    pub fn filename(&self) -> &str {
        &self.provenance.filename
    }

    pub fn inference_mode(&self) -> OperatingMode {
        self.inference_mode
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn total_detections(&self) -> usize {
        self.total_detections
    }

    pub fn detected_classes(&self) -> &BTreeSet<DetectionClass> {
        &self.detected_classes
    }

    pub fn contains_class(&self, class: DetectionClass) -> bool {
        self.detected_classes.contains(&class)
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// A record as held by a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoredRecord {
    pub id: RecordId,
    pub stored_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: DetectionRecord,
}

impl StoredRecord {
    pub fn new(record: DetectionRecord) -> Self {
        Self {
            id: RecordId::new(),
            stored_at: Utc::now(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn det(class: DetectionClass) -> Detection {
        Detection::new(class, 0.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn test_record_derived_fields() {
        let record = DetectionRecord::new(
            UploadProvenance::new("street.jpg"),
            OperatingMode::Normal,
            vec![
                det(DetectionClass::Garbage),
                det(DetectionClass::Pothole),
                det(DetectionClass::Garbage),
            ],
        );

        assert_eq!(record.total_detections(), 3);
        assert_eq!(record.detected_classes().len(), 2);
        assert!(record.contains_class(DetectionClass::Pothole));
        // Order preserved
        assert_eq!(record.detections()[0].class, DetectionClass::Garbage);
        assert_eq!(record.detections()[1].class, DetectionClass::Pothole);
    }

    #[test]
    fn test_empty_record() {
        let record =
            DetectionRecord::new(UploadProvenance::new("empty.png"), OperatingMode::Normal, vec![]);
        assert!(record.is_empty());
        assert_eq!(record.total_detections(), 0);
        assert!(record.detected_classes().is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let provenance = UploadProvenance::new("a.jpg")
            .with_location(Some(GeoPoint::new(23.02, 72.57).unwrap()))
            .with_client_timestamp(Some("2024-05-01T10:00:00".to_string()));
        let record = DetectionRecord::new(
            provenance,
            OperatingMode::Degraded,
            vec![det(DetectionClass::Fire)],
        );
        let stored = StoredRecord::new(record);
        let json = serde_json::to_value(&stored).unwrap();

        assert_eq!(json["filename"], "a.jpg");
        assert_eq!(json["location"]["latitude"], 23.02);
        assert_eq!(json["client_timestamp"], "2024-05-01T10:00:00");
        assert_eq!(json["inference_mode"], "degraded");
        assert_eq!(json["total_detections"], 1);
        assert_eq!(json["detected_classes"], serde_json::json!(["fire"]));
        assert!(json["id"].is_string());

        let back: StoredRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_geo_point_parsing() {
        assert_eq!(GeoPoint::parse_optional(None, None), Ok(None));
        assert_eq!(GeoPoint::parse_optional(Some(" "), Some("")), Ok(None));
        assert_eq!(
            GeoPoint::parse_optional(Some("23.0225"), Some("72.5714")),
            Ok(Some(GeoPoint { latitude: 23.0225, longitude: 72.5714 }))
        );
        assert_eq!(
            GeoPoint::parse_optional(Some("23.0"), None),
            Err(GeoPointError::Incomplete)
        );
        assert!(matches!(
            GeoPoint::parse_optional(Some("north"), Some("72.0")),
            Err(GeoPointError::Invalid { field: "latitude", .. })
        ));
        assert!(matches!(
            GeoPoint::parse_optional(Some("95.0"), Some("72.0")),
            Err(GeoPointError::OutOfRange { field: "latitude", .. })
        ));
    }
}
