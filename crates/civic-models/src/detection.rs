//! Detection types.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category of a civic-infrastructure finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Pothole,
    Fire,
    Waterlogging,
    Garbage,
    Unknown,
}

/// Classes whose presence in a scene suppresses pothole age estimation.
pub const HIGH_PRIORITY_CLASSES: &[DetectionClass] = &[DetectionClass::Fire];

impl DetectionClass {
    /// Map a model class id to its label. Unmapped ids are `Unknown`.
    pub fn from_class_id(class_id: i64) -> Self {
        match class_id {
            0 => DetectionClass::Pothole,
            1 => DetectionClass::Fire,
            2 => DetectionClass::Waterlogging,
            3 => DetectionClass::Garbage,
            _ => DetectionClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionClass::Pothole => "pothole",
            DetectionClass::Fire => "fire",
            DetectionClass::Waterlogging => "waterlogging",
            DetectionClass::Garbage => "garbage",
            DetectionClass::Unknown => "unknown",
        }
    }

    /// Check if this class is in the high-priority set.
    pub fn is_high_priority(&self) -> bool {
        HIGH_PRIORITY_CLASSES.contains(self)
    }
}

impl fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pothole" => Ok(DetectionClass::Pothole),
            "fire" => Ok(DetectionClass::Fire),
            "waterlogging" => Ok(DetectionClass::Waterlogging),
            "garbage" => Ok(DetectionClass::Garbage),
            "unknown" => Ok(DetectionClass::Unknown),
            other => Err(format!("unknown detection class: {}", other)),
        }
    }
}

/// Axis-aligned box in image pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Integer pixel region inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Check the box is finite and non-degenerate.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    /// Integer crop region for an image of the given size.
    ///
    /// Coordinates are truncated toward zero. Returns `None` when the truncated
    /// box is empty or not fully inside the image.
    pub fn crop_region(&self, image_width: u32, image_height: u32) -> Option<PixelRect> {
        if !self.is_well_formed() {
            return None;
        }

        let (x1, y1, x2, y2) = (
            self.x1.trunc() as i64,
            self.y1.trunc() as i64,
            self.x2.trunc() as i64,
            self.y2.trunc() as i64,
        );

        let inside = x2 > x1
            && y2 > y1
            && x1 >= 0
            && y1 >= 0
            && x2 <= image_width as i64
            && y2 <= image_height as i64;

        inside.then(|| PixelRect {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One classified finding in an uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Detected category
    #[serde(rename = "class")]
    pub class: DetectionClass,
    /// Confidence in [0, 1], rounded to three decimals
    pub confidence: f64,
    /// Bounding box `[x1, y1, x2, y2]` in pixels
    #[schemars(with = "[f64; 4]")]
    pub bbox: BoundingBox,
    /// Estimated age in days (potholes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_days: Option<u32>,
}

impl Detection {
    pub fn new(class: DetectionClass, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence: round_confidence(confidence),
            bbox,
            age_days: None,
        }
    }

    pub fn with_age(mut self, age_days: Option<u32>) -> Self {
        self.age_days = age_days;
        self
    }
}

/// Round a confidence score to three decimal digits, ties to even.
pub fn round_confidence(confidence: f64) -> f64 {
    (confidence * 1000.0).round_ties_even() / 1000.0
}

/// Whether detections came from real inference or the degraded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// A detection backend is loaded and answers requests.
    Normal,
    /// No backend is available; a fixed synthetic detection is returned.
    Degraded,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Normal => "normal",
            OperatingMode::Degraded => "degraded",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, OperatingMode::Degraded)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
