//! Department routing.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::DetectionClass;

/// Organizational unit responsible for a detection class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Department {
    #[serde(rename = "Roads Department")]
    Roads,
    #[serde(rename = "Fire Department")]
    Fire,
    #[serde(rename = "Drainage Department")]
    Drainage,
    #[serde(rename = "Sanitation Department")]
    Sanitation,
    #[serde(rename = "General Department")]
    General,
}

impl Department {
    /// Route a detection class to its department. Unmapped classes go to `General`.
    pub fn for_class(class: DetectionClass) -> Self {
        match class {
            DetectionClass::Pothole => Department::Roads,
            DetectionClass::Fire => Department::Fire,
            DetectionClass::Waterlogging => Department::Drainage,
            DetectionClass::Garbage => Department::Sanitation,
            DetectionClass::Unknown => Department::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Roads => "Roads Department",
            Department::Fire => "Fire Department",
            Department::Drainage => "Drainage Department",
            Department::Sanitation => "Sanitation Department",
            Department::General => "General Department",
        }
    }
}

impl From<DetectionClass> for Department {
    fn from(class: DetectionClass) -> Self {
        Department::for_class(class)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
