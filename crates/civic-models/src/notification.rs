//! Real-time notification payloads pushed to connected observers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::department::Department;
use crate::detection::{Detection, DetectionClass};

/// Notification discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DetectionAlert,
    SystemNotification,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DetectionAlert => "detection_alert",
            NotificationType::SystemNotification => "system_notification",
        }
    }
}

/// Notification envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A detection routed to its department
    DetectionAlert {
        class: DetectionClass,
        department: Department,
        notification_timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        age_days: Option<u32>,
    },

    /// Free-form operator message
    SystemNotification {
        message: String,
        notification_timestamp: DateTime<Utc>,
    },
}

impl Notification {
    /// Build a detection alert.
    ///
    /// `age_days` is carried only for potholes with a non-zero age. An age of
    /// exactly 0 is omitted, same as an absent age; consumers rely on this.
    pub fn for_detection(detection: &Detection) -> Self {
        let age_days = match (detection.class, detection.age_days) {
            (DetectionClass::Pothole, Some(age)) if age != 0 => Some(age),
            _ => None,
        };

        Notification::DetectionAlert {
            class: detection.class,
            department: Department::for_class(detection.class),
            notification_timestamp: Utc::now(),
            age_days,
        }
    }

    /// Build a system notification.
    pub fn system(message: impl Into<String>) -> Self {
        Notification::SystemNotification {
            message: message.into(),
            notification_timestamp: Utc::now(),
        }
    }

    /// Get the notification type.
    pub fn notification_type(&self) -> NotificationType {
        match self {
            Notification::DetectionAlert { .. } => NotificationType::DetectionAlert,
            Notification::SystemNotification { .. } => NotificationType::SystemNotification,
        }
    }

    /// Serialize to the wire text sent to observers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn pothole(age_days: Option<u32>) -> Detection {
        Detection::new(
            DetectionClass::Pothole,
            0.9,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        )
        .with_age(age_days)
    }

    #[test]
    fn test_pothole_alert_carries_age() {
        let json = serde_json::to_value(Notification::for_detection(&pothole(Some(12)))).unwrap();
        assert_eq!(json["type"], "detection_alert");
        assert_eq!(json["class"], "pothole");
        assert_eq!(json["department"], "Roads Department");
        assert_eq!(json["age_days"], 12);
        assert!(json["notification_timestamp"].is_string());
    }

    #[test]
    fn test_zero_age_is_omitted() {
        let json = serde_json::to_value(Notification::for_detection(&pothole(Some(0)))).unwrap();
        assert!(json.get("age_days").is_none());

        let json = serde_json::to_value(Notification::for_detection(&pothole(None))).unwrap();
        assert!(json.get("age_days").is_none());
    }

    #[test]
    fn test_age_only_for_potholes() {
        let garbage = Detection::new(
            DetectionClass::Garbage,
            0.7,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        )
        .with_age(Some(40));
        let json = serde_json::to_value(Notification::for_detection(&garbage)).unwrap();
        assert_eq!(json["department"], "Sanitation Department");
        assert!(json.get("age_days").is_none());
    }

    #[test]
    fn test_exact_field_set() {
        let json = serde_json::to_value(Notification::for_detection(&pothole(Some(3)))).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["age_days", "class", "department", "notification_timestamp", "type"]
        );
    }

    #[test]
    fn test_system_notification() {
        let msg = Notification::system("Maintenance at 22:00");
        assert_eq!(msg.notification_type(), NotificationType::SystemNotification);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"system_notification\""));
        assert!(json.contains("\"message\":\"Maintenance at 22:00\""));
    }
}
