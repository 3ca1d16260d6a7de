//! Notification behavior types
//!
//! A behavior event records how a user reacted to one notification. These
//! events feed the 128-dimension behavioral vector and never share an index
//! with semantic check-in embeddings.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// How the user reacted to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Opened,
    Dismissed,
    Snoozed,
    Clicked,
    Ignored,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::Opened => "opened",
            NotificationAction::Dismissed => "dismissed",
            NotificationAction::Snoozed => "snoozed",
            NotificationAction::Clicked => "clicked",
            NotificationAction::Ignored => "ignored",
        }
    }
}

/// What the notification was about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    MedicationReminder,
    HealthCheck,
    CareGroupUpdate,
    SystemAlert,
    AiInsight,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::MedicationReminder => "medication_reminder",
            NotificationCategory::HealthCheck => "health_check",
            NotificationCategory::CareGroupUpdate => "care_group_update",
            NotificationCategory::SystemAlert => "system_alert",
            NotificationCategory::AiInsight => "ai_insight",
        }
    }
}

/// Device the reaction happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Watch,
}

/// One notification interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: String,
    pub notification_id: String,
    pub action: NotificationAction,
    pub category: NotificationCategory,
    pub timestamp: DateTime<Utc>,
    /// Local hour of day, 0-23
    pub hour_of_day: u32,
    /// Day of week with Sunday = 0
    pub day_of_week: u32,
    /// Milliseconds between delivery and the action
    #[serde(default)]
    pub response_latency_ms: Option<u64>,
    #[serde(default)]
    pub device: Option<DeviceType>,
}

impl BehaviorEvent {
    /// Build an event whose hour and weekday come from the UTC timestamp
    pub fn at(
        user_id: impl Into<String>,
        notification_id: impl Into<String>,
        action: NotificationAction,
        category: NotificationCategory,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            notification_id: notification_id.into(),
            action,
            category,
            hour_of_day: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_sunday(),
            timestamp,
            response_latency_ms: None,
            device: None,
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.response_latency_ms = Some(latency_ms);
        self
    }

    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = Some(device);
        self
    }

    /// Latency in minutes, if recorded
    pub fn latency_minutes(&self) -> Option<f64> {
        self.response_latency_ms.map(|ms| ms as f64 / 60_000.0)
    }

    /// Metadata kept alongside the stored vector
    pub fn metadata(&self) -> BehaviorMetadata {
        BehaviorMetadata {
            notification_id: self.notification_id.clone(),
            action: self.action,
            category: self.category,
            hour_of_day: self.hour_of_day,
            day_of_week: self.day_of_week,
            response_latency_ms: self.response_latency_ms,
            device: self.device,
        }
    }
}

/// Metadata stored with a behavioral vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMetadata {
    pub notification_id: String,
    pub action: NotificationAction,
    pub category: NotificationCategory,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub response_latency_ms: Option<u64>,
    pub device: Option<DeviceType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_derives_hour_and_weekday() {
        // 2024-03-03 was a Sunday
        let ts = Utc.with_ymd_and_hms(2024, 3, 3, 14, 30, 0).unwrap();
        let event = BehaviorEvent::at(
            "user-1",
            "n-1",
            NotificationAction::Opened,
            NotificationCategory::HealthCheck,
            ts,
        );
        assert_eq!(event.hour_of_day, 14);
        assert_eq!(event.day_of_week, 0);
    }

    #[test]
    fn test_event_deserializes_snake_case() {
        let json = r#"{
            "user_id": "user-1",
            "notification_id": "n-9",
            "action": "snoozed",
            "category": "medication_reminder",
            "timestamp": "2024-03-04T08:00:00Z",
            "hour_of_day": 8,
            "day_of_week": 1,
            "device": "watch"
        }"#;
        let event: BehaviorEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, NotificationAction::Snoozed);
        assert_eq!(event.category, NotificationCategory::MedicationReminder);
        assert_eq!(event.device, Some(DeviceType::Watch));
        assert_eq!(event.response_latency_ms, None);
    }

    #[test]
    fn test_latency_minutes() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let event = BehaviorEvent::at(
            "user-1",
            "n-1",
            NotificationAction::Clicked,
            NotificationCategory::AiInsight,
            ts,
        )
        .with_latency_ms(90_000);
        assert_eq!(event.latency_minutes(), Some(1.5));
        assert_eq!(event.metadata().response_latency_ms, Some(90_000));
    }
}
