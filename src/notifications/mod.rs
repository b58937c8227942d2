use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod channel;
pub mod feed;
pub mod frame;

pub use channel::NotificationChannel;
pub use feed::{NotificationAlert, NotificationFeed};

/// Title used when the broker payload omits one
const DEFAULT_NOTIFICATION_TITLE: &str = "Notification";

/// Notification as it travels over the wire
///
/// Every field is optional; the backend populates what it has and the
/// client fills in sensible defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Anything else the backend attached (task ids, links, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A notification as held by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Pass-through payload for feature code
    pub payload: serde_json::Value,
}

impl From<NotificationDto> for Notification {
    fn from(dto: NotificationDto) -> Self {
        Self {
            id: dto
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: dto
                .title
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
            message: dto.message.unwrap_or_default(),
            created_at: dto.created_at.unwrap_or_else(Utc::now),
            payload: serde_json::Value::Object(dto.extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_title_is_defaulted() {
        let dto: NotificationDto = serde_json::from_str(
            r#"{"id":"n-1","message":"Task 12 was approved","taskId":"12"}"#,
        )
        .unwrap();
        let notification = Notification::from(dto);

        assert_eq!(notification.id, "n-1");
        assert_eq!(notification.title, DEFAULT_NOTIFICATION_TITLE);
        assert_eq!(notification.message, "Task 12 was approved");
        assert_eq!(notification.payload["taskId"], "12");
    }

    #[test]
    fn test_missing_id_gets_generated() {
        let dto: NotificationDto = serde_json::from_str(r#"{"title":"Reminder"}"#).unwrap();
        let notification = Notification::from(dto);
        assert!(!notification.id.is_empty());
        assert_eq!(notification.title, "Reminder");
    }
}
