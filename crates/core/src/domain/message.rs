// Message Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message ID (assigned by persistent backends only)
pub type MessageId = String;

/// Identity of whoever produced a message
pub type SenderId = String;

/// Identity of a subscriber on backends with subscriptions
pub type SubscriberId = String;

/// Message payload (a plain string or any serializable value)
pub type MessageBody = serde_json::Value;

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Available,
    Reserved,
    Deleted,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Available => write!(f, "AVAILABLE"),
            MessageStatus::Reserved => write!(f, "RESERVED"),
            MessageStatus::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Queue message
///
/// `created_on`, `sender_id` and `body` are fixed when the message is built.
/// `status` and `subscriber_id` are delivery metadata set by the backend on
/// the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub created_on: DateTime<Utc>,
    pub sender_id: Option<SenderId>,
    pub body: MessageBody,
    pub status: MessageStatus,
    pub subscriber_id: Option<SubscriberId>,
}

impl Message {
    /// Create a new, available message
    ///
    /// # Arguments
    ///
    /// * `created_on` - Creation time (injected, not read from the system clock)
    /// * `sender_id` - Producer identity, if the caller has one
    /// * `body` - Payload
    pub fn new(
        created_on: DateTime<Utc>,
        sender_id: Option<SenderId>,
        body: impl Into<MessageBody>,
    ) -> Self {
        Self {
            id: None,
            created_on,
            sender_id,
            body: body.into(),
            status: MessageStatus::Available,
            subscriber_id: None,
        }
    }

    /// Body as a string slice, when the payload is a JSON string
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_str()
    }

    /// Stamp delivery metadata on a message handed out by `receive`
    pub fn mark_delivered(&mut self, subscriber_id: Option<SubscriberId>) {
        self.subscriber_id = subscriber_id;
        self.status = MessageStatus::Available;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_new_message_is_available() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let message = Message::new(now, Some("user-7".to_string()), "hello");

        assert_eq!(message.created_on, now);
        assert_eq!(message.sender_id.as_deref(), Some("user-7"));
        assert_eq!(message.body_str(), Some("hello"));
        assert_eq!(message.status, MessageStatus::Available);
        assert!(message.subscriber_id.is_none());
        assert!(message.id.is_none());
    }

    #[test]
    fn test_structured_body() {
        let now = Utc::now();
        let message = Message::new(now, None, json!({"event": "login", "attempts": 3}));

        assert!(message.body_str().is_none());
        assert_eq!(message.body["attempts"], 3);
    }

    #[test]
    fn test_mark_delivered_resets_status() {
        let mut message = Message::new(Utc::now(), None, "x");
        message.status = MessageStatus::Reserved;

        message.mark_delivered(None);

        assert_eq!(message.status, MessageStatus::Available);
        assert!(message.subscriber_id.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let encoded = serde_json::to_string(&MessageStatus::Available).unwrap();
        assert_eq!(encoded, "\"AVAILABLE\"");
        assert_eq!(MessageStatus::Deleted.to_string(), "DELETED");
    }
}
