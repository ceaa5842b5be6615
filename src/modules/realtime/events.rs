use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modules::messaging::model::MessageView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewMessage,
    MessageEdited,
    MessageDeleted,
    MessageRead,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::MessageEdited => "message_edited",
            Self::MessageDeleted => "message_deleted",
            Self::MessageRead => "message_read",
            Self::Error => "error",
        }
    }
}

/// Server-to-client frame.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    fn base(event_type: EventType, conversation_id: Option<i64>) -> Self {
        Self {
            event_type,
            conversation_id,
            message: None,
            message_id: None,
            read_by: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn new_message(conversation_id: i64, message: MessageView) -> Self {
        Self {
            message_id: Some(message.message.id),
            message: Some(message),
            ..Self::base(EventType::NewMessage, Some(conversation_id))
        }
    }

    pub fn message_edited(conversation_id: i64, message: MessageView) -> Self {
        Self {
            message_id: Some(message.message.id),
            message: Some(message),
            ..Self::base(EventType::MessageEdited, Some(conversation_id))
        }
    }

    pub fn message_deleted(conversation_id: i64, message_id: i64) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::base(EventType::MessageDeleted, Some(conversation_id))
        }
    }

    /// `message_id` is `None` when the whole conversation was marked read.
    pub fn message_read(conversation_id: i64, message_id: Option<i64>, read_by: &str) -> Self {
        Self {
            message_id,
            read_by: Some(read_by.to_string()),
            ..Self::base(EventType::MessageRead, Some(conversation_id))
        }
    }

    pub fn error(conversation_id: Option<i64>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(EventType::Error, conversation_id)
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe { conversation_id: i64 },
    Unsubscribe { conversation_id: i64 },
    Ping,
}
