use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Text stored in place of a deleted message.
pub const DELETED_MESSAGE_TEXT: &str = "[Message deleted]";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub coach_id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.coach_id == user_id || self.client_id == user_id
    }

    pub fn participants(&self) -> [&str; 2] {
        [&self.coach_id, &self.client_id]
    }

    pub fn channel(&self) -> String {
        conversation_channel(self.id)
    }
}

pub fn conversation_channel(conversation_id: i64) -> String {
    format!("conversation:{}", conversation_id)
}

/// One row of a conversation listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message_text: Option<String>,
    pub last_message_sender_id: Option<String>,
    pub last_message_created_at: Option<DateTime<Utc>>,
    pub message_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub message_text: String,
    pub reply_to_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    pub attachment_type: String,
    pub url: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub attachment_type: String,
    pub url: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender_id: String,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub attachments: Vec<NewAttachment>,
}

/// A message hydrated with sender display fields and the viewer's read state.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: String,
    pub sender_image: Option<String>,
    pub is_read: bool,
    pub attachments: Vec<Attachment>,
}
