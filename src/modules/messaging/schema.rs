use serde::{Deserialize, Serialize};
use validator::Validate;

use super::model::{ConversationOverview, MessageView, NewAttachment};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// CONVERSATIONS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    #[validate(length(min = 1, max = 64))]
    pub coach_id: String,
    #[validate(length(min = 1, max = 64))]
    pub client_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub include_archived: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationOverview>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveConversationRequest {
    pub archived: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub conversation_id: i64,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub conversation_id: i64,
    pub marked: u64,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub conversation_id: i64,
    pub subscribed: bool,
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AttachmentRequest {
    #[validate(length(min = 1, max = 32))]
    pub attachment_type: String,
    #[validate(url)]
    pub url: String,
    #[validate(range(min = 0))]
    pub file_size: Option<i64>,
    #[validate(length(max = 100))]
    pub mime_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl From<AttachmentRequest> for NewAttachment {
    fn from(req: AttachmentRequest) -> Self {
        Self {
            attachment_type: req.attachment_type,
            url: req.url,
            file_size: req.file_size,
            mime_type: req.mime_type,
            metadata: req.metadata.map(|m| m.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub conversation_id: i64,
    #[serde(default)]
    pub message_text: String,
    pub reply_to_id: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 10), nested)]
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub message_text: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageView>,
    pub limit: i64,
    pub offset: i64,
}

/// Clamps caller-supplied paging to `1..=MAX_PAGE_SIZE` and a non-negative offset.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
