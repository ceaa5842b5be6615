use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::model::{Conversation, ConversationOverview, Message, MessageView, NewMessage};
use crate::config::StoreError;
use crate::modules::auth::interface::StoreResult;
use crate::modules::auth::schema::ErrorResponse;

/// Conversation and message persistence. Callers check participation before
/// any message operation.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the pair already has a conversation.
    async fn create_conversation(&self, coach_id: &str, client_id: &str) -> StoreResult<Conversation>;
    async fn get_conversation(&self, conversation_id: i64) -> StoreResult<Option<Conversation>>;
    async fn get_conversation_by_participants(
        &self,
        coach_id: &str,
        client_id: &str,
    ) -> StoreResult<Option<Conversation>>;
    /// Returns one page of overview rows plus the total number of conversations.
    async fn list_conversations_by_user(
        &self,
        user_id: &str,
        include_archived: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<ConversationOverview>, i64)>;
    async fn set_archived(&self, conversation_id: i64, archived: bool) -> StoreResult<bool>;
    async fn is_participant(&self, conversation_id: i64, user_id: &str) -> StoreResult<bool>;

    async fn create_message(&self, message: &NewMessage) -> StoreResult<Message>;
    async fn get_message(&self, message_id: i64) -> StoreResult<Option<Message>>;
    /// Hydrated view of a single message, tombstones included.
    async fn get_message_view(&self, message_id: i64, viewer_id: &str) -> StoreResult<Option<MessageView>>;
    /// Newest first; tombstones excluded.
    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MessageView>>;
    /// Returns `false` if the message is missing or deleted.
    async fn update_message(&self, message_id: i64, text: &str) -> StoreResult<bool>;
    /// Returns `false` if the message is missing or already deleted.
    async fn delete_message(&self, message_id: i64) -> StoreResult<bool>;
    /// Returns `true` only when a new read row was written.
    async fn mark_message_as_read(&self, message_id: i64, user_id: &str) -> StoreResult<bool>;
    async fn mark_all_as_read(&self, conversation_id: i64, user_id: &str) -> StoreResult<u64>;
    async fn count_unread_messages(&self, conversation_id: i64, user_id: &str) -> StoreResult<i64>;
}

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("You are not a participant in this conversation")]
    NotParticipant,

    #[error("Only the sender can modify this message")]
    InsufficientPermissions,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Conversation already exists")]
    ConversationExists,

    #[error("Message text cannot be empty")]
    MessageEmpty,

    #[error("Message text exceeds {0} characters")]
    MessageTooLong(usize),

    #[error("Message has been deleted")]
    MessageDeleted,

    #[error("Reply target is not a message in this conversation")]
    InvalidReplyTo,

    #[error("A conversation needs two distinct participants")]
    InvalidParticipants,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MessagingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotParticipant | Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::ConversationNotFound | Self::ParticipantNotFound | Self::MessageNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::ConversationExists => StatusCode::CONFLICT,
            Self::MessageEmpty
            | Self::MessageTooLong(_)
            | Self::MessageDeleted
            | Self::InvalidReplyTo
            | Self::InvalidParticipants
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotParticipant => "NotParticipant",
            Self::InsufficientPermissions => "InsufficientPermissions",
            Self::ConversationNotFound => "ConversationNotFound",
            Self::ParticipantNotFound => "ParticipantNotFound",
            Self::MessageNotFound => "MessageNotFound",
            Self::ConversationExists => "ConversationExists",
            Self::MessageEmpty => "MessageEmpty",
            Self::MessageTooLong(_) => "MessageTooLong",
            Self::MessageDeleted => "MessageDeleted",
            Self::InvalidReplyTo => "InvalidReplyTo",
            Self::InvalidParticipants => "InvalidParticipants",
            Self::Validation(_) => "ValidationError",
            Self::Store(StoreError::NotFound) => "NotFound",
            Self::Store(_) => "InternalServerError",
        }
    }
}

impl IntoResponse for MessagingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Messaging request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::with_code(message, self.code()))).into_response()
    }
}
