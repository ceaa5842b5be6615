use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::interface::MessagingError;
use super::model::{Conversation, MessageView};
use super::schema::{
    page, ArchiveConversationRequest, ConversationListResponse, CreateConversationRequest,
    EditMessageRequest, ListConversationsQuery, MarkAllReadResponse, MessageListResponse,
    PaginationQuery, SendMessageRequest, SubscriptionResponse, UnreadCountResponse,
};
use super::service::SendMessageInput;
use crate::middleware::auth::AuthUser;
use crate::modules::auth::schema::MessageResponse;
use crate::AppState;

// =============================================================================
// CONVERSATIONS
// =============================================================================

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), MessagingError> {
    req.validate()
        .map_err(|e| MessagingError::Validation(e.to_string()))?;

    let (conversation, created) = state
        .messages
        .create_conversation(&user.user_id, user.is_admin(), &req.coach_id, &req.client_id)
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(conversation)))
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ConversationListResponse>, MessagingError> {
    let (limit, offset) = page(query.limit, query.offset);
    let (conversations, total) = state
        .messages
        .list_conversations(&user.user_id, query.include_archived, limit, offset)
        .await?;

    Ok(Json(ConversationListResponse {
        conversations,
        total,
        limit,
        offset,
    }))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Conversation>, MessagingError> {
    let conversation = state
        .messages
        .get_conversation(&user.user_id, conversation_id)
        .await?;
    Ok(Json(conversation))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<UnreadCountResponse>, MessagingError> {
    let unread_count = state
        .messages
        .unread_count(&user.user_id, conversation_id)
        .await?;
    Ok(Json(UnreadCountResponse {
        conversation_id,
        unread_count,
    }))
}

pub async fn archive_conversation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Json(req): Json<ArchiveConversationRequest>,
) -> Result<Json<Conversation>, MessagingError> {
    let conversation = state
        .messages
        .set_archived(&user.user_id, conversation_id, req.archived)
        .await?;
    Ok(Json(conversation))
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<MarkAllReadResponse>, MessagingError> {
    let marked = state
        .messages
        .mark_all_as_read(&user.user_id, conversation_id)
        .await?;
    Ok(Json(MarkAllReadResponse {
        conversation_id,
        marked,
    }))
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Result<Json<SubscriptionResponse>, MessagingError> {
    let subscribed = state
        .messages
        .subscribe(&user.user_id, conversation_id)
        .await?;
    Ok(Json(SubscriptionResponse {
        conversation_id,
        subscribed,
    }))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
) -> Json<SubscriptionResponse> {
    state
        .messages
        .unsubscribe(&user.user_id, conversation_id)
        .await;
    Json(SubscriptionResponse {
        conversation_id,
        subscribed: false,
    })
}

// =============================================================================
// MESSAGES
// =============================================================================

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), MessagingError> {
    req.validate()
        .map_err(|e| MessagingError::Validation(e.to_string()))?;

    let view = state
        .messages
        .send_message(
            &user.user_id,
            SendMessageInput {
                conversation_id: req.conversation_id,
                text: req.message_text,
                reply_to_id: req.reply_to_id,
                attachments: req.attachments.into_iter().map(Into::into).collect(),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(conversation_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<MessageListResponse>, MessagingError> {
    let (limit, offset) = page(query.limit, query.offset);
    let messages = state
        .messages
        .list_messages(&user.user_id, conversation_id, limit, offset)
        .await?;

    Ok(Json(MessageListResponse {
        messages,
        limit,
        offset,
    }))
}

pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(message_id): Path<i64>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<MessageView>, MessagingError> {
    let view = state
        .messages
        .edit_message(&user.user_id, message_id, &req.message_text)
        .await?;
    Ok(Json(view))
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageResponse>, MessagingError> {
    state
        .messages
        .delete_message(&user.user_id, message_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Message deleted",
    }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageResponse>, MessagingError> {
    state
        .messages
        .mark_as_read(&user.user_id, message_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Message marked as read",
    }))
}
