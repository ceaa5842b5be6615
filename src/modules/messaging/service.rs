use std::sync::Arc;

use super::interface::{MessageStore, MessagingError};
use super::model::{
    Conversation, ConversationOverview, Message, MessageView, NewAttachment, NewMessage,
};
use crate::modules::auth::interface::UserRepository;
use crate::modules::realtime::service::BroadcastError;
use crate::modules::realtime::RealtimeService;

pub const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Debug, Clone)]
pub struct SendMessageInput {
    pub conversation_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub attachments: Vec<NewAttachment>,
}

/// Message text after trimming; attachments may stand in for text.
pub fn validate_text(text: &str, allow_empty: bool) -> Result<String, MessagingError> {
    let text = text.trim();
    if text.is_empty() && !allow_empty {
        return Err(MessagingError::MessageEmpty);
    }
    if text.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(MessagingError::MessageTooLong(MAX_MESSAGE_LENGTH));
    }
    Ok(text.to_string())
}

/// Every mutation checks participation, writes to the store, hydrates the row,
/// then emits the realtime event. Realtime failures never fail the request.
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    users: Arc<dyn UserRepository>,
    realtime: Arc<RealtimeService>,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        users: Arc<dyn UserRepository>,
        realtime: Arc<RealtimeService>,
    ) -> Self {
        Self {
            store,
            users,
            realtime,
        }
    }

    async fn ensure_participant(&self, conversation_id: i64, user_id: &str) -> Result<(), MessagingError> {
        if self.store.is_participant(conversation_id, user_id).await? {
            return Ok(());
        }
        match self.store.get_conversation(conversation_id).await? {
            Some(_) => Err(MessagingError::NotParticipant),
            None => Err(MessagingError::ConversationNotFound),
        }
    }

    /// Loads a message the caller may act on as its sender.
    async fn owned_live_message(&self, message_id: i64, user_id: &str) -> Result<Message, MessagingError> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or(MessagingError::MessageNotFound)?;

        self.ensure_participant(message.conversation_id, user_id).await?;
        if message.sender_id != user_id {
            return Err(MessagingError::InsufficientPermissions);
        }
        if message.is_deleted {
            return Err(MessagingError::MessageDeleted);
        }
        Ok(message)
    }

    async fn hydrated(&self, message_id: i64, viewer_id: &str) -> Result<MessageView, MessagingError> {
        self.store
            .get_message_view(message_id, viewer_id)
            .await?
            .ok_or(MessagingError::MessageNotFound)
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    /// Returns the existing conversation for the pair when there is one; the
    /// boolean reports whether a new row was created.
    pub async fn create_conversation(
        &self,
        caller_id: &str,
        caller_is_admin: bool,
        coach_id: &str,
        client_id: &str,
    ) -> Result<(Conversation, bool), MessagingError> {
        if coach_id == client_id {
            return Err(MessagingError::InvalidParticipants);
        }
        if !caller_is_admin && caller_id != coach_id && caller_id != client_id {
            return Err(MessagingError::NotParticipant);
        }

        let coach = self
            .users
            .find_by_id(coach_id)
            .await?
            .ok_or(MessagingError::ParticipantNotFound)?;
        if !coach.role.is_coach_or_admin() {
            return Err(MessagingError::InvalidParticipants);
        }
        if self.users.find_by_id(client_id).await?.is_none() {
            return Err(MessagingError::ParticipantNotFound);
        }

        if let Some(existing) = self
            .store
            .get_conversation_by_participants(coach_id, client_id)
            .await?
        {
            return Ok((existing, false));
        }

        match self.store.create_conversation(coach_id, client_id).await {
            Ok(conversation) => {
                tracing::info!(conversation_id = conversation.id, coach_id = %coach_id, client_id = %client_id, "Conversation created");
                Ok((conversation, true))
            }
            Err(e) if e.is_conflict_on("participants") => {
                // Lost a concurrent create; the winner's row is the answer.
                let existing = self
                    .store
                    .get_conversation_by_participants(coach_id, client_id)
                    .await?
                    .ok_or(MessagingError::ConversationExists)?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_conversation(&self, user_id: &str, conversation_id: i64) -> Result<Conversation, MessagingError> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or(MessagingError::ConversationNotFound)
    }

    /// Also subscribes a connected caller to each non-archived conversation on the page.
    pub async fn list_conversations(
        &self,
        user_id: &str,
        include_archived: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ConversationOverview>, i64), MessagingError> {
        let (rows, total) = self
            .store
            .list_conversations_by_user(user_id, include_archived, limit, offset)
            .await?;

        if self.realtime.hub().is_connected(user_id).await {
            for row in rows.iter().filter(|r| !r.conversation.is_archived) {
                self.realtime
                    .hub()
                    .subscribe(user_id, &row.conversation.channel())
                    .await;
            }
        }

        Ok((rows, total))
    }

    pub async fn set_archived(
        &self,
        user_id: &str,
        conversation_id: i64,
        archived: bool,
    ) -> Result<Conversation, MessagingError> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.store.set_archived(conversation_id, archived).await?;
        self.get_conversation(user_id, conversation_id).await
    }

    pub async fn unread_count(&self, user_id: &str, conversation_id: i64) -> Result<i64, MessagingError> {
        self.ensure_participant(conversation_id, user_id).await?;
        Ok(self.store.count_unread_messages(conversation_id, user_id).await?)
    }

    /// Non-participants and unknown conversations both get `false`.
    pub async fn subscribe(&self, user_id: &str, conversation_id: i64) -> Result<bool, MessagingError> {
        Ok(self
            .realtime
            .subscribe_to_conversation(user_id, conversation_id)
            .await?
            && self.realtime.hub().is_connected(user_id).await)
    }

    pub async fn unsubscribe(&self, user_id: &str, conversation_id: i64) -> bool {
        self.realtime
            .unsubscribe_from_conversation(user_id, conversation_id)
            .await
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    pub async fn send_message(&self, sender_id: &str, input: SendMessageInput) -> Result<MessageView, MessagingError> {
        self.ensure_participant(input.conversation_id, sender_id).await?;
        let text = validate_text(&input.text, !input.attachments.is_empty())?;

        if let Some(reply_to_id) = input.reply_to_id {
            let target = self.store.get_message(reply_to_id).await?;
            if !target.is_some_and(|m| m.conversation_id == input.conversation_id) {
                return Err(MessagingError::InvalidReplyTo);
            }
        }

        let message = self
            .store
            .create_message(&NewMessage {
                conversation_id: input.conversation_id,
                sender_id: sender_id.to_string(),
                text,
                reply_to_id: input.reply_to_id,
                attachments: input.attachments,
            })
            .await?;
        let view = self.hydrated(message.id, sender_id).await?;

        log_broadcast(
            "new_message",
            message.conversation_id,
            self.realtime
                .broadcast_new_message(message.conversation_id, &view)
                .await,
        );
        Ok(view)
    }

    pub async fn list_messages(
        &self,
        user_id: &str,
        conversation_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageView>, MessagingError> {
        self.ensure_participant(conversation_id, user_id).await?;
        Ok(self
            .store
            .list_messages(conversation_id, user_id, limit, offset)
            .await?)
    }

    pub async fn edit_message(&self, user_id: &str, message_id: i64, text: &str) -> Result<MessageView, MessagingError> {
        let message = self.owned_live_message(message_id, user_id).await?;
        let text = validate_text(text, false)?;

        if !self.store.update_message(message_id, &text).await? {
            return Err(MessagingError::MessageDeleted);
        }
        let view = self.hydrated(message_id, user_id).await?;

        log_broadcast(
            "message_edited",
            message.conversation_id,
            self.realtime
                .broadcast_message_edited(message.conversation_id, &view)
                .await,
        );
        Ok(view)
    }

    pub async fn delete_message(&self, user_id: &str, message_id: i64) -> Result<(), MessagingError> {
        let message = self.owned_live_message(message_id, user_id).await?;

        if !self.store.delete_message(message_id).await? {
            return Err(MessagingError::MessageDeleted);
        }
        tracing::info!(message_id, conversation_id = message.conversation_id, "Message deleted");

        log_broadcast(
            "message_deleted",
            message.conversation_id,
            self.realtime
                .broadcast_message_deleted(message.conversation_id, message_id)
                .await,
        );
        Ok(())
    }

    /// Marking your own message is accepted and does nothing.
    pub async fn mark_as_read(&self, user_id: &str, message_id: i64) -> Result<(), MessagingError> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or(MessagingError::MessageNotFound)?;
        self.ensure_participant(message.conversation_id, user_id).await?;

        if message.is_deleted {
            return Err(MessagingError::MessageDeleted);
        }
        if message.sender_id == user_id {
            return Ok(());
        }

        if self.store.mark_message_as_read(message_id, user_id).await? {
            log_broadcast(
                "message_read",
                message.conversation_id,
                self.realtime
                    .broadcast_message_read(message.conversation_id, Some(message_id), user_id)
                    .await,
            );
        }
        Ok(())
    }

    /// Emits a single aggregate read event when anything changed.
    pub async fn mark_all_as_read(&self, user_id: &str, conversation_id: i64) -> Result<u64, MessagingError> {
        self.ensure_participant(conversation_id, user_id).await?;
        let marked = self.store.mark_all_as_read(conversation_id, user_id).await?;

        if marked > 0 {
            log_broadcast(
                "message_read",
                conversation_id,
                self.realtime
                    .broadcast_message_read(conversation_id, None, user_id)
                    .await,
            );
        }
        Ok(marked)
    }
}

fn log_broadcast(event: &str, conversation_id: i64, result: Result<usize, BroadcastError>) {
    match result {
        Ok(delivered) => {
            tracing::debug!(event, conversation_id, delivered, "Realtime event broadcast")
        }
        Err(e) => tracing::warn!(event, conversation_id, error = %e, "Realtime broadcast failed"),
    }
}
