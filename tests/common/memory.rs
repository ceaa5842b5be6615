//! In-memory repositories with the same conflict keys and revocation rules as the MySQL ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use leornian_core::config::StoreError;
use leornian_core::modules::auth::interface::{
    EmailTokenRepository, RefreshTokenRepository, StoreResult, UserRepository,
};
use leornian_core::modules::auth::model::{EmailToken, RefreshToken, Role, User};
use leornian_core::modules::messaging::interface::MessageStore;
use leornian_core::modules::messaging::model::{
    Attachment, Conversation, ConversationOverview, Message, MessageView, NewMessage,
    DELETED_MESSAGE_TEXT,
};
use leornian_core::modules::oauth::interface::{AccountRepository, OAuthStateRepository};
use leornian_core::modules::oauth::model::{FederatedAccount, OAuthState};
use leornian_core::modules::users::interface::CoachAssignmentRepository;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    oauth_states: HashMap<String, OAuthState>,
    accounts: Vec<FederatedAccount>,
    assignments: Vec<(String, String, bool)>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    attachments: Vec<Attachment>,
    reads: HashSet<(i64, String)>,
    next_conversation_id: i64,
    next_message_id: i64,
    next_attachment_id: i64,
}

#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

#[allow(dead_code)]
impl MemoryDb {
    pub fn assign_coach(&self, coach_id: &str, client_id: &str) {
        let mut t = self.tables.lock().unwrap();
        t.assignments
            .push((coach_id.to_string(), client_id.to_string(), true));
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let t = self.tables.lock().unwrap();
        t.users.iter().find(|u| u.email == email).cloned()
    }

    pub fn refresh_tokens_for(&self, user_id: &str) -> Vec<RefreshToken> {
        let t = self.tables.lock().unwrap();
        t.refresh_tokens
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn expire_refresh_tokens(&self, user_id: &str) {
        let mut t = self.tables.lock().unwrap();
        for token in t.refresh_tokens.iter_mut().filter(|r| r.user_id == user_id) {
            token.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub fn oauth_state_count(&self) -> usize {
        self.tables.lock().unwrap().oauth_states.len()
    }

    pub fn insert_oauth_state(&self, state: OAuthState) {
        let mut t = self.tables.lock().unwrap();
        t.oauth_states.insert(state.state.clone(), state);
    }
}

fn overview(t: &Tables, conversation: &Conversation) -> ConversationOverview {
    let live: Vec<&Message> = t
        .messages
        .iter()
        .filter(|m| m.conversation_id == conversation.id && !m.is_deleted)
        .collect();
    let last = live
        .iter()
        .max_by_key(|m| (m.created_at, m.id))
        .copied();

    ConversationOverview {
        conversation: conversation.clone(),
        last_message_text: last.map(|m| m.message_text.clone()),
        last_message_sender_id: last.map(|m| m.sender_id.clone()),
        last_message_created_at: last.map(|m| m.created_at),
        message_count: live.len() as i64,
    }
}

fn view(t: &Tables, message: &Message, viewer_id: &str) -> Option<MessageView> {
    let sender = t.users.iter().find(|u| u.id == message.sender_id)?;
    Some(MessageView {
        message: message.clone(),
        sender_name: sender.name.clone(),
        sender_image: sender.image.clone(),
        is_read: message.sender_id == viewer_id
            || t.reads.contains(&(message.id, viewer_id.to_string())),
        attachments: t
            .attachments
            .iter()
            .filter(|a| a.message_id == message.id)
            .cloned()
            .collect(),
    })
}

// =============================================================================
// USERS
// =============================================================================

#[async_trait]
impl UserRepository for MemoryDb {
    async fn create(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("users.uq_users_username".into()));
        }
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users.uq_users_email".into()));
        }
        t.users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.email_verified = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_role(&self, user_id: &str, role: Role) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(user) = t.users.iter_mut().find(|u| u.id == user_id) {
            user.role = role;
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

// =============================================================================
// REFRESH TOKENS
// =============================================================================

#[async_trait]
impl RefreshTokenRepository for MemoryDb {
    async fn create(&self, token: &RefreshToken) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.refresh_tokens.push(token.clone());
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        let t = self.tables.lock().unwrap();
        Ok(t.refresh_tokens
            .iter()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn revoke(&self, id: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        match t.refresh_tokens.iter_mut().find(|r| r.id == id && !r.revoked) {
            Some(token) => {
                token.revoked = true;
                token.revoked_at = Some(now);
                token.last_used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> StoreResult<u64> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        let mut revoked = 0;
        for token in t
            .refresh_tokens
            .iter_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            token.revoked = true;
            token.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        let before = t.refresh_tokens.len();
        t.refresh_tokens.retain(|r| r.expires_at >= now);
        Ok((before - t.refresh_tokens.len()) as u64)
    }
}

// =============================================================================
// OAUTH
// =============================================================================

#[async_trait]
impl OAuthStateRepository for MemoryDb {
    async fn create(&self, state: &OAuthState) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.oauth_states.insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn find(&self, state: &str) -> StoreResult<Option<OAuthState>> {
        let t = self.tables.lock().unwrap();
        Ok(t.oauth_states.get(state).cloned())
    }

    async fn delete(&self, state: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.oauth_states.remove(state).is_some())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        let before = t.oauth_states.len();
        t.oauth_states.retain(|_, s| s.expires_at >= now);
        Ok((before - t.oauth_states.len()) as u64)
    }
}

#[async_trait]
impl AccountRepository for MemoryDb {
    async fn create(&self, account: &FederatedAccount) -> StoreResult<()> {
        let mut t = self.tables.lock().unwrap();
        if t.accounts.iter().any(|a| {
            a.provider == account.provider && a.provider_account_id == account.provider_account_id
        }) {
            return Err(StoreError::Conflict(
                "accounts.uq_accounts_provider_account".into(),
            ));
        }
        t.accounts.push(account.clone());
        Ok(())
    }

    async fn find_by_provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> StoreResult<Option<FederatedAccount>> {
        let t = self.tables.lock().unwrap();
        Ok(t.accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<FederatedAccount>> {
        let t = self.tables.lock().unwrap();
        let mut accounts: Vec<FederatedAccount> = t
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn delete_for_user(&self, user_id: &str, provider: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.accounts.len();
        t.accounts
            .retain(|a| !(a.user_id == user_id && a.provider == provider));
        Ok(t.accounts.len() < before)
    }
}

// =============================================================================
// COACH ASSIGNMENTS
// =============================================================================

#[async_trait]
impl CoachAssignmentRepository for MemoryDb {
    async fn is_coach_of(&self, coach_id: &str, client_id: &str) -> StoreResult<bool> {
        let t = self.tables.lock().unwrap();
        Ok(t.assignments
            .iter()
            .any(|(c, cl, active)| *active && c == coach_id && cl == client_id))
    }

    async fn list_clients(&self, coach_id: &str) -> StoreResult<Vec<User>> {
        let t = self.tables.lock().unwrap();
        let mut clients: Vec<User> = t
            .assignments
            .iter()
            .filter(|(c, _, active)| *active && c == coach_id)
            .filter_map(|(_, client_id, _)| t.users.iter().find(|u| &u.id == client_id).cloned())
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }
}

// =============================================================================
// MESSAGING
// =============================================================================

#[async_trait]
impl MessageStore for MemoryDb {
    async fn create_conversation(&self, coach_id: &str, client_id: &str) -> StoreResult<Conversation> {
        let mut t = self.tables.lock().unwrap();
        if t
            .conversations
            .iter()
            .any(|c| c.coach_id == coach_id && c.client_id == client_id)
        {
            return Err(StoreError::Conflict(
                "conversations.uq_conversations_participants".into(),
            ));
        }

        t.next_conversation_id += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: t.next_conversation_id,
            coach_id: coach_id.to_string(),
            client_id: client_id.to_string(),
            created_at: now,
            updated_at: now,
            last_message_at: None,
            is_archived: false,
        };
        t.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: i64) -> StoreResult<Option<Conversation>> {
        let t = self.tables.lock().unwrap();
        Ok(t.conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned())
    }

    async fn get_conversation_by_participants(
        &self,
        coach_id: &str,
        client_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        let t = self.tables.lock().unwrap();
        Ok(t.conversations
            .iter()
            .find(|c| c.coach_id == coach_id && c.client_id == client_id)
            .cloned())
    }

    async fn list_conversations_by_user(
        &self,
        user_id: &str,
        include_archived: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<ConversationOverview>, i64)> {
        let t = self.tables.lock().unwrap();
        let mut matching: Vec<&Conversation> = t
            .conversations
            .iter()
            .filter(|c| c.has_participant(user_id) && (include_archived || !c.is_archived))
            .collect();
        matching.sort_by(|a, b| {
            let ka = (a.last_message_at.unwrap_or(a.created_at), a.id);
            let kb = (b.last_message_at.unwrap_or(b.created_at), b.id);
            kb.cmp(&ka)
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|c| overview(&t, c))
            .collect();
        Ok((page, total))
    }

    async fn set_archived(&self, conversation_id: i64, archived: bool) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        match t.conversations.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.is_archived = archived;
                conversation.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn is_participant(&self, conversation_id: i64, user_id: &str) -> StoreResult<bool> {
        let t = self.tables.lock().unwrap();
        Ok(t.conversations
            .iter()
            .any(|c| c.id == conversation_id && c.has_participant(user_id)))
    }

    async fn create_message(&self, message: &NewMessage) -> StoreResult<Message> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();

        t.next_message_id += 1;
        let stored = Message {
            id: t.next_message_id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id.clone(),
            message_text: message.text.clone(),
            reply_to_id: message.reply_to_id,
            is_deleted: false,
            created_at: now,
            edited_at: None,
            deleted_at: None,
        };
        t.messages.push(stored.clone());

        for attachment in &message.attachments {
            t.next_attachment_id += 1;
            let id = t.next_attachment_id;
            t.attachments.push(Attachment {
                id,
                message_id: stored.id,
                attachment_type: attachment.attachment_type.clone(),
                url: attachment.url.clone(),
                file_size: attachment.file_size,
                mime_type: attachment.mime_type.clone(),
                metadata: attachment.metadata.clone(),
                created_at: now,
            });
        }

        if let Some(conversation) = t
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        {
            conversation.last_message_at = Some(now);
            conversation.updated_at = now;
        }
        Ok(stored)
    }

    async fn get_message(&self, message_id: i64) -> StoreResult<Option<Message>> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn get_message_view(&self, message_id: i64, viewer_id: &str) -> StoreResult<Option<MessageView>> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages
            .iter()
            .find(|m| m.id == message_id)
            .and_then(|m| view(&t, m, viewer_id)))
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MessageView>> {
        let t = self.tables.lock().unwrap();
        let mut live: Vec<&Message> = t
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted)
            .collect();
        live.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(live
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .filter_map(|m| view(&t, m, viewer_id))
            .collect())
    }

    async fn update_message(&self, message_id: i64, text: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        match t
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && !m.is_deleted)
        {
            Some(message) => {
                message.message_text = text.to_string();
                message.edited_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_message(&self, message_id: i64) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        match t
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && !m.is_deleted)
        {
            Some(message) => {
                message.is_deleted = true;
                message.deleted_at = Some(Utc::now());
                message.message_text = DELETED_MESSAGE_TEXT.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_message_as_read(&self, message_id: i64, user_id: &str) -> StoreResult<bool> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.reads.insert((message_id, user_id.to_string())))
    }

    async fn mark_all_as_read(&self, conversation_id: i64, user_id: &str) -> StoreResult<u64> {
        let mut t = self.tables.lock().unwrap();
        let ids: Vec<i64> = t
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id && m.sender_id != user_id && !m.is_deleted
            })
            .map(|m| m.id)
            .collect();

        let mut marked = 0;
        for id in ids {
            if t.reads.insert((id, user_id.to_string())) {
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn count_unread_messages(&self, conversation_id: i64, user_id: &str) -> StoreResult<i64> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.sender_id != user_id
                    && !m.is_deleted
                    && !t.reads.contains(&(m.id, user_id.to_string()))
            })
            .count() as i64)
    }
}

// =============================================================================
// EMAIL TOKENS
// =============================================================================

#[derive(Default)]
pub struct MemoryEmailTokens {
    tokens: Mutex<Vec<EmailToken>>,
}

#[allow(dead_code)]
impl MemoryEmailTokens {
    pub fn expire_all(&self) {
        let mut tokens = self.tokens.lock().unwrap();
        for token in tokens.iter_mut() {
            token.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailTokenRepository for MemoryEmailTokens {
    async fn replace_for_email(&self, token: &EmailToken) -> StoreResult<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|t| t.email != token.email);
        tokens.push(token.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<EmailToken>> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn delete(&self, token: &str) -> StoreResult<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|t| t.token != token);
        Ok(())
    }

    async fn delete_expired(&self) -> StoreResult<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let now = Utc::now();
        let before = tokens.len();
        tokens.retain(|t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}
