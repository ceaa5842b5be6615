use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, Pool, QueryBuilder};
use std::collections::HashMap;

use super::interface::MessageStore;
use super::model::{
    Attachment, Conversation, ConversationOverview, Message, MessageView, NewMessage,
    DELETED_MESSAGE_TEXT,
};
use crate::modules::auth::interface::StoreResult;

const CONVERSATION_OVERVIEW_SELECT: &str = r#"
    SELECT c.id, c.coach_id, c.client_id, c.created_at, c.updated_at, c.last_message_at, c.is_archived,
           lm.message_text AS last_message_text,
           lm.sender_id AS last_message_sender_id,
           lm.created_at AS last_message_created_at,
           (SELECT COUNT(*) FROM messages mc
             WHERE mc.conversation_id = c.id AND mc.is_deleted = FALSE) AS message_count
    FROM conversations c
    LEFT JOIN messages lm ON lm.id = (
        SELECT m2.id FROM messages m2
        WHERE m2.conversation_id = c.id AND m2.is_deleted = FALSE
        ORDER BY m2.created_at DESC, m2.id DESC
        LIMIT 1
    )
"#;

const MESSAGE_VIEW_SELECT: &str = r#"
    SELECT m.id, m.conversation_id, m.sender_id, m.message_text, m.reply_to_id, m.is_deleted,
           m.created_at, m.edited_at, m.deleted_at,
           u.name AS sender_name, u.image AS sender_image,
           CAST((m.sender_id = ? OR rs.message_id IS NOT NULL) AS SIGNED) AS is_read
    FROM messages m
    JOIN users u ON u.id = m.sender_id
    LEFT JOIN message_read_status rs ON rs.message_id = m.id AND rs.user_id = ?
"#;

#[derive(FromRow)]
struct MessageViewRow {
    #[sqlx(flatten)]
    message: Message,
    sender_name: String,
    sender_image: Option<String>,
    is_read: i64,
}

impl MessageViewRow {
    fn into_view(self, attachments: Vec<Attachment>) -> MessageView {
        MessageView {
            message: self.message,
            sender_name: self.sender_name,
            sender_image: self.sender_image,
            is_read: self.is_read != 0,
            attachments,
        }
    }
}

pub struct MessageCrud {
    pool: Pool<MySql>,
}

impl MessageCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    async fn attachments_for(&self, message_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<Attachment>>> {
        let mut grouped: HashMap<i64, Vec<Attachment>> = HashMap::new();
        if message_ids.is_empty() {
            return Ok(grouped);
        }

        let mut query =
            QueryBuilder::<MySql>::new("SELECT * FROM message_attachments WHERE message_id IN (");
        let mut ids = query.separated(", ");
        for id in message_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") ORDER BY id");

        let rows = query
            .build_query_as::<Attachment>()
            .fetch_all(&self.pool)
            .await?;
        for attachment in rows {
            grouped.entry(attachment.message_id).or_default().push(attachment);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<MessageViewRow>) -> StoreResult<Vec<MessageView>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.message.id).collect();
        let mut attachments = self.attachments_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let files = attachments.remove(&row.message.id).unwrap_or_default();
                row.into_view(files)
            })
            .collect())
    }
}

#[async_trait]
impl MessageStore for MessageCrud {
    async fn create_conversation(&self, coach_id: &str, client_id: &str) -> StoreResult<Conversation> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (coach_id, client_id, created_at, updated_at, is_archived)
            VALUES (?, ?, ?, ?, FALSE)
            "#,
        )
        .bind(coach_id)
        .bind(client_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Conversation {
            id: result.last_insert_id() as i64,
            coach_id: coach_id.to_string(),
            client_id: client_id.to_string(),
            created_at: now,
            updated_at: now,
            last_message_at: None,
            is_archived: false,
        })
    }

    async fn get_conversation(&self, conversation_id: i64) -> StoreResult<Option<Conversation>> {
        Ok(
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = ?")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_conversation_by_participants(
        &self,
        coach_id: &str,
        client_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        Ok(sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE coach_id = ? AND client_id = ?",
        )
        .bind(coach_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_conversations_by_user(
        &self,
        user_id: &str,
        include_archived: bool,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<ConversationOverview>, i64)> {
        let sql = format!(
            r#"{}
            WHERE (c.coach_id = ? OR c.client_id = ?) AND (? OR c.is_archived = FALSE)
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC
            LIMIT ? OFFSET ?
            "#,
            CONVERSATION_OVERVIEW_SELECT
        );

        let rows = sqlx::query_as::<_, ConversationOverview>(&sql)
            .bind(user_id)
            .bind(user_id)
            .bind(include_archived)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM conversations
            WHERE (coach_id = ? OR client_id = ?) AND (? OR is_archived = FALSE)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(include_archived)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn set_archived(&self, conversation_id: i64, archived: bool) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE conversations SET is_archived = ?, updated_at = ? WHERE id = ?")
                .bind(archived)
                .bind(Utc::now())
                .bind(conversation_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_participant(&self, conversation_id: i64, user_id: &str) -> StoreResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM conversations
            WHERE id = ? AND (coach_id = ? OR client_id = ?)
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn create_message(&self, message: &NewMessage) -> StoreResult<Message> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, message_text, reply_to_id, is_deleted, created_at)
            VALUES (?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(message.conversation_id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(message.reply_to_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let message_id = result.last_insert_id() as i64;

        for attachment in &message.attachments {
            sqlx::query(
                r#"
                INSERT INTO message_attachments
                    (message_id, attachment_type, url, file_size, mime_type, metadata, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(message_id)
            .bind(&attachment.attachment_type)
            .bind(&attachment.url)
            .bind(attachment.file_size)
            .bind(&attachment.mime_type)
            .bind(&attachment.metadata)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE conversations SET last_message_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(message.conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Message {
            id: message_id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id.clone(),
            message_text: message.text.clone(),
            reply_to_id: message.reply_to_id,
            is_deleted: false,
            created_at: now,
            edited_at: None,
            deleted_at: None,
        })
    }

    async fn get_message(&self, message_id: i64) -> StoreResult<Option<Message>> {
        Ok(sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, message_text, reply_to_id, is_deleted,
                   created_at, edited_at, deleted_at
            FROM messages WHERE id = ?
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_message_view(&self, message_id: i64, viewer_id: &str) -> StoreResult<Option<MessageView>> {
        let sql = format!("{} WHERE m.id = ?", MESSAGE_VIEW_SELECT);
        let row = sqlx::query_as::<_, MessageViewRow>(&sql)
            .bind(viewer_id)
            .bind(viewer_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        viewer_id: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<MessageView>> {
        let sql = format!(
            r#"{}
            WHERE m.conversation_id = ? AND m.is_deleted = FALSE
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT ? OFFSET ?
            "#,
            MESSAGE_VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, MessageViewRow>(&sql)
            .bind(viewer_id)
            .bind(viewer_id)
            .bind(conversation_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    async fn update_message(&self, message_id: i64, text: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE messages SET message_text = ?, edited_at = ? WHERE id = ? AND is_deleted = FALSE",
        )
        .bind(text)
        .bind(Utc::now())
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_message(&self, message_id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_deleted = TRUE, deleted_at = ?, message_text = ?
            WHERE id = ? AND is_deleted = FALSE
            "#,
        )
        .bind(Utc::now())
        .bind(DELETED_MESSAGE_TEXT)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_message_as_read(&self, message_id: i64, user_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT IGNORE INTO message_read_status (message_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_as_read(&self, conversation_id: i64, user_id: &str) -> StoreResult<u64> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO message_read_status (message_id, user_id, read_at)
            SELECT m.id, ?, ? FROM messages m
            WHERE m.conversation_id = ? AND m.sender_id <> ? AND m.is_deleted = FALSE
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread_messages(&self, conversation_id: i64, user_id: &str) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages m
            LEFT JOIN message_read_status rs ON rs.message_id = m.id AND rs.user_id = ?
            WHERE m.conversation_id = ?
              AND m.sender_id <> ?
              AND m.is_deleted = FALSE
              AND rs.message_id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
