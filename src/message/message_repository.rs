use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;

use super::{
    message_dto::{MessageCursor, Page},
    message_models::{
        Conversation, ConversationSummary, LastMessage, Message, ParticipantProfile,
        ProductSnippet,
    },
    message_store::MessageStore,
};

/// PostgreSQL-backed [`MessageStore`].
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConversationSummaryRow {
    id: Uuid,
    last_message_at: DateTime<Utc>,
    other_id: Uuid,
    other_name: Option<String>,
    other_avatar_url: Option<String>,
    product_id: Option<Uuid>,
    product_title: Option<String>,
    product_image_url: Option<String>,
    product_price: Option<f64>,
    last_content: Option<String>,
    last_attachment_url: Option<String>,
    last_created_at: Option<DateTime<Utc>>,
    last_sender_id: Option<Uuid>,
    last_is_read: Option<bool>,
    unread_count: i64,
}

impl ConversationSummaryRow {
    fn into_summary(self, viewer_id: Uuid) -> ConversationSummary {
        let product = match (self.product_id, self.product_title) {
            (Some(id), Some(title)) => Some(ProductSnippet {
                id,
                title,
                image_url: self.product_image_url,
                price: self.product_price.unwrap_or_default(),
            }),
            _ => None,
        };

        let last_message = match (self.last_created_at, self.last_sender_id) {
            (Some(created_at), Some(sender_id)) => Some(LastMessage {
                content: self.last_content,
                attachment_url: self.last_attachment_url,
                created_at,
                is_from_me: sender_id == viewer_id,
                is_read: self.last_is_read.unwrap_or(false),
            }),
            _ => None,
        };

        ConversationSummary {
            id: self.id,
            other_participant: ParticipantProfile {
                id: self.other_id,
                name: self.other_name,
                avatar_url: self.other_avatar_url,
            },
            product,
            last_message_at: self.last_message_at,
            last_message,
            unread_count: self.unread_count,
        }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn find_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(conversation)
    }

    async fn find_conversation_by_key(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations
             WHERE ((participant_a = $1 AND participant_b = $2)
                 OR (participant_a = $2 AND participant_b = $1))
               AND product_id IS NOT DISTINCT FROM $3
             ORDER BY created_at
             LIMIT 1",
        )
        .bind(participant_a)
        .bind(participant_b)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn create_conversation(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Conversation> {
        let created = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (participant_a, participant_b, product_id)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING
             RETURNING *",
        )
        .bind(participant_a)
        .bind(participant_b)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(conversation) = created {
            return Ok(conversation);
        }

        // Lost a race against a concurrent insert of the same key.
        self.find_conversation_by_key(participant_a, participant_b, product_id)
            .await?
            .ok_or(crate::error::AppError::InternalError)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<ParticipantProfile>> {
        let profile = sqlx::query_as::<_, ParticipantProfile>(
            "SELECT id, name, avatar_url FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<ProductSnippet>> {
        let product = sqlx::query_as::<_, ProductSnippet>(
            "SELECT id, title, image_url, price FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list_summaries(&self, user_id: Uuid, page: Page) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationSummaryRow>(
            "SELECT
                c.id,
                c.last_message_at,
                other.id AS other_id,
                u.name AS other_name,
                u.avatar_url AS other_avatar_url,
                p.id AS product_id,
                p.title AS product_title,
                p.image_url AS product_image_url,
                p.price AS product_price,
                lm.content AS last_content,
                lm.attachment_url AS last_attachment_url,
                lm.created_at AS last_created_at,
                lm.sender_id AS last_sender_id,
                lm.is_read AS last_is_read,
                (
                    SELECT COUNT(*) FROM messages m
                    WHERE m.conversation_id = c.id
                      AND m.sender_id <> $1
                      AND m.is_read = false
                ) AS unread_count
            FROM conversations c
            CROSS JOIN LATERAL (
                SELECT CASE WHEN c.participant_a = $1 THEN c.participant_b ELSE c.participant_a END AS id
            ) other
            LEFT JOIN users u ON u.id = other.id
            LEFT JOIN products p ON p.id = c.product_id
            LEFT JOIN LATERAL (
                SELECT content, attachment_url, created_at, sender_id, is_read
                FROM messages
                WHERE conversation_id = c.id
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            ) lm ON true
            WHERE c.participant_a = $1 OR c.participant_b = $1
            ORDER BY c.last_message_at DESC, c.id
            LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_summary(user_id))
            .collect())
    }

    async fn list_messages(&self, conversation_id: Uuid, cursor: MessageCursor) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM (
                SELECT * FROM messages
                WHERE conversation_id = $1
                  AND ($2::timestamptz IS NULL OR created_at < $2)
                ORDER BY created_at DESC, id DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .bind(cursor.before)
        .bind(cursor.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn find_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    async fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (conversation_id, sender_id, content, attachment_url)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .bind(attachment_url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations
             SET last_message_at = GREATEST(last_message_at, $2)
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(message)
    }

    async fn mark_messages_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE messages
             SET is_read = true
             WHERE conversation_id = $1
               AND sender_id <> $2
               AND is_read = false
               AND id = ANY($3)",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(message_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET is_read = true
             WHERE id = $1 AND sender_id <> $2 AND is_read = false",
        )
        .bind(message_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE (c.participant_a = $1 OR c.participant_b = $1)
               AND m.sender_id <> $1
               AND m.is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
