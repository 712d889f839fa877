use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
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

/// Process-local [`MessageStore`] used by tests and local development.
///
/// The user and product directories stand in for the marketplace tables the
/// messaging subsystem only reads from.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    users: Arc<DashMap<Uuid, ParticipantProfile>>,
    products: Arc<DashMap<Uuid, ProductSnippet>>,
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// Strictly increasing timestamps keep insertion order and time order equal.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    /// Earliest created conversation for the key; duplicates may predate
    /// the uniqueness guard.
    fn oldest_by_key(&self, a: Uuid, b: Uuid, product_id: Option<Uuid>) -> Option<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| c.matches_key(a, b, product_id))
            .min_by_key(|c| c.created_at)
    }

    fn conversation_mut(&mut self, id: Uuid) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, profile: ParticipantProfile) {
        self.users.insert(profile.id, profile);
    }

    pub fn add_product(&self, product: ProductSnippet) {
        self.products.insert(product.id, product);
    }

    /// Inserts a conversation with a fixed id, bypassing the key check.
    pub async fn insert_conversation(&self, conversation: Conversation) {
        self.tables.write().await.conversations.push(conversation);
    }

    fn profile_or_unknown(&self, user_id: Uuid) -> ParticipantProfile {
        self.users
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| ParticipantProfile::unknown(user_id))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned())
    }

    async fn find_conversation_by_key(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .oldest_by_key(participant_a, participant_b, product_id)
            .cloned())
    }

    async fn create_conversation(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Conversation> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.oldest_by_key(participant_a, participant_b, product_id) {
            return Ok(existing.clone());
        }

        let now = tables.next_timestamp();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            participant_a,
            participant_b,
            product_id,
            last_message_at: now,
            created_at: now,
        };
        tables.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<ParticipantProfile>> {
        Ok(self.users.get(&user_id).map(|p| p.value().clone()))
    }

    async fn find_product(&self, product_id: Uuid) -> Result<Option<ProductSnippet>> {
        Ok(self.products.get(&product_id).map(|p| p.value().clone()))
    }

    async fn list_summaries(&self, user_id: Uuid, page: Page) -> Result<Vec<ConversationSummary>> {
        let tables = self.tables.read().await;

        let mut conversations: Vec<&Conversation> = tables
            .conversations
            .iter()
            .filter(|c| c.has_participant(user_id))
            .collect();
        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = page
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        let summaries = conversations
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|c| {
                let thread = tables.messages.iter().filter(|m| m.conversation_id == c.id);
                let last_message = thread.clone().last().map(|m| LastMessage {
                    content: m.content.clone(),
                    attachment_url: m.attachment_url.clone(),
                    created_at: m.created_at,
                    is_from_me: m.sender_id == user_id,
                    is_read: m.is_read,
                });
                let unread_count = thread
                    .filter(|m| m.sender_id != user_id && !m.is_read)
                    .count() as i64;

                ConversationSummary {
                    id: c.id,
                    other_participant: self.profile_or_unknown(c.other_participant(user_id)),
                    product: c
                        .product_id
                        .and_then(|id| self.products.get(&id).map(|p| p.value().clone())),
                    last_message_at: c.last_message_at,
                    last_message,
                    unread_count,
                }
            })
            .collect();

        Ok(summaries)
    }

    async fn list_messages(&self, conversation_id: Uuid, cursor: MessageCursor) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;

        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| cursor.before.map_or(true, |before| m.created_at < before))
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);

        if let Some(limit) = cursor.limit.and_then(|l| usize::try_from(l).ok()) {
            let skip = messages.len().saturating_sub(limit);
            messages.drain(..skip);
        }

        Ok(messages)
    }

    async fn find_message(&self, message_id: Uuid) -> Result<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message> {
        let mut tables = self.tables.write().await;
        let created_at = tables.next_timestamp();

        let conversation = tables
            .conversation_mut(conversation_id)
            .ok_or_else(|| crate::error::AppError::NotFound("Conversation not found".into()))?;
        conversation.last_message_at = conversation.last_message_at.max(created_at);

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: Some(content.to_string()),
            attachment_url: attachment_url.map(str::to_string),
            is_read: false,
            created_at,
        };
        tables.messages.push(message.clone());

        Ok(message)
    }

    async fn mark_messages_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut flipped = 0;
        for message in tables.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id
                && m.sender_id != reader_id
                && !m.is_read
                && message_ids.contains(&m.id)
        }) {
            message.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        match tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.sender_id != reader_id && !m.is_read)
        {
            Some(message) => {
                message.is_read = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .messages
            .iter()
            .filter(|m| m.sender_id != user_id && !m.is_read)
            .filter(|m| {
                tables
                    .conversations
                    .iter()
                    .any(|c| c.id == m.conversation_id && c.has_participant(user_id))
            })
            .count();
        Ok(count as i64)
    }
}
