use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::{
    message_dto::{MessageCursor, Page},
    message_models::{Conversation, ConversationSummary, Message, ParticipantProfile, ProductSnippet},
};

/// Persistence for conversations and their messages.
///
/// Implementations must apply `insert_message` atomically: the new row and
/// the conversation's `last_message_at` bump are observed together or not at
/// all. Read marking only ever flips `is_read` from false to true.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>>;

    /// Looks up the conversation for an unordered participant pair and product.
    async fn find_conversation_by_key(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Option<Conversation>>;

    /// Creates the conversation, or returns the existing one for the same key.
    async fn create_conversation(
        &self,
        participant_a: Uuid,
        participant_b: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Conversation>;

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<ParticipantProfile>>;

    async fn find_product(&self, product_id: Uuid) -> Result<Option<ProductSnippet>>;

    /// Conversations involving `user_id`, newest `last_message_at` first.
    async fn list_summaries(&self, user_id: Uuid, page: Page) -> Result<Vec<ConversationSummary>>;

    /// Messages of one conversation in ascending `created_at` order.
    async fn list_messages(&self, conversation_id: Uuid, cursor: MessageCursor) -> Result<Vec<Message>>;

    async fn find_message(&self, message_id: Uuid) -> Result<Option<Message>>;

    async fn insert_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachment_url: Option<&str>,
    ) -> Result<Message>;

    /// Marks the listed messages of the conversation read, skipping any sent
    /// by `reader_id`. Returns how many rows flipped.
    async fn mark_messages_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<u64>;

    /// Marks one message read unless `reader_id` sent it. Returns rows flipped.
    async fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<u64>;

    async fn count_unread(&self, user_id: Uuid) -> Result<i64>;
}
