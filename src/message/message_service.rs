use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};

use super::{
    message_dto::{MessageCursor, Page},
    message_models::{
        Conversation, ConversationDetails, ConversationSummary, MessageResponse,
        ParticipantProfile, ThreadResponse,
    },
    message_store::MessageStore,
};

/// Conversation and message operations on behalf of an authenticated user.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn MessageStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub async fn list_conversations(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<ConversationSummary>> {
        self.store.list_summaries(user_id, page).await
    }

    /// Returns the thread and, as a side effect, marks the other party's
    /// unread messages in the returned page as read. Messages outside the
    /// page are left untouched. The returned messages reflect the state
    /// before marking.
    pub async fn get_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        cursor: MessageCursor,
    ) -> Result<ThreadResponse> {
        let conversation = self.participant_conversation(user_id, conversation_id).await?;
        let conversation = self.details(&conversation, user_id).await?;

        let messages: Vec<MessageResponse> = self
            .store
            .list_messages(conversation_id, cursor)
            .await?
            .into_iter()
            .map(|m| MessageResponse::for_viewer(m, user_id))
            .collect();

        let unread: Vec<Uuid> = messages
            .iter()
            .filter(|m| !m.is_from_me && !m.is_read)
            .map(|m| m.id)
            .collect();
        if !unread.is_empty() {
            match self
                .store
                .mark_messages_read(conversation_id, user_id, &unread)
                .await
            {
                Ok(0) => {}
                Ok(flipped) => tracing::debug!(
                    "Marked {} message(s) read in conversation {} for {}",
                    flipped,
                    conversation_id,
                    user_id
                ),
                Err(e) => tracing::warn!(
                    "Failed to mark conversation {} read for {}: {:?}",
                    conversation_id,
                    user_id,
                    e
                ),
            }
        }

        Ok(ThreadResponse {
            conversation,
            messages,
            current_user_id: user_id,
        })
    }

    pub async fn send_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        content: &str,
        attachment_url: Option<&str>,
    ) -> Result<MessageResponse> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message content cannot be empty".into()));
        }

        self.participant_conversation(user_id, conversation_id).await?;

        let message = self
            .store
            .insert_message(conversation_id, user_id, content, attachment_url)
            .await?;

        tracing::debug!(
            "User {} sent message {} to conversation {}",
            user_id,
            message.id,
            conversation_id
        );

        Ok(MessageResponse::for_viewer(message, user_id))
    }

    pub async fn get_unread_count(&self, user_id: Uuid) -> Result<i64> {
        self.store.count_unread(user_id).await
    }

    /// Finds or creates the conversation between `user_id` and
    /// `other_user_id` about `product_id`.
    pub async fn start_conversation(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<ConversationDetails> {
        if user_id == other_user_id {
            return Err(AppError::Validation(
                "Cannot start a conversation with yourself".into(),
            ));
        }

        self.store
            .find_profile(other_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if let Some(product_id) = product_id {
            self.store
                .find_product(product_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
        }

        let conversation = match self
            .store
            .find_conversation_by_key(user_id, other_user_id, product_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let created = self
                    .store
                    .create_conversation(user_id, other_user_id, product_id)
                    .await?;
                tracing::info!("Conversation {} started by {}", created.id, user_id);
                created
            }
        };

        self.details(&conversation, user_id).await
    }

    pub async fn mark_message_read(&self, user_id: Uuid, message_id: Uuid) -> Result<()> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

        self.participant_conversation(user_id, message.conversation_id)
            .await?;

        self.store.mark_message_read(message_id, user_id).await?;
        Ok(())
    }

    async fn participant_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Conversation> {
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".into()))?;

        if !conversation.has_participant(user_id) {
            return Err(AppError::NotAuthorized(
                "You are not a participant of this conversation".into(),
            ));
        }

        Ok(conversation)
    }

    async fn details(&self, conversation: &Conversation, viewer_id: Uuid) -> Result<ConversationDetails> {
        let other_id = conversation.other_participant(viewer_id);
        let other_participant = self
            .store
            .find_profile(other_id)
            .await?
            .unwrap_or_else(|| ParticipantProfile::unknown(other_id));

        let product = match conversation.product_id {
            Some(product_id) => self.store.find_product(product_id).await?,
            None => None,
        };

        Ok(ConversationDetails {
            id: conversation.id,
            other_participant,
            product,
            last_message_at: conversation.last_message_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::memory_store::InMemoryMessageStore;

    struct Fixture {
        service: MessageService,
        store: InMemoryMessageStore,
        u1: Uuid,
        u2: Uuid,
        u3: Uuid,
        c1: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryMessageStore::new();
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for (id, name) in [(u1, "Alice"), (u2, "Bob"), (u3, "Mallory")] {
            store.add_user(ParticipantProfile {
                id,
                name: Some(name.to_string()),
                avatar_url: None,
            });
        }
        let c1 = store.create_conversation(u1, u2, None).await.unwrap().id;
        let service = MessageService::new(Arc::new(store.clone()));
        Fixture {
            service,
            store,
            u1,
            u2,
            u3,
            c1,
        }
    }

    async fn message_count(f: &Fixture) -> usize {
        f.store
            .list_messages(f.c1, MessageCursor::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_hello_scenario() {
        let f = fixture().await;

        let sent = f.service.send_message(f.u1, f.c1, "Hello", None).await.unwrap();
        assert_eq!(sent.content.as_deref(), Some("Hello"));
        assert!(!sent.is_read);
        assert!(sent.is_from_me);

        assert_eq!(f.service.get_unread_count(f.u2).await.unwrap(), 1);

        let thread = f
            .service
            .get_messages(f.u2, f.c1, MessageCursor::default())
            .await
            .unwrap();
        assert_eq!(thread.current_user_id, f.u2);
        assert_eq!(thread.messages.len(), 1);
        assert!(!thread.messages[0].is_from_me);
        assert_eq!(thread.conversation.other_participant.name.as_deref(), Some("Alice"));

        let stored = f.store.find_message(sent.id).await.unwrap().unwrap();
        assert!(stored.is_read);
        assert_eq!(f.service.get_unread_count(f.u2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_marking_is_monotonic() {
        let f = fixture().await;
        let sent = f.service.send_message(f.u1, f.c1, "ping", None).await.unwrap();

        for _ in 0..3 {
            f.service
                .get_messages(f.u2, f.c1, MessageCursor::default())
                .await
                .unwrap();
            assert!(f.store.find_message(sent.id).await.unwrap().unwrap().is_read);
        }
        assert_eq!(
            f.store
                .mark_messages_read(f.c1, f.u2, &[sent.id])
                .await
                .unwrap(),
            0,
            "nothing left to flip"
        );
    }

    #[tokio::test]
    async fn test_older_page_does_not_mark_newer_messages() {
        let f = fixture().await;
        let old = f.service.send_message(f.u1, f.c1, "old", None).await.unwrap();
        let newest = f.service.send_message(f.u1, f.c1, "newest", None).await.unwrap();

        let page = f
            .service
            .get_messages(
                f.u2,
                f.c1,
                MessageCursor {
                    before: Some(newest.created_at),
                    limit: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            page.messages.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![old.id]
        );

        assert!(f.store.find_message(old.id).await.unwrap().unwrap().is_read);
        assert!(!f.store.find_message(newest.id).await.unwrap().unwrap().is_read);
        assert_eq!(f.service.get_unread_count(f.u2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_conversations_are_listed_and_oldest_is_reused() {
        let f = fixture().await;
        let seeded = f.store.find_conversation(f.c1).await.unwrap().unwrap();
        let duplicate = Conversation {
            id: Uuid::new_v4(),
            created_at: seeded.created_at + chrono::Duration::seconds(1),
            last_message_at: seeded.last_message_at + chrono::Duration::seconds(1),
            ..seeded.clone()
        };
        f.store.insert_conversation(duplicate.clone()).await;

        let list = f.service.list_conversations(f.u1, Page::default()).await.unwrap();
        assert_eq!(
            list.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![duplicate.id, seeded.id]
        );

        let reused = f.service.start_conversation(f.u2, f.u1, None).await.unwrap();
        assert_eq!(reused.id, seeded.id);
    }

    #[tokio::test]
    async fn test_sender_viewing_does_not_mark_own_messages() {
        let f = fixture().await;
        let sent = f.service.send_message(f.u1, f.c1, "mine", None).await.unwrap();

        f.service
            .get_messages(f.u1, f.c1, MessageCursor::default())
            .await
            .unwrap();

        assert!(!f.store.find_message(sent.id).await.unwrap().unwrap().is_read);
        assert_eq!(f.service.get_unread_count(f.u2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_message_is_rejected_without_mutation() {
        let f = fixture().await;
        let before = f.store.find_conversation(f.c1).await.unwrap().unwrap();

        let err = f.service.send_message(f.u1, f.c1, "   ", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(message_count(&f).await, 0);
        let after = f.store.find_conversation(f.c1).await.unwrap().unwrap();
        assert_eq!(before.last_message_at, after.last_message_at);
    }

    #[tokio::test]
    async fn test_non_participant_cannot_send_or_read() {
        let f = fixture().await;

        let err = f.service.send_message(f.u3, f.c1, "hi", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));
        assert_eq!(message_count(&f).await, 0);

        let err = f
            .service
            .get_messages(f.u3, f.c1, MessageCursor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .get_messages(f.u1, Uuid::new_v4(), MessageCursor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_own_sends_never_raise_own_unread_count() {
        let f = fixture().await;
        f.service.send_message(f.u2, f.c1, "from bob", None).await.unwrap();
        let before = f.service.get_unread_count(f.u1).await.unwrap();

        f.service.send_message(f.u1, f.c1, "from alice", None).await.unwrap();
        f.service.send_message(f.u1, f.c1, "again", None).await.unwrap();

        assert_eq!(f.service.get_unread_count(f.u1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_content_is_trimmed_and_attachment_kept() {
        let f = fixture().await;
        let sent = f
            .service
            .send_message(f.u1, f.c1, "  look  ", Some("https://cdn.example.com/a.jpg"))
            .await
            .unwrap();
        assert_eq!(sent.content.as_deref(), Some("look"));
        assert_eq!(sent.attachment_url.as_deref(), Some("https://cdn.example.com/a.jpg"));
    }

    #[tokio::test]
    async fn test_list_conversations_is_ordered_by_last_message() {
        let f = fixture().await;
        let c2 = f.store.create_conversation(f.u1, f.u3, None).await.unwrap().id;

        f.service.send_message(f.u1, f.c1, "first", None).await.unwrap();
        f.service.send_message(f.u3, c2, "second", None).await.unwrap();

        let list = f.service.list_conversations(f.u1, Page::default()).await.unwrap();
        assert_eq!(list.iter().map(|c| c.id).collect::<Vec<_>>(), vec![c2, f.c1]);
        assert!(list
            .windows(2)
            .all(|w| w[0].last_message_at >= w[1].last_message_at));

        let newest = &list[0];
        assert_eq!(newest.unread_count, 1);
        let last = newest.last_message.as_ref().unwrap();
        assert_eq!(last.content.as_deref(), Some("second"));
        assert!(!last.is_from_me);
        assert_eq!(newest.other_participant.name.as_deref(), Some("Mallory"));
    }

    #[tokio::test]
    async fn test_start_conversation_reuses_existing() {
        let f = fixture().await;

        let again = f.service.start_conversation(f.u2, f.u1, None).await.unwrap();
        assert_eq!(again.id, f.c1);

        let fresh = f.service.start_conversation(f.u1, f.u3, None).await.unwrap();
        assert_ne!(fresh.id, f.c1);
        assert_eq!(fresh.other_participant.id, f.u3);
    }

    #[tokio::test]
    async fn test_start_conversation_validates_parties() {
        let f = fixture().await;

        let err = f.service.start_conversation(f.u1, f.u1, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = f
            .service
            .start_conversation(f.u1, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = f
            .service
            .start_conversation(f.u1, f.u2, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_message_read() {
        let f = fixture().await;
        let sent = f.service.send_message(f.u1, f.c1, "read me", None).await.unwrap();

        let err = f.service.mark_message_read(f.u3, sent.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));

        f.service.mark_message_read(f.u1, sent.id).await.unwrap();
        assert!(!f.store.find_message(sent.id).await.unwrap().unwrap().is_read);

        f.service.mark_message_read(f.u2, sent.id).await.unwrap();
        assert!(f.store.find_message(sent.id).await.unwrap().unwrap().is_read);
    }
}
