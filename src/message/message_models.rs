use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub product_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// The participant that is not `user_id`. Only meaningful for participants.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.participant_a == user_id {
            self.participant_b
        } else {
            self.participant_a
        }
    }

    /// Whether this conversation is keyed by the given pair and product,
    /// regardless of participant order.
    pub fn matches_key(&self, a: Uuid, b: Uuid, product_id: Option<Uuid>) -> bool {
        self.product_id == product_id
            && ((self.participant_a == a && self.participant_b == b)
                || (self.participant_a == b && self.participant_b == a))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A message as seen by one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub is_read: bool,
    pub is_from_me: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageResponse {
    pub fn for_viewer(message: Message, viewer_id: Uuid) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            is_from_me: message.sender_id == viewer_id,
            sender_id: message.sender_id,
            content: message.content,
            attachment_url: message.attachment_url,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ParticipantProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ParticipantProfile {
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProductSnippet {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LastMessage {
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_from_me: bool,
    pub is_read: bool,
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_participant: ParticipantProfile,
    pub product: Option<ProductSnippet>,
    pub last_message_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationDetails {
    pub id: Uuid,
    pub other_participant: ParticipantProfile,
    pub product: Option<ProductSnippet>,
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThreadResponse {
    pub conversation: ConversationDetails,
    pub messages: Vec<MessageResponse>,
    pub current_user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(a: Uuid, b: Uuid, product_id: Option<Uuid>) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: Uuid::new_v4(),
            participant_a: a,
            participant_b: b,
            product_id,
            last_message_at: now,
            created_at: now,
        }
    }

    #[test]
    fn test_other_participant() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = conversation(a, b, None);
        assert_eq!(c.other_participant(a), b);
        assert_eq!(c.other_participant(b), a);
        assert!(c.has_participant(a));
        assert!(!c.has_participant(Uuid::new_v4()));
    }

    #[test]
    fn test_matches_key_ignores_participant_order() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let c = conversation(a, b, Some(p));
        assert!(c.matches_key(b, a, Some(p)));
        assert!(!c.matches_key(a, b, None));
    }

    #[test]
    fn test_message_response_marks_own_messages() {
        let sender = Uuid::new_v4();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: sender,
            content: Some("hi".into()),
            attachment_url: None,
            is_read: false,
            created_at: Utc::now(),
        };
        assert!(MessageResponse::for_viewer(message.clone(), sender).is_from_me);
        assert!(!MessageResponse::for_viewer(message, Uuid::new_v4()).is_from_me);
    }
}
