use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_CONTENT_LENGTH: u64 = 4000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    #[validate(length(max = MAX_CONTENT_LENGTH))]
    pub content: String,
    #[validate(url)]
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartConversationRequest {
    pub participant_id: Uuid,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct ConversationQuery {
    /// Page size, at most 100. Omit to list every conversation.
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ConversationQuery {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit.map(i64::from),
            offset: self.offset.map(i64::from).unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct MessageQuery {
    /// Only messages strictly older than this instant.
    pub before: Option<DateTime<Utc>>,
    /// Newest `limit` messages, at most 100. Omit for the whole history.
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    pub limit: Option<u32>,
}

impl MessageQuery {
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            before: self.before,
            limit: self.limit.map(i64::from),
        }
    }
}

/// Offset paging over the conversation list. `limit: None` means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Keyset paging over a thread, newest first, returned oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCursor {
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_query_rejects_oversized_page() {
        let query = ConversationQuery {
            limit: Some(MAX_PAGE_SIZE + 1),
            offset: None,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_limits_accept_the_maximum() {
        let conversations = ConversationQuery {
            limit: Some(MAX_PAGE_SIZE),
            offset: Some(3),
        };
        assert!(conversations.validate().is_ok());

        let messages = MessageQuery {
            before: None,
            limit: Some(MAX_PAGE_SIZE),
        };
        assert!(messages.validate().is_ok());
        assert!(MessageQuery {
            before: None,
            limit: Some(0),
        }
        .validate()
        .is_err());

        let request = SendMessageRequest {
            content: "x".repeat(MAX_CONTENT_LENGTH as usize),
            attachment_url: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_conversation_query_defaults_to_everything() {
        let page = ConversationQuery::default().page();
        assert_eq!(page, Page { limit: None, offset: 0 });
    }

    #[test]
    fn test_send_message_request_rejects_bad_attachment_url() {
        let request = SendMessageRequest {
            content: "see photo".into(),
            attachment_url: Some("not a url".into()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_send_message_request_rejects_long_content() {
        let request = SendMessageRequest {
            content: "x".repeat(MAX_CONTENT_LENGTH as usize + 1),
            attachment_url: None,
        };
        assert!(request.validate().is_err());
    }
}
