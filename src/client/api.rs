use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AppError,
    message::{
        ConversationSummary, MessageCursor, MessageResponse, MessageService, Page,
        SendMessageRequest, ThreadResponse, UnreadCountResponse,
    },
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Service(#[from] AppError),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// The messaging operations a client view needs, bound to one signed-in user.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn list_conversations(&self) -> ClientResult<Vec<ConversationSummary>>;

    async fn get_messages(&self, conversation_id: Uuid) -> ClientResult<ThreadResponse>;

    async fn send_message(&self, conversation_id: Uuid, content: &str) -> ClientResult<MessageResponse>;

    async fn get_unread_count(&self) -> ClientResult<i64>;
}

/// Calls [`MessageService`] in-process as `user_id`.
#[derive(Clone)]
pub struct LocalMessagingClient {
    service: MessageService,
    user_id: Uuid,
}

impl LocalMessagingClient {
    pub fn new(service: MessageService, user_id: Uuid) -> Self {
        Self { service, user_id }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

#[async_trait]
impl MessagingApi for LocalMessagingClient {
    async fn list_conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        Ok(self
            .service
            .list_conversations(self.user_id, Page::default())
            .await?)
    }

    async fn get_messages(&self, conversation_id: Uuid) -> ClientResult<ThreadResponse> {
        Ok(self
            .service
            .get_messages(self.user_id, conversation_id, MessageCursor::default())
            .await?)
    }

    async fn send_message(&self, conversation_id: Uuid, content: &str) -> ClientResult<MessageResponse> {
        Ok(self
            .service
            .send_message(self.user_id, conversation_id, content, None)
            .await?)
    }

    async fn get_unread_count(&self) -> ClientResult<i64> {
        Ok(self.service.get_unread_count(self.user_id).await?)
    }
}

/// Talks to the HTTP surface with a bearer token.
#[derive(Clone)]
pub struct HttpMessagingClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpMessagingClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error")?.as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl MessagingApi for HttpMessagingClient {
    async fn list_conversations(&self) -> ClientResult<Vec<ConversationSummary>> {
        let response = self
            .http
            .get(self.url("/conversations"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_messages(&self, conversation_id: Uuid) -> ClientResult<ThreadResponse> {
        let response = self
            .http
            .get(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn send_message(&self, conversation_id: Uuid, content: &str) -> ClientResult<MessageResponse> {
        let body = SendMessageRequest {
            content: content.to_string(),
            attachment_url: None,
        };
        let response = self
            .http
            .post(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_unread_count(&self) -> ClientResult<i64> {
        let response = self
            .http
            .get(self.url("/messages/unread-count"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let unread: UnreadCountResponse = Self::decode(response).await?;
        Ok(unread.count)
    }
}
