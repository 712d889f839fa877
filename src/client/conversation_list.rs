use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    api::{ClientResult, MessagingApi},
    poller::Refresh,
};
use crate::message::ConversationSummary;

/// Conversation list and unread badge for the signed-in user.
#[derive(Debug, Default)]
pub struct ConversationListView {
    conversations: Vec<ConversationSummary>,
    unread_total: i64,
    loaded: bool,
    revision: u64,
}

impl ConversationListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn find(&self, conversation_id: Uuid) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn unread_total(&self) -> i64 {
        self.unread_total
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the list. The revision only moves when the rows changed.
    pub fn set_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        if self.loaded && self.conversations == conversations {
            return;
        }
        self.conversations = conversations;
        self.loaded = true;
        self.revision += 1;
    }

    pub fn set_unread_total(&mut self, unread_total: i64) {
        if self.unread_total == unread_total {
            return;
        }
        self.unread_total = unread_total;
        self.revision += 1;
    }
}

/// List-loop attempt: conversation summaries plus the unread badge.
pub struct ListRefresher {
    api: Arc<dyn MessagingApi>,
    view: Arc<Mutex<ConversationListView>>,
}

impl ListRefresher {
    pub fn new(api: Arc<dyn MessagingApi>, view: Arc<Mutex<ConversationListView>>) -> Self {
        Self { api, view }
    }
}

#[async_trait]
impl Refresh for ListRefresher {
    /// The list and the badge commit independently; a failure of one does
    /// not discard the other.
    async fn refresh(&mut self, cancel: &CancellationToken) -> ClientResult<()> {
        let conversations = self.api.list_conversations().await;
        let unread = self.api.get_unread_count().await;
        if cancel.is_cancelled() {
            return Ok(());
        }

        let mut view = self.view.lock().await;
        let conversations = conversations.map(|rows| view.set_conversations(rows));
        let unread = unread.map(|count| view.set_unread_total(count));
        conversations.and(unread)
    }
}
