use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    api::{ClientResult, MessagingApi},
    poller::Refresh,
};
use crate::message::{ConversationDetails, MessageResponse, ThreadResponse};

/// Cheap identity of a message list: its length and newest id.
///
/// Two lists with the same fingerprint are treated as unchanged, so an edit
/// that keeps both is not detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadFingerprint {
    count: usize,
    newest_id: Option<Uuid>,
}

impl ThreadFingerprint {
    pub fn of(messages: &[MessageResponse]) -> Self {
        Self {
            count: messages.len(),
            newest_id: messages.last().map(|m| m.id),
        }
    }
}

/// A send taken out of the input box and not yet confirmed.
#[derive(Debug)]
pub struct PendingSend {
    conversation_id: Uuid,
    text: String,
}

impl PendingSend {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send, or a send is already in flight.
    Ignored,
    Sent,
    Failed,
}

/// View state for one open conversation.
#[derive(Debug)]
pub struct ThreadView {
    conversation_id: Uuid,
    current_user_id: Option<Uuid>,
    conversation: Option<ConversationDetails>,
    messages: Vec<MessageResponse>,
    loaded: bool,
    input: String,
    sending: bool,
    error: Option<String>,
    revision: u64,
    scroll_pending: bool,
}

impl ThreadView {
    pub fn new(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            current_user_id: None,
            conversation: None,
            messages: Vec::new(),
            loaded: false,
            input: String::new(),
            sending: false,
            error: None,
            revision: 0,
            scroll_pending: false,
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn current_user_id(&self) -> Option<Uuid> {
        self.current_user_id
    }

    pub fn conversation(&self) -> Option<&ConversationDetails> {
        self.conversation.as_ref()
    }

    pub fn messages(&self) -> &[MessageResponse] {
        &self.messages
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        if !self.sending {
            self.input = text.into();
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn input_disabled(&self) -> bool {
        self.sending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Bumped every time the message list identity changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true once per change of the message list; the renderer then
    /// scrolls to the newest message.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    /// Commits a fetched thread if its message list differs from what is
    /// shown. Threads for another conversation are ignored.
    pub fn apply_thread(&mut self, thread: ThreadResponse) -> bool {
        if thread.conversation.id != self.conversation_id {
            return false;
        }

        self.current_user_id = Some(thread.current_user_id);
        self.conversation = Some(thread.conversation);

        if self.loaded && ThreadFingerprint::of(&thread.messages) == ThreadFingerprint::of(&self.messages) {
            return false;
        }

        self.messages = thread.messages;
        self.loaded = true;
        self.mark_changed();
        true
    }

    /// Clears the input and enters the sending state. `None` when the input is
    /// blank or a send is already in flight.
    pub fn begin_send(&mut self) -> Option<PendingSend> {
        if self.sending || self.input.trim().is_empty() {
            return None;
        }

        self.sending = true;
        self.error = None;
        Some(PendingSend {
            conversation_id: self.conversation_id,
            text: std::mem::take(&mut self.input),
        })
    }

    /// Settles a send: appends the confirmed message, or restores the text and
    /// records the error.
    pub fn finish_send(&mut self, pending: PendingSend, result: ClientResult<MessageResponse>) -> SubmitOutcome {
        self.sending = false;

        match result {
            Ok(message) => {
                let already_shown = self.messages.iter().any(|m| m.id == message.id);
                if message.conversation_id == self.conversation_id && !already_shown {
                    self.messages.push(message);
                    self.mark_changed();
                }
                SubmitOutcome::Sent
            }
            Err(e) => {
                self.input = pending.text;
                self.error = Some(e.to_string());
                SubmitOutcome::Failed
            }
        }
    }

    fn mark_changed(&mut self) {
        self.revision += 1;
        self.scroll_pending = true;
    }
}

/// Sends the view's current input through `api`, never holding the lock
/// across the call.
pub async fn submit(view: &Mutex<ThreadView>, api: &dyn MessagingApi) -> SubmitOutcome {
    let Some(pending) = view.lock().await.begin_send() else {
        return SubmitOutcome::Ignored;
    };

    let result = api.send_message(pending.conversation_id, &pending.text).await;
    if let Err(e) = &result {
        tracing::debug!("Send to conversation {} failed: {}", pending.conversation_id, e);
    }

    view.lock().await.finish_send(pending, result)
}

/// Thread-loop attempt: fetch the active conversation and commit on change.
pub struct ThreadRefresher {
    api: Arc<dyn MessagingApi>,
    view: Arc<Mutex<ThreadView>>,
    conversation_id: Uuid,
}

impl ThreadRefresher {
    pub fn new(api: Arc<dyn MessagingApi>, view: Arc<Mutex<ThreadView>>, conversation_id: Uuid) -> Self {
        Self {
            api,
            view,
            conversation_id,
        }
    }
}

#[async_trait]
impl Refresh for ThreadRefresher {
    async fn refresh(&mut self, cancel: &CancellationToken) -> ClientResult<()> {
        let thread = self.api.get_messages(self.conversation_id).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        if self.view.lock().await.apply_thread(thread) {
            tracing::trace!("Thread {} updated", self.conversation_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::api::ClientError,
        error::AppError,
        message::ParticipantProfile,
    };
    use chrono::Utc;

    fn details(conversation_id: Uuid) -> ConversationDetails {
        ConversationDetails {
            id: conversation_id,
            other_participant: ParticipantProfile::unknown(Uuid::new_v4()),
            product: None,
            last_message_at: Utc::now(),
        }
    }

    fn message(conversation_id: Uuid, text: &str) -> MessageResponse {
        MessageResponse {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            content: Some(text.to_string()),
            attachment_url: None,
            is_read: false,
            is_from_me: false,
            created_at: Utc::now(),
        }
    }

    fn thread(conversation_id: Uuid, messages: Vec<MessageResponse>) -> ThreadResponse {
        ThreadResponse {
            conversation: details(conversation_id),
            messages,
            current_user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_first_fetch_commits_even_when_empty() {
        let id = Uuid::new_v4();
        let mut view = ThreadView::new(id);

        assert!(view.apply_thread(thread(id, vec![])));
        assert!(view.is_loaded());
        assert!(view.take_scroll_request());
        assert!(!view.take_scroll_request());
    }

    #[test]
    fn test_same_fingerprint_is_not_recommitted() {
        let id = Uuid::new_v4();
        let mut view = ThreadView::new(id);
        let messages = vec![message(id, "a"), message(id, "b")];

        assert!(view.apply_thread(thread(id, messages.clone())));
        let revision = view.revision();
        assert!(!view.apply_thread(thread(id, messages)));
        assert_eq!(view.revision(), revision);
    }

    #[test]
    fn test_same_count_with_new_tail_is_committed() {
        let id = Uuid::new_v4();
        let mut view = ThreadView::new(id);
        let a = message(id, "a");
        let b = message(id, "b");
        let c = message(id, "c");

        view.apply_thread(thread(id, vec![a.clone(), b]));
        // b deleted and c added within one interval
        assert!(view.apply_thread(thread(id, vec![a, c.clone()])));
        assert_eq!(view.messages().last().map(|m| m.id), Some(c.id));
    }

    #[test]
    fn test_thread_for_other_conversation_is_ignored() {
        let mut view = ThreadView::new(Uuid::new_v4());
        let other = Uuid::new_v4();
        assert!(!view.apply_thread(thread(other, vec![message(other, "x")])));
        assert!(view.messages().is_empty());
        assert!(view.conversation().is_none());
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut view = ThreadView::new(Uuid::new_v4());
        view.set_input("   ");
        assert!(view.begin_send().is_none());
        assert!(!view.is_sending());
    }

    #[test]
    fn test_optimistic_send_success_appends_once() {
        let id = Uuid::new_v4();
        let mut view = ThreadView::new(id);
        view.apply_thread(thread(id, vec![]));
        view.take_scroll_request();

        view.set_input("Hello");
        let pending = view.begin_send().unwrap();
        assert_eq!(view.input(), "");
        assert!(view.input_disabled());
        assert!(view.begin_send().is_none(), "double submit is ignored");

        let confirmed = message(id, "Hello");
        assert_eq!(
            view.finish_send(pending, Ok(confirmed.clone())),
            SubmitOutcome::Sent
        );
        assert!(!view.is_sending());
        assert_eq!(view.messages().len(), 1);
        assert!(view.take_scroll_request());

        // A poll that already carries the message must not duplicate it.
        view.apply_thread(thread(id, vec![confirmed.clone()]));
        view.set_input("again");
        let pending = view.begin_send().unwrap();
        view.finish_send(pending, Ok(confirmed));
        assert_eq!(view.messages().len(), 1);
    }

    #[test]
    fn test_failed_send_restores_input_and_shows_error() {
        let id = Uuid::new_v4();
        let mut view = ThreadView::new(id);
        view.set_input("Is this still available?");
        let pending = view.begin_send().unwrap();

        let outcome = view.finish_send(
            pending,
            Err(ClientError::Service(AppError::NotAuthorized(
                "You are not a participant of this conversation".into(),
            ))),
        );

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(view.input(), "Is this still available?");
        assert!(view.error().unwrap().contains("not a participant"));
        assert!(view.messages().is_empty());
        assert!(!view.input_disabled());
    }

    #[test]
    fn test_input_is_locked_while_sending() {
        let mut view = ThreadView::new(Uuid::new_v4());
        view.set_input("first");
        let _pending = view.begin_send().unwrap();
        view.set_input("typed while sending");
        assert_eq!(view.input(), "");
    }
}
