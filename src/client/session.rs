use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::{
    api::MessagingApi,
    conversation_list::{ConversationListView, ListRefresher},
    poller::{spawn_poll_loop, PollConfig, PollHandle, Visibility},
    thread_view::{submit, SubmitOutcome, ThreadRefresher, ThreadView},
};

struct ActiveThread {
    view: Arc<Mutex<ThreadView>>,
    poll: PollHandle,
}

/// Client-side messaging session for one signed-in user.
///
/// The list loop runs for the whole session; at most one thread loop runs,
/// for the selected conversation. Must be created inside a tokio runtime.
pub struct ChatSession {
    api: Arc<dyn MessagingApi>,
    config: PollConfig,
    visibility: watch::Sender<Visibility>,
    list: Arc<Mutex<ConversationListView>>,
    list_poll: PollHandle,
    thread: Option<ActiveThread>,
}

impl ChatSession {
    pub fn start(api: Arc<dyn MessagingApi>, config: PollConfig) -> Self {
        let (visibility, _) = watch::channel(Visibility::Visible);
        let list = Arc::new(Mutex::new(ConversationListView::new()));

        let list_poll = spawn_poll_loop(
            "conversation list",
            config.list_interval,
            visibility.subscribe(),
            ListRefresher::new(api.clone(), list.clone()),
        );

        Self {
            api,
            config,
            visibility,
            list,
            list_poll,
            thread: None,
        }
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_replace(visibility);
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.borrow()
    }

    pub fn conversation_list(&self) -> Arc<Mutex<ConversationListView>> {
        self.list.clone()
    }

    pub fn active_thread(&self) -> Option<Arc<Mutex<ThreadView>>> {
        self.thread.as_ref().map(|t| t.view.clone())
    }

    /// Opens `conversation_id`, cancelling the previous thread loop. Selecting
    /// the already open conversation keeps its loop and view.
    pub async fn select_conversation(&mut self, conversation_id: Uuid) -> Arc<Mutex<ThreadView>> {
        if let Some(active) = &self.thread {
            if active.view.lock().await.conversation_id() == conversation_id {
                return active.view.clone();
            }
        }

        self.close_thread();

        let view = Arc::new(Mutex::new(ThreadView::new(conversation_id)));
        let poll = spawn_poll_loop(
            "thread",
            self.config.thread_interval,
            self.visibility.subscribe(),
            ThreadRefresher::new(self.api.clone(), view.clone(), conversation_id),
        );
        tracing::debug!("Opened conversation {}", conversation_id);

        self.thread = Some(ActiveThread {
            view: view.clone(),
            poll,
        });
        view
    }

    pub fn close_thread(&mut self) {
        if let Some(active) = self.thread.take() {
            active.poll.cancel();
        }
    }

    /// Sends `text` from the open conversation's input box.
    pub async fn send(&self, text: &str) -> SubmitOutcome {
        let Some(active) = &self.thread else {
            return SubmitOutcome::Ignored;
        };

        active.view.lock().await.set_input(text);
        submit(&active.view, self.api.as_ref()).await
    }

    /// Cancels every loop and waits for in-flight attempts to settle.
    pub async fn shutdown(self) {
        let ChatSession {
            list_poll, thread, ..
        } = self;
        if let Some(active) = thread {
            active.poll.stop().await;
        }
        list_poll.stop().await;
    }
}
