//! Client-side messaging: API bindings, polling loops and view state.

pub mod api;
pub mod conversation_list;
pub mod poller;
pub mod session;
pub mod thread_view;

pub use api::{ClientError, ClientResult, HttpMessagingClient, LocalMessagingClient, MessagingApi};
pub use conversation_list::{ConversationListView, ListRefresher};
pub use poller::{spawn_poll_loop, PollConfig, PollHandle, Refresh, Visibility};
pub use session::ChatSession;
pub use thread_view::{submit, PendingSend, SubmitOutcome, ThreadFingerprint, ThreadRefresher, ThreadView};
