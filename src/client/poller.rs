use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::api::ClientResult;
use crate::{error::Result, state::parsed_or};

/// Whether the view the loops feed is currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub thread_interval: Duration,
    pub list_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            thread_interval: Duration::from_millis(3000),
            list_interval: Duration::from_millis(5000),
        }
    }
}

impl PollConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            thread_interval: Duration::from_millis(parsed_or("THREAD_POLL_INTERVAL_MS", 3000)?),
            list_interval: Duration::from_millis(parsed_or("LIST_POLL_INTERVAL_MS", 5000)?),
        })
    }
}

/// One polling attempt. Implementations must check `cancel` after any await
/// and leave view state untouched once it is cancelled.
#[async_trait]
pub trait Refresh: Send + 'static {
    async fn refresh(&mut self, cancel: &CancellationToken) -> ClientResult<()>;
}

/// Owned handle to a running poll loop. Dropping it cancels the loop.
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels the loop and waits for any in-flight attempt to settle.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Poll loop ended abnormally: {:?}", e);
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs `task` now and then again `interval` after each attempt finishes.
///
/// While `visibility` reads [`Visibility::Hidden`] attempts are skipped but
/// the loop keeps rescheduling. Errors are logged and retried next interval.
pub fn spawn_poll_loop<R: Refresh>(
    name: &'static str,
    interval: Duration,
    visibility: watch::Receiver<Visibility>,
    mut task: R,
) -> PollHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
        loop {
            let visible = *visibility.borrow() == Visibility::Visible;
            if visible {
                if let Err(e) = task.refresh(&token).await {
                    tracing::debug!("{} poll failed: {}", name, e);
                }
            } else {
                tracing::trace!("{} poll skipped while hidden", name);
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::debug!("{} poll loop stopped", name);
    });

    PollHandle {
        cancel,
        task: Some(handle),
    }
}
