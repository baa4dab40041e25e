//! Waiting for "task enqueued" notifications.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TaskId;

/// Source of enqueue notifications.
#[async_trait]
pub trait TaskWakeup: Send {
    /// Wait up to `timeout` for a notification. Returns the announced task
    /// id, or `None` on timeout or an unreadable payload.
    async fn wait(&mut self, timeout: Duration) -> AppResult<Option<TaskId>>;
}

/// PostgreSQL `LISTEN` on the worker channel.
#[derive(Debug)]
pub struct PgWakeup {
    listener: PgListener,
}

impl PgWakeup {
    /// Wrap a listener already subscribed to the channel.
    pub fn new(listener: PgListener) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl TaskWakeup for PgWakeup {
    async fn wait(&mut self, timeout: Duration) -> AppResult<Option<TaskId>> {
        match tokio::time::timeout(timeout, self.listener.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(notification)) => {
                let payload = notification.payload();
                debug!(payload, "Received task notification");
                match payload.parse::<TaskId>() {
                    Ok(id) => Ok(Some(id)),
                    Err(_) => {
                        warn!(payload, "Ignoring notification with an invalid task id");
                        Ok(None)
                    }
                }
            }
            Ok(Err(e)) => Err(AppError::database(format!("Notification listener failed: {e}"))),
        }
    }
}

/// Notifications broadcast by the in-memory task store.
#[derive(Debug)]
pub struct MemoryWakeup {
    receiver: broadcast::Receiver<TaskId>,
}

impl MemoryWakeup {
    pub fn new(receiver: broadcast::Receiver<TaskId>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl TaskWakeup for MemoryWakeup {
    async fn wait(&mut self, timeout: Duration) -> AppResult<Option<TaskId>> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(id)) => Ok(Some(id)),
            // Missed ids are still found by the next batch claim.
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => Ok(None),
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_wakeup() {
        let (sender, receiver) = broadcast::channel(4);
        let mut wakeup = MemoryWakeup::new(receiver);

        assert_eq!(wakeup.wait(Duration::from_secs(1)).await.unwrap(), None);

        let id = TaskId::new();
        sender.send(id).unwrap();
        assert_eq!(wakeup.wait(Duration::from_secs(1)).await.unwrap(), Some(id));
    }
}
