//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background task worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of tasks claimed per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// First poll delay in seconds after an empty batch.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_seconds: u64,
    /// Ceiling for the doubling poll delay in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    /// PostgreSQL NOTIFY channel used to wake idle workers.
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
    /// Execute tasks inline right after enqueueing (development only).
    #[serde(default)]
    pub run_tasks_sync: bool,
    /// Claims older than this many seconds without an outcome count as stale.
    #[serde(default = "default_stale_after")]
    pub stale_claim_seconds: u64,
}

impl WorkerConfig {
    /// Initial backoff as a [`Duration`].
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_seconds)
    }

    /// Backoff ceiling as a [`Duration`].
    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            initial_backoff_seconds: default_initial_backoff(),
            max_backoff_seconds: default_max_backoff(),
            notify_channel: default_notify_channel(),
            run_tasks_sync: false,
            stale_claim_seconds: default_stale_after(),
        }
    }
}

fn default_batch_size() -> u32 {
    10
}

fn default_initial_backoff() -> u64 {
    1
}

fn default_max_backoff() -> u64 {
    4
}

fn default_notify_channel() -> String {
    "worker_task".to_string()
}

fn default_stale_after() -> u64 {
    3600
}
