//! Task entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use memberhub_core::types::id::{TaskId, TenantId};

use super::status::TaskStatus;

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Registered handler name (e.g. `"rebuild_theme"`).
    pub name: String,
    /// Encoded positional arguments (JSON array).
    pub args: serde_json::Value,
    /// Encoded keyword arguments (JSON object).
    pub kwargs: serde_json::Value,
    /// Current status.
    pub status: TaskStatus,
    /// Captured log output of the run.
    pub output: String,
    /// Tenant the task runs for (None when the tenant was deleted).
    pub tenant_id: Option<TenantId>,
    /// When the task was enqueued.
    pub created_at: DateTime<Utc>,
    /// When a worker claimed the task.
    pub picked_up_at: Option<DateTime<Utc>>,
    /// When the outcome was recorded.
    pub completed_at: Option<DateTime<Utc>>,
    /// Identifier of the claiming worker.
    pub worker_id: Option<String>,
}

impl Task {
    /// Whether a worker has claimed the task.
    pub fn is_claimed(&self) -> bool {
        self.picked_up_at.is_some()
    }

    /// Time between claim and outcome, if both happened.
    pub fn run_duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.picked_up_at?)
    }
}

/// Data required to enqueue a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    /// Handler name.
    pub name: String,
    /// Encoded positional arguments.
    pub args: serde_json::Value,
    /// Encoded keyword arguments.
    pub kwargs: serde_json::Value,
    /// Tenant the task runs for.
    pub tenant_id: Option<TenantId>,
}

impl NewTask {
    /// Materialize a queued task row.
    pub fn into_task(self) -> Task {
        Task {
            id: TaskId::new(),
            name: self.name,
            args: self.args,
            kwargs: self.kwargs,
            status: TaskStatus::Queued,
            output: String::new(),
            tenant_id: self.tenant_id,
            created_at: Utc::now(),
            picked_up_at: None,
            completed_at: None,
            worker_id: None,
        }
    }
}
