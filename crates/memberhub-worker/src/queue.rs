//! Task queue: the enqueue side and queue inspection.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use memberhub_core::config::WorkerConfig;
use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TaskId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::TaskStore;
use memberhub_entity::task::{NewTask, Task, TaskArgs, TaskStatus};

use crate::executor::TaskExecutor;
use crate::registry::TaskRegistry;

/// Worker id recorded for tasks executed inline.
const SYNC_WORKER_ID: &str = "sync";

/// Enqueues tasks and answers questions about the queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    store: Arc<dyn TaskStore>,
    registry: Arc<TaskRegistry>,
    channel: String,
    sync_executor: Option<Arc<TaskExecutor>>,
}

impl TaskQueue {
    /// Create a new task queue.
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<TaskRegistry>, config: &WorkerConfig) -> Self {
        Self {
            store,
            registry,
            channel: config.notify_channel.clone(),
            sync_executor: None,
        }
    }

    /// Run every task inline right after enqueueing it.
    pub fn with_sync_executor(mut self, executor: Arc<TaskExecutor>) -> Self {
        self.sync_executor = Some(executor);
        self
    }

    /// Enqueue a task for a tenant (or for none).
    ///
    /// Unknown names are rejected before anything is stored. Listening
    /// workers are notified with the new task's id once the row is committed.
    pub async fn enqueue(
        &self,
        tenant: Option<&TenantContext>,
        name: &str,
        args: TaskArgs,
    ) -> AppResult<Task> {
        if !self.registry.contains(name) {
            return Err(AppError::unknown_task(name));
        }

        let (args, kwargs) = args.encode();
        let task = self
            .store
            .enqueue(
                NewTask {
                    name: name.to_string(),
                    args,
                    kwargs,
                    tenant_id: tenant.map(|t| t.tenant_id),
                },
                &self.channel,
            )
            .await?;
        info!(
            task_id = %task.id,
            name,
            tenant = tenant.map(|t| t.schema.as_str()),
            "Task enqueued"
        );

        let Some(executor) = &self.sync_executor else {
            return Ok(task);
        };
        match self.store.claim_by_id(task.id, SYNC_WORKER_ID).await? {
            Some(claimed) => {
                executor.execute(&claimed).await?;
            }
            None => debug!(task_id = %task.id, "Task was claimed by a worker first"),
        }
        self.find(task.id).await
    }

    /// Fetch a task by id.
    pub async fn find(&self, id: TaskId) -> AppResult<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Task {id} not found")))
    }

    /// Most recent tasks, optionally filtered by status.
    pub async fn recent(&self, status: Option<TaskStatus>, limit: u32) -> AppResult<Vec<Task>> {
        self.store.list_recent(status, limit).await
    }

    /// Number of tasks per status.
    pub async fn counts(&self) -> AppResult<Vec<(TaskStatus, u64)>> {
        self.store.count_by_status().await
    }

    /// Release claims older than `age` that never got an outcome, only those
    /// of `worker_id` when given.
    ///
    /// A claim held by a worker that is still running its task looks the
    /// same as an abandoned one; releasing it lets the task run twice.
    pub async fn requeue_stale(
        &self,
        age: std::time::Duration,
        worker_id: Option<&str>,
    ) -> AppResult<u64> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| AppError::validation(format!("Invalid stale claim age: {e}")))?;
        let released = self.store.requeue_stale(Utc::now() - age, worker_id).await?;
        if released > 0 {
            info!(released, worker_id = ?worker_id, "Released stale task claims");
        }
        Ok(released)
    }

    /// Registered task names.
    pub fn task_names(&self) -> Vec<&str> {
        self.registry.names()
    }
}
