//! Task repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TaskId;
use memberhub_entity::task::{NewTask, Task, TaskStatus};

use crate::store::TaskStore;

/// Repository for the shared `tasks` queue table.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    /// Create a new task repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for TaskRepository {
    async fn enqueue(&self, task: NewTask, channel: &str) -> AppResult<Task> {
        let task = task.into_task();
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (id, name, args, kwargs, status, output, tenant_id, created_at) \
             VALUES ($1, $2, $3, $4, 'queued', '', $5, $6) RETURNING *",
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(&task.args)
        .bind(&task.kwargs)
        .bind(task.tenant_id)
        .bind(task.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create task", e))?;

        // Delivered on commit, so listeners never see an id before its row.
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(task.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to notify workers", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit task", e)
        })?;
        Ok(task)
    }

    async fn claim_batch(&self, worker_id: &str, limit: u32) -> AppResult<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "UPDATE tasks SET picked_up_at = NOW(), worker_id = $1 \
             WHERE id IN ( \
                SELECT id FROM tasks \
                WHERE status = 'queued' AND picked_up_at IS NULL \
                ORDER BY created_at ASC \
                LIMIT $2 \
                FOR UPDATE SKIP LOCKED \
             ) RETURNING *",
        )
        .bind(worker_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim tasks", e))?;

        // RETURNING does not preserve the subquery order.
        let mut tasks = tasks;
        tasks.sort_by_key(|t| t.created_at);
        debug!(worker_id, claimed = tasks.len(), "Claimed task batch");
        Ok(tasks)
    }

    async fn claim_by_id(&self, id: TaskId, worker_id: &str) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>(
            "UPDATE tasks SET picked_up_at = NOW(), worker_id = $2 \
             WHERE id = ( \
                SELECT id FROM tasks \
                WHERE id = $1 AND status = 'queued' AND picked_up_at IS NULL \
                FOR UPDATE SKIP LOCKED \
             ) RETURNING *",
        )
        .bind(id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim task", e))
    }

    async fn record_outcome(&self, id: TaskId, status: TaskStatus, output: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, output = $3, completed_at = NOW() \
             WHERE id = $1 AND status = 'queued'",
        )
        .bind(id)
        .bind(status)
        .bind(output)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record task outcome", e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: TaskId) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find task", e))
    }

    async fn list_recent(&self, status: Option<TaskStatus>, limit: u32) -> AppResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE ($1::task_status IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(status)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tasks", e))
    }

    async fn count_by_status(&self) -> AppResult<Vec<(TaskStatus, u64)>> {
        let rows: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status ORDER BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count tasks", e)
                })?;
        Ok(rows.into_iter().map(|(s, n)| (s, n as u64)).collect())
    }

    async fn requeue_stale(
        &self,
        claimed_before: DateTime<Utc>,
        worker_id: Option<&str>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET picked_up_at = NULL, worker_id = NULL \
             WHERE status = 'queued' AND picked_up_at < $1 \
             AND ($2::text IS NULL OR worker_id = $2)",
        )
        .bind(claimed_before)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to release stale claims", e)
        })?;
        Ok(result.rows_affected())
    }
}
