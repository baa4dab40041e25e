//! Worker runner: the claim/execute/wait loop.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use memberhub_core::config::WorkerConfig;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::TaskId;
use memberhub_database::TaskStore;

use crate::backoff::Backoff;
use crate::executor::TaskExecutor;
use crate::wakeup::TaskWakeup;

/// Long-running worker processing the shared queue.
///
/// Several runners, in one process or many, can work the same queue: claims
/// skip rows another runner holds, so each task is executed once.
#[derive(Debug)]
pub struct WorkerRunner {
    store: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    worker_id: String,
}

impl WorkerRunner {
    /// Create a new runner with a generated worker id.
    pub fn new(store: Arc<dyn TaskStore>, executor: Arc<TaskExecutor>, config: WorkerConfig) -> Self {
        let worker_id = format!(
            "worker-{}-{}",
            std::process::id(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        Self {
            store,
            executor,
            config,
            worker_id,
        }
    }

    /// Override the generated worker id.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run until `cancel` turns true or its sender is dropped.
    ///
    /// A claimed batch is always finished before shutting down, so no claim
    /// is left behind. Claims held by other workers are never touched;
    /// releasing a dead worker's claims is an admin action
    /// ([`crate::TaskQueue::requeue_stale`]).
    pub async fn run<W: TaskWakeup>(
        &self,
        mut wakeup: W,
        mut cancel: watch::Receiver<bool>,
    ) -> AppResult<()> {
        info!(
            worker_id = %self.worker_id,
            batch_size = self.config.batch_size,
            "Worker started"
        );

        let mut backoff = Backoff::new(self.config.initial_backoff(), self.config.max_backoff());
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.run_batch().await {
                Ok(0) => {}
                Ok(_) => {
                    backoff.reset();
                    continue;
                }
                Err(e) => error!(error = %e, "Failed to claim tasks"),
            }

            let delay = backoff.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Waiting for tasks");
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                woken = wakeup.wait(delay) => match woken {
                    Ok(Some(id)) => {
                        if self.run_notified(id).await {
                            backoff.reset();
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Waiting for task notifications failed"),
                },
            }
        }

        info!(worker_id = %self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim one batch and execute it in order. Returns the batch size.
    pub async fn run_batch(&self) -> AppResult<usize> {
        let batch = self
            .store
            .claim_batch(&self.worker_id, self.config.batch_size)
            .await?;
        for task in &batch {
            if let Err(e) = self.executor.execute(task).await {
                error!(task_id = %task.id, error = %e, "Failed to record task outcome");
            }
        }
        Ok(batch.len())
    }

    /// Claim and execute the task named in a notification, unless another
    /// worker got it first.
    async fn run_notified(&self, id: TaskId) -> bool {
        match self.store.claim_by_id(id, &self.worker_id).await {
            Ok(Some(task)) => {
                if let Err(e) = self.executor.execute(&task).await {
                    error!(task_id = %id, error = %e, "Failed to record task outcome");
                }
                true
            }
            Ok(None) => {
                debug!(task_id = %id, "Notified task already claimed");
                false
            }
            Err(e) => {
                error!(task_id = %id, error = %e, "Failed to claim notified task");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use memberhub_database::store::memory::{MemoryTaskStore, MemoryTenantStore};
    use memberhub_entity::task::{NewTask, TaskStatus};

    use crate::context::TaskContext;
    use crate::registry::{TaskHandler, TaskRegistry};
    use crate::resolver::ResolverSet;
    use crate::wakeup::MemoryWakeup;

    #[derive(Debug, Default)]
    struct Counts {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl TaskHandler for Counts {
        fn name(&self) -> &str {
            "count"
        }

        async fn run(&self, _ctx: &TaskContext) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup() -> (Arc<MemoryTaskStore>, Arc<Counts>, Arc<TaskExecutor>) {
        let store = Arc::new(MemoryTaskStore::new());
        let counts = Arc::new(Counts::default());
        let registry = Arc::new(TaskRegistry::new().with(counts.clone()).unwrap());
        let executor = Arc::new(TaskExecutor::new(
            registry,
            ResolverSet::new(),
            store.clone(),
            Arc::new(MemoryTenantStore::new()),
        ));
        (store, counts, executor)
    }

    fn count_task() -> NewTask {
        NewTask {
            name: "count".into(),
            args: serde_json::json!([]),
            kwargs: serde_json::json!({}),
            tenant_id: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_share_a_task() {
        let (store, _, _) = setup();
        for _ in 0..10 {
            store.enqueue(count_task(), "worker_task").await.unwrap();
        }

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.claim_batch("a", 10).await }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.claim_batch("b", 10).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        let mut ids: Vec<TaskId> = a.iter().chain(&b).map(|t| t.id).collect();
        assert_eq!(ids.len(), 10);
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn test_runners_split_the_queue() {
        let (store, counts, executor) = setup();
        for _ in 0..10 {
            store.enqueue(count_task(), "worker_task").await.unwrap();
        }
        let config = WorkerConfig {
            batch_size: 3,
            ..WorkerConfig::default()
        };
        let a = WorkerRunner::new(store.clone(), executor.clone(), config.clone()).with_worker_id("a");
        let b = WorkerRunner::new(store.clone(), executor, config).with_worker_id("b");

        while a.run_batch().await.unwrap() + b.run_batch().await.unwrap() > 0 {}

        assert_eq!(counts.runs.load(Ordering::SeqCst), 10);
        let tasks = store.all().await;
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert!(tasks.iter().any(|t| t.worker_id.as_deref() == Some("a")));
        assert!(tasks.iter().any(|t| t.worker_id.as_deref() == Some("b")));
    }

    #[tokio::test]
    async fn test_notification_wakes_idle_runner() {
        let (store, counts, executor) = setup();
        let runner = WorkerRunner::new(store.clone(), executor, WorkerConfig::default());
        let wakeup = MemoryWakeup::new(store.subscribe());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { runner.run(wakeup, cancel_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let task = store.enqueue(count_task(), "worker_task").await.unwrap();

        let mut done = false;
        for _ in 0..100 {
            let stored = store.find_by_id(task.id).await.unwrap().unwrap();
            if stored.status == TaskStatus::Completed {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(done, "notified task was not executed in time");
        assert_eq!(counts.runs.load(Ordering::SeqCst), 1);

        cancel_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_starting_runner_leaves_other_claims_alone() {
        let (store, counts, executor) = setup();
        let task = store.enqueue(count_task(), "worker_task").await.unwrap();
        store.claim_by_id(task.id, "busy").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let config = WorkerConfig {
            stale_claim_seconds: 0,
            ..WorkerConfig::default()
        };
        let runner = WorkerRunner::new(store.clone(), executor, config);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let wakeup = MemoryWakeup::new(store.subscribe());
        let handle = tokio::spawn(async move { runner.run(wakeup, cancel_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(counts.runs.load(Ordering::SeqCst), 0);
        let stored = store.find_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);
        assert_eq!(stored.worker_id.as_deref(), Some("busy"));
    }
}
