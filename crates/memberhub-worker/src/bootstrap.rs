//! Wiring the registry, executor and queue from configuration.

use std::sync::Arc;

use memberhub_core::config::AppConfig;
use memberhub_core::result::AppResult;
use memberhub_database::{NodeStore, Stores, TaskStore, TenantStore, ThemeVersionStore};
use memberhub_service::DocumentService;

use crate::executor::TaskExecutor;
use crate::queue::TaskQueue;
use crate::registry::TaskRegistry;
use crate::resolver::{NodeResolver, ResolverSet};
use crate::runner::WorkerRunner;
use crate::tasks::{RebuildTheme, SweepOrphanedBlobs};

/// Registry holding the built-in tasks.
pub fn builtin_registry(
    config: &AppConfig,
    themes: Arc<dyn ThemeVersionStore>,
    documents: Arc<DocumentService>,
) -> AppResult<TaskRegistry> {
    TaskRegistry::new()
        .with(Arc::new(RebuildTheme::new(config.theme.clone(), themes)))?
        .with(Arc::new(SweepOrphanedBlobs::new(documents)))
}

/// The task-processing components sharing one registry.
#[derive(Debug, Clone)]
pub struct WorkerServices {
    pub registry: Arc<TaskRegistry>,
    pub executor: Arc<TaskExecutor>,
    pub queue: TaskQueue,
    pub tasks: Arc<dyn TaskStore>,
    config: AppConfig,
}

impl WorkerServices {
    /// Assemble the executor and queue around a finished registry.
    ///
    /// With `worker.run_tasks_sync` the queue executes every task inline.
    pub fn assemble(
        config: &AppConfig,
        registry: TaskRegistry,
        nodes: Arc<dyn NodeStore>,
        tasks: Arc<dyn TaskStore>,
        tenants: Arc<dyn TenantStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let resolvers = ResolverSet::new().with(Arc::new(NodeResolver::new(nodes)));
        let mut executor = TaskExecutor::new(registry.clone(), resolvers, tasks.clone(), tenants);
        if config.logging.echo_task_logs {
            executor = executor.with_echo(config.logging.level.clone());
        }
        let executor = Arc::new(executor);

        let mut queue = TaskQueue::new(tasks.clone(), registry.clone(), &config.worker);
        if config.worker.run_tasks_sync {
            queue = queue.with_sync_executor(executor.clone());
        }

        Self {
            registry,
            executor,
            queue,
            tasks,
            config: config.clone(),
        }
    }

    /// Built-in tasks over a set of stores.
    pub fn from_stores(
        config: &AppConfig,
        stores: &Stores,
        documents: Arc<DocumentService>,
    ) -> AppResult<Self> {
        let registry = builtin_registry(config, stores.themes.clone(), documents)?;
        Ok(Self::assemble(
            config,
            registry,
            stores.nodes.clone(),
            stores.tasks.clone(),
            stores.tenants.clone(),
        ))
    }

    /// A runner working this queue.
    pub fn runner(&self) -> WorkerRunner {
        WorkerRunner::new(self.tasks.clone(), self.executor.clone(), self.config.worker.clone())
    }
}
