//! Task executor: runs one claimed task and records its outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::instrument::WithSubscriber;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::{TaskStore, TenantStore};
use memberhub_entity::task::{Task, TaskArgs, TaskStatus};

use crate::capture::LogCapture;
use crate::context::TaskContext;
use crate::registry::{TaskHandler, TaskRegistry};
use crate::resolver::ResolverSet;

/// Dispatches claimed tasks to their handlers.
#[derive(Debug)]
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    resolvers: ResolverSet,
    tasks: Arc<dyn TaskStore>,
    tenants: Arc<dyn TenantStore>,
    echo: Option<String>,
}

enum Outcome {
    Finished,
    Failed(anyhow::Error),
    Panicked(String),
}

impl TaskExecutor {
    /// Create a new executor.
    pub fn new(
        registry: Arc<TaskRegistry>,
        resolvers: ResolverSet,
        tasks: Arc<dyn TaskStore>,
        tenants: Arc<dyn TenantStore>,
    ) -> Self {
        Self {
            registry,
            resolvers,
            tasks,
            tenants,
            echo: None,
        }
    }

    /// Also write task log events matching `directives` to stdout. Invalid
    /// directives leave the echo off.
    pub fn with_echo(mut self, directives: impl Into<String>) -> Self {
        let directives = directives.into();
        match EnvFilter::try_new(&directives) {
            Ok(_) => self.echo = Some(directives),
            Err(e) => {
                warn!(directives = %directives, error = %e, "Invalid log directives, task logs are not echoed");
                self.echo = None;
            }
        }
        self
    }

    /// The registry this executor dispatches through.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Execute a claimed task and record its outcome.
    ///
    /// Handler failures and panics become the exception status; only store
    /// errors are returned.
    pub async fn execute(&self, task: &Task) -> AppResult<TaskStatus> {
        let Some(handler) = self.registry.get(&task.name) else {
            warn!(task_id = %task.id, name = %task.name, "No handler registered for task");
            let output = format!("Unknown task '{}'", task.name);
            self.record(task, TaskStatus::UnknownTask, &output).await?;
            return Ok(TaskStatus::UnknownTask);
        };

        let capture = LogCapture::new();
        // Directives were checked in `with_echo`.
        let echo = self
            .echo
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok());

        let outcome = async {
            let span = info_span!("task", task_id = %task.id, name = %task.name);
            self.run_handler(handler, task).instrument(span).await
        }
        .with_subscriber(capture.dispatch(echo))
        .await;

        let mut output = capture.output();
        let status = match outcome {
            Outcome::Finished => TaskStatus::Completed,
            Outcome::Failed(err) => {
                output.push_str(&format!("\n\nTask failed with exception: {err:?}"));
                TaskStatus::Exception
            }
            Outcome::Panicked(message) => {
                output.push_str(&format!("\n\nTask panicked: {message}"));
                TaskStatus::Exception
            }
        };

        self.record(task, status, &output).await?;
        info!(task_id = %task.id, name = %task.name, status = %status, "Task finished");
        Ok(status)
    }

    async fn run_handler(&self, handler: Arc<dyn TaskHandler>, task: &Task) -> Outcome {
        let ctx = match self.prepare(task).await {
            Ok(ctx) => ctx,
            Err(err) => {
                error!("Could not prepare task: {err}");
                return Outcome::Failed(anyhow::Error::new(err).context("Preparing task arguments"));
            }
        };

        match AssertUnwindSafe(handler.run(&ctx)).catch_unwind().await {
            Ok(Ok(())) => Outcome::Finished,
            Ok(Err(err)) => Outcome::Failed(err),
            Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Restore the tenant and rehydrate the arguments.
    async fn prepare(&self, task: &Task) -> AppResult<TaskContext> {
        let tenant = self.tenant_for(task).await?;
        let args = TaskArgs::decode(&task.args, &task.kwargs)?;
        let (args, kwargs) = self.resolvers.resolve_all(tenant.as_ref(), args).await?;
        Ok(TaskContext {
            task_id: task.id,
            name: task.name.clone(),
            tenant,
            args,
            kwargs,
        })
    }

    async fn tenant_for(&self, task: &Task) -> AppResult<Option<TenantContext>> {
        let Some(tenant_id) = task.tenant_id else {
            return Ok(None);
        };
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Tenant {tenant_id} not found")))?;
        Ok(Some(tenant.context()?))
    }

    async fn record(&self, task: &Task, status: TaskStatus, output: &str) -> AppResult<()> {
        if !self.tasks.record_outcome(task.id, status, output).await? {
            warn!(task_id = %task.id, "Task outcome was already recorded");
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
