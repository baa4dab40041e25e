//! Task registry: the explicit map from task names to handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;

use crate::context::TaskContext;

/// Trait for task handler implementations.
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug {
    /// Name tasks are enqueued under.
    fn name(&self) -> &str;

    /// Run the task. An error ends the task with the exception status and
    /// its cause chain appended to the output.
    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()>;
}

/// Registered task handlers by name.
///
/// Built once at startup and shared between the queue, which rejects unknown
/// names, and the executor, which dispatches by name.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. A second handler under the same name is a
    /// configuration error.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> AppResult<()> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(AppError::configuration(format!(
                "A task handler named '{name}' is already registered"
            )));
        }
        info!(task = %name, "Registered task handler");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Builder-style [`TaskRegistry::register`].
    pub fn with(mut self, handler: Arc<dyn TaskHandler>) -> AppResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Look up the handler for a task name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Check if a handler is registered for a name.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
