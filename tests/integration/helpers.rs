//! Shared test helpers for integration tests.

use std::sync::Arc;

use tempfile::TempDir;

use memberhub_core::config::AppConfig;
use memberhub_core::traits::StorageProvider;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::Stores;
use memberhub_database::store::memory::MemoryTaskStore;
use memberhub_service::{DocumentService, TenantService};
use memberhub_worker::bootstrap::builtin_registry;
use memberhub_worker::{TaskHandler, WorkerRunner, WorkerServices};

/// Test application context
pub struct TestApp {
    /// Loaded configuration
    pub config: AppConfig,
    /// In-memory stores
    pub stores: Stores,
    /// The concrete task store, for inspecting every task
    pub tasks: Arc<MemoryTaskStore>,
    /// Blob store below the temporary directory
    pub blobs: Arc<dyn StorageProvider>,
    pub tenants: TenantService,
    pub documents: Arc<DocumentService>,
    pub worker: WorkerServices,
    dir: TempDir,
}

impl TestApp {
    /// Create a new test application with the built-in tasks
    pub async fn new() -> Self {
        Self::build(Vec::new(), false).await
    }

    /// Create a test application with extra task handlers
    pub async fn with_handlers(handlers: Vec<Arc<dyn TaskHandler>>) -> Self {
        Self::build(handlers, false).await
    }

    /// Create a test application that runs tasks inline on enqueue
    pub async fn sync(handlers: Vec<Arc<dyn TaskHandler>>) -> Self {
        Self::build(handlers, true).await
    }

    async fn build(handlers: Vec<Arc<dyn TaskHandler>>, sync: bool) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = dir.path().display().to_string();
        std::fs::write(
            dir.path().join("default.toml"),
            format!(
                r#"
[database]
url = "postgres://localhost/memberhub_test"

[storage]
root_path = "{root}/media"
max_upload_size_bytes = 1048576

[worker]
batch_size = 5
run_tasks_sync = {sync}

[theme]
npm_command = "memberhub-missing-npm"
source_dir = "{root}/static_src"
output_dir = "{root}/theme"

[logging]
echo_task_logs = false
"#
            ),
        )
        .expect("write config");
        let config = AppConfig::load_from(&root, "test").expect("config should load");

        let (stores, tasks) = Stores::memory();
        let blobs = memberhub_storage::from_config(&config.storage)
            .await
            .expect("blob store");
        let documents = Arc::new(DocumentService::new(
            stores.nodes.clone(),
            blobs.clone(),
            config.storage.clone(),
        ));

        let mut registry =
            builtin_registry(&config, stores.themes.clone(), documents.clone()).expect("registry");
        for handler in handlers {
            registry.register(handler).expect("register handler");
        }
        let worker = WorkerServices::assemble(
            &config,
            registry,
            stores.nodes.clone(),
            stores.tasks.clone(),
            stores.tenants.clone(),
        );

        Self {
            config,
            tenants: TenantService::new(stores.tenants.clone()),
            stores,
            tasks,
            blobs,
            documents,
            worker,
            dir,
        }
    }

    /// Create a tenant and return its context
    pub async fn tenant(&self, schema: &str) -> TenantContext {
        let tenant = self
            .tenants
            .create(schema, &schema.to_uppercase())
            .await
            .expect("create tenant");
        tenant.context().expect("tenant context")
    }

    /// A runner with a fixed worker id
    pub fn runner(&self, worker_id: &str) -> WorkerRunner {
        self.worker.runner().with_worker_id(worker_id)
    }

    /// Path below the temporary directory
    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.dir.path().join(relative)
    }
}
