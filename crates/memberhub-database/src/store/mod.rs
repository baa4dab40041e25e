//! Store traits consumed by the service and worker crates.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`] and
//! an in-memory implementation in [`memory`] that behaves the same way,
//! including the live-sibling uniqueness rule and skip-locked claiming.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use memberhub_core::result::AppResult;
use memberhub_core::types::id::{NodeId, TaskId, TenantId};
use memberhub_core::types::tenant::{SchemaName, TenantContext};
use memberhub_entity::node::{FileNode, NodeEntry};
use memberhub_entity::task::{NewTask, Task, TaskStatus};
use memberhub_entity::tenant::{CreateTenant, Tenant};
use memberhub_entity::theme::ThemeVersion;

use crate::repositories::{NodeRepository, TaskRepository, TenantRepository, ThemeVersionRepository};
use crate::tenant_scope::TenantScope;

/// Validates a relocation given the node, the destination directory and the
/// destination's ancestors.
pub type MoveCheck = dyn Fn(&FileNode, Option<&FileNode>, &[FileNode]) -> AppResult<()> + Send + Sync;

/// Persistence of a tenant's document tree.
#[async_trait]
pub trait NodeStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch a node by id.
    async fn get(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Option<FileNode>>;

    /// Insert a new node. A live sibling with the same name yields
    /// `ErrorKind::NameCollision`.
    async fn insert(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()>;

    /// Persist the name and trash mark of an existing node. The parent is
    /// only changed through [`NodeStore::relocate`]. A live sibling with the
    /// same name yields `ErrorKind::NameCollision`.
    async fn save(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()>;

    /// Re-parent `id` below `destination` (top level for `None`) and clear
    /// its trash mark, returning the moved node.
    ///
    /// Relocations within a tenant run one at a time. `check` sees the node,
    /// the destination and the destination's ancestors (nearest first) as
    /// they are when the update is applied, and can reject the move.
    async fn relocate(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: Option<NodeId>,
        check: &MoveCheck,
    ) -> AppResult<FileNode>;

    /// Delete a node; its descendants go with it. Returns whether a row was
    /// removed.
    async fn delete(&self, tenant: &TenantContext, id: NodeId) -> AppResult<bool>;

    /// Direct children of `parent` (top level for `None`), with live child
    /// counts for directories. Trashed children are included on request.
    async fn children(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        include_trashed: bool,
    ) -> AppResult<Vec<NodeEntry>>;

    /// Every node carrying its own trash mark.
    async fn trashed(&self, tenant: &TenantContext) -> AppResult<Vec<NodeEntry>>;

    /// Strict ancestors of a node, nearest first. Stops at a repeated node.
    async fn ancestors(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<FileNode>>;

    /// The live child of `parent` named `name`, if any.
    async fn live_child_named(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
    ) -> AppResult<Option<FileNode>>;

    /// Ids of the file nodes in the subtree rooted at `id` (inclusive).
    async fn subtree_file_ids(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<NodeId>>;

    /// Ids of every file node of the tenant.
    async fn all_file_ids(&self, tenant: &TenantContext) -> AppResult<Vec<NodeId>>;
}

/// Persistence of the shared task queue.
#[async_trait]
pub trait TaskStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a queued task and notify listeners on `channel` with its id,
    /// atomically with the insert.
    async fn enqueue(&self, task: NewTask, channel: &str) -> AppResult<Task>;

    /// Claim up to `limit` unclaimed queued tasks, oldest first, skipping
    /// rows locked by other claimers.
    async fn claim_batch(&self, worker_id: &str, limit: u32) -> AppResult<Vec<Task>>;

    /// Claim one specific task if it is still queued and unclaimed.
    async fn claim_by_id(&self, id: TaskId, worker_id: &str) -> AppResult<Option<Task>>;

    /// Record the outcome of a queued task. Returns false when the task had
    /// already left the queued status.
    async fn record_outcome(&self, id: TaskId, status: TaskStatus, output: &str) -> AppResult<bool>;

    /// Fetch a task by id.
    async fn find_by_id(&self, id: TaskId) -> AppResult<Option<Task>>;

    /// Most recent tasks, optionally filtered by status.
    async fn list_recent(&self, status: Option<TaskStatus>, limit: u32) -> AppResult<Vec<Task>>;

    /// Number of tasks per status.
    async fn count_by_status(&self) -> AppResult<Vec<(TaskStatus, u64)>>;

    /// Release claims taken before `claimed_before` that never recorded an
    /// outcome, limited to `worker_id` when given. Returns the number of
    /// released tasks.
    async fn requeue_stale(
        &self,
        claimed_before: DateTime<Utc>,
        worker_id: Option<&str>,
    ) -> AppResult<u64>;
}

/// Persistence of tenants and their schemas.
#[async_trait]
pub trait TenantStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create a tenant and provision its schema.
    async fn create(&self, data: CreateTenant) -> AppResult<Tenant>;

    /// Fetch a tenant by id.
    async fn find_by_id(&self, id: TenantId) -> AppResult<Option<Tenant>>;

    /// Fetch a tenant by schema name.
    async fn find_by_schema(&self, schema: &SchemaName) -> AppResult<Option<Tenant>>;

    /// All tenants, oldest first.
    async fn list(&self) -> AppResult<Vec<Tenant>>;
}

/// Persistence of built theme versions.
#[async_trait]
pub trait ThemeVersionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Record a successful build.
    async fn record(&self, tenant: &TenantContext, version: &ThemeVersion) -> AppResult<()>;

    /// The newest recorded build.
    async fn latest(&self, tenant: &TenantContext) -> AppResult<Option<ThemeVersion>>;
}

/// One implementation of every store, shared by the services.
#[derive(Debug, Clone)]
pub struct Stores {
    pub nodes: Arc<dyn NodeStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub themes: Arc<dyn ThemeVersionStore>,
}

impl Stores {
    /// PostgreSQL-backed stores on one pool.
    pub fn postgres(pool: PgPool) -> Self {
        let scope = TenantScope::new(pool.clone());
        Self {
            nodes: Arc::new(NodeRepository::new(scope.clone())),
            tasks: Arc::new(TaskRepository::new(pool)),
            tenants: Arc::new(TenantRepository::new(scope.clone())),
            themes: Arc::new(ThemeVersionRepository::new(scope)),
        }
    }

    /// In-memory stores. The concrete task store is returned too, for
    /// subscribing to its enqueue notifications.
    pub fn memory() -> (Self, Arc<memory::MemoryTaskStore>) {
        let tasks = Arc::new(memory::MemoryTaskStore::new());
        let stores = Self {
            nodes: Arc::new(memory::MemoryNodeStore::new()),
            tasks: tasks.clone(),
            tenants: Arc::new(memory::MemoryTenantStore::new()),
            themes: Arc::new(memory::MemoryThemeVersionStore::new()),
        };
        (stores, tasks)
    }
}
