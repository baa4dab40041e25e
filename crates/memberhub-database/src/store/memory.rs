//! In-memory store implementations.
//!
//! Used by unit and integration tests, and by tooling that runs without a
//! database. They enforce the same rules as the PostgreSQL schema: foreign
//! keys with cascading deletes, the live-sibling name index, forward-only
//! task status and exclusive claims.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, broadcast};

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::{NodeId, TaskId, TenantId};
use memberhub_core::types::tenant::{SchemaName, TenantContext};
use memberhub_entity::node::{FileNode, NodeEntry};
use memberhub_entity::task::{NewTask, Task, TaskStatus};
use memberhub_entity::tenant::{CreateTenant, Tenant};
use memberhub_entity::theme::ThemeVersion;

use super::{MoveCheck, NodeStore, TaskStore, TenantStore, ThemeVersionStore};

type Tree = HashMap<NodeId, FileNode>;

/// Document trees kept in memory, one per tenant.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    trees: RwLock<HashMap<TenantId, Tree>>,
}

impl MemoryNodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes stored for a tenant.
    pub async fn len(&self, tenant: &TenantContext) -> usize {
        self.trees
            .read()
            .await
            .get(&tenant.tenant_id)
            .map_or(0, HashMap::len)
    }

    /// Whether the tenant has no nodes.
    pub async fn is_empty(&self, tenant: &TenantContext) -> bool {
        self.len(tenant).await == 0
    }
}

fn check_constraints(tree: &Tree, node: &FileNode) -> AppResult<()> {
    if node.parent_id == Some(node.id) {
        return Err(AppError::database(format!(
            "Node {} cannot be its own parent",
            node.id
        )));
    }
    if let Some(parent_id) = node.parent_id {
        if !tree.contains_key(&parent_id) {
            return Err(AppError::database(format!(
                "Parent {parent_id} of node {} does not exist",
                node.id
            )));
        }
    }
    if node.trashed_at.is_none() {
        let taken = tree.values().any(|other| {
            other.id != node.id
                && other.trashed_at.is_none()
                && other.parent_id == node.parent_id
                && other.name == node.name
        });
        if taken {
            return Err(AppError::name_collision(&node.name));
        }
    }
    Ok(())
}

fn live_children(tree: &Tree, id: NodeId) -> u64 {
    tree.values()
        .filter(|n| n.parent_id == Some(id) && n.trashed_at.is_none())
        .count() as u64
}

fn entry(tree: &Tree, node: &FileNode) -> NodeEntry {
    NodeEntry {
        node: node.clone(),
        live_children: node.is_directory().then(|| live_children(tree, node.id)),
    }
}

/// Strict ancestors of `id`, nearest first, stopping at a repeated node.
fn ancestor_chain(tree: &Tree, id: NodeId) -> Vec<FileNode> {
    let mut seen = HashSet::from([id]);
    let mut out = Vec::new();
    let mut next = tree.get(&id).and_then(|n| n.parent_id);
    while let Some(parent_id) = next {
        if !seen.insert(parent_id) {
            break;
        }
        let Some(parent) = tree.get(&parent_id) else {
            break;
        };
        next = parent.parent_id;
        out.push(parent.clone());
    }
    out
}

fn subtree(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    let mut out = Vec::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) || !tree.contains_key(&id) {
            continue;
        }
        out.push(id);
        stack.extend(
            tree.values()
                .filter(|n| n.parent_id == Some(id))
                .map(|n| n.id),
        );
    }
    out
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Option<FileNode>> {
        let trees = self.trees.read().await;
        Ok(trees.get(&tenant.tenant_id).and_then(|t| t.get(&id)).cloned())
    }

    async fn insert(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        let mut trees = self.trees.write().await;
        let tree = trees.entry(tenant.tenant_id).or_default();
        if tree.contains_key(&node.id) {
            return Err(AppError::database(format!("Node {} already exists", node.id)));
        }
        check_constraints(tree, node)?;
        tree.insert(node.id, node.clone());
        Ok(())
    }

    async fn save(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        let mut trees = self.trees.write().await;
        let tree = trees
            .get_mut(&tenant.tenant_id)
            .ok_or_else(|| AppError::not_found(format!("Node {} not found", node.id)))?;
        let Some(stored) = tree.get(&node.id) else {
            return Err(AppError::not_found(format!("Node {} not found", node.id)));
        };
        let updated = FileNode {
            name: node.name.clone(),
            trashed_at: node.trashed_at,
            ..stored.clone()
        };
        check_constraints(tree, &updated)?;
        tree.insert(updated.id, updated);
        Ok(())
    }

    async fn relocate(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: Option<NodeId>,
        check: &MoveCheck,
    ) -> AppResult<FileNode> {
        let mut trees = self.trees.write().await;
        let tree = trees.entry(tenant.tenant_id).or_default();
        let node = tree
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))?;
        let target = match destination {
            Some(dest_id) => Some(
                tree.get(&dest_id)
                    .ok_or_else(|| AppError::not_found(format!("Node {dest_id} not found")))?,
            ),
            None => None,
        };
        let target_ancestors = match target {
            Some(t) if t.is_directory() => ancestor_chain(tree, t.id),
            _ => Vec::new(),
        };
        check(&node, target, &target_ancestors)?;

        let moved = FileNode {
            parent_id: destination,
            trashed_at: None,
            ..node
        };
        check_constraints(tree, &moved)?;
        tree.insert(moved.id, moved.clone());
        Ok(moved)
    }

    async fn delete(&self, tenant: &TenantContext, id: NodeId) -> AppResult<bool> {
        let mut trees = self.trees.write().await;
        let Some(tree) = trees.get_mut(&tenant.tenant_id) else {
            return Ok(false);
        };
        let doomed = subtree(tree, id);
        for node_id in &doomed {
            tree.remove(node_id);
        }
        Ok(!doomed.is_empty())
    }

    async fn children(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        include_trashed: bool,
    ) -> AppResult<Vec<NodeEntry>> {
        let trees = self.trees.read().await;
        let Some(tree) = trees.get(&tenant.tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(tree
            .values()
            .filter(|n| n.parent_id == parent && (include_trashed || n.trashed_at.is_none()))
            .map(|n| entry(tree, n))
            .collect())
    }

    async fn trashed(&self, tenant: &TenantContext) -> AppResult<Vec<NodeEntry>> {
        let trees = self.trees.read().await;
        let Some(tree) = trees.get(&tenant.tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(tree
            .values()
            .filter(|n| n.trashed_at.is_some())
            .map(|n| entry(tree, n))
            .collect())
    }

    async fn ancestors(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<FileNode>> {
        let trees = self.trees.read().await;
        let Some(tree) = trees.get(&tenant.tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(ancestor_chain(tree, id))
    }

    async fn live_child_named(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
    ) -> AppResult<Option<FileNode>> {
        let trees = self.trees.read().await;
        Ok(trees.get(&tenant.tenant_id).and_then(|tree| {
            tree.values()
                .find(|n| n.parent_id == parent && n.trashed_at.is_none() && n.name == name)
                .cloned()
        }))
    }

    async fn subtree_file_ids(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<NodeId>> {
        let trees = self.trees.read().await;
        let Some(tree) = trees.get(&tenant.tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(subtree(tree, id)
            .into_iter()
            .filter(|node_id| tree.get(node_id).is_some_and(FileNode::is_file))
            .collect())
    }

    async fn all_file_ids(&self, tenant: &TenantContext) -> AppResult<Vec<NodeId>> {
        let trees = self.trees.read().await;
        Ok(trees
            .get(&tenant.tenant_id)
            .map(|tree| {
                tree.values()
                    .filter(|n| n.is_file())
                    .map(|n| n.id)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Task queue kept in memory.
///
/// Claims are taken under a single lock, so concurrent claimers never receive
/// the same task. Enqueued ids are broadcast to subscribers in place of
/// `NOTIFY`.
#[derive(Debug)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    notifications: broadcast::Sender<TaskId>,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskStore {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(256);
        Self {
            tasks: Mutex::new(Vec::new()),
            notifications,
        }
    }

    /// Receive the ids of tasks enqueued from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskId> {
        self.notifications.subscribe()
    }

    /// Snapshot of every stored task.
    pub async fn all(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }
}

fn claim(task: &mut Task, worker_id: &str) {
    task.picked_up_at = Some(Utc::now());
    task.worker_id = Some(worker_id.to_string());
}

fn claimable(task: &Task) -> bool {
    task.status == TaskStatus::Queued && task.picked_up_at.is_none()
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn enqueue(&self, task: NewTask, _channel: &str) -> AppResult<Task> {
        let task = task.into_task();
        self.tasks.lock().await.push(task.clone());
        // No subscribers is fine; pollers still find the row.
        let _ = self.notifications.send(task.id);
        Ok(task)
    }

    async fn claim_batch(&self, worker_id: &str, limit: u32) -> AppResult<Vec<Task>> {
        let mut tasks = self.tasks.lock().await;
        let mut order: Vec<usize> = (0..tasks.len()).filter(|&i| claimable(&tasks[i])).collect();
        order.sort_by_key(|&i| tasks[i].created_at);
        order.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(order.len());
        for i in order {
            claim(&mut tasks[i], worker_id);
            claimed.push(tasks[i].clone());
        }
        Ok(claimed)
    }

    async fn claim_by_id(&self, id: TaskId, worker_id: &str) -> AppResult<Option<Task>> {
        let mut tasks = self.tasks.lock().await;
        Ok(tasks
            .iter_mut()
            .find(|t| t.id == id && claimable(t))
            .map(|task| {
                claim(task, worker_id);
                task.clone()
            }))
    }

    async fn record_outcome(&self, id: TaskId, status: TaskStatus, output: &str) -> AppResult<bool> {
        let mut tasks = self.tasks.lock().await;
        match tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Queued)
        {
            Some(task) => {
                task.status = status;
                task.output = output.to_string();
                task.completed_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: TaskId) -> AppResult<Option<Task>> {
        Ok(self.tasks.lock().await.iter().find(|t| t.id == id).cloned())
    }

    async fn list_recent(&self, status: Option<TaskStatus>, limit: u32) -> AppResult<Vec<Task>> {
        let tasks = self.tasks.lock().await;
        let mut matching: Vec<Task> = tasks
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn count_by_status(&self) -> AppResult<Vec<(TaskStatus, u64)>> {
        let tasks = self.tasks.lock().await;
        Ok(TaskStatus::ALL
            .into_iter()
            .map(|s| (s, tasks.iter().filter(|t| t.status == s).count() as u64))
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    async fn requeue_stale(
        &self,
        claimed_before: DateTime<Utc>,
        worker_id: Option<&str>,
    ) -> AppResult<u64> {
        let mut tasks = self.tasks.lock().await;
        let mut released = 0;
        for task in tasks.iter_mut() {
            let stale = task.status == TaskStatus::Queued
                && task.picked_up_at.is_some_and(|at| at < claimed_before)
                && worker_id.is_none_or(|w| task.worker_id.as_deref() == Some(w));
            if stale {
                task.picked_up_at = None;
                task.worker_id = None;
                released += 1;
            }
        }
        Ok(released)
    }
}

/// Tenants kept in memory.
#[derive(Debug, Default)]
pub struct MemoryTenantStore {
    tenants: RwLock<Vec<Tenant>>,
}

impl MemoryTenantStore {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn create(&self, data: CreateTenant) -> AppResult<Tenant> {
        let mut tenants = self.tenants.write().await;
        if tenants
            .iter()
            .any(|t| t.schema_name == data.schema_name.as_str())
        {
            return Err(AppError::conflict(format!(
                "Tenant schema '{}' already exists",
                data.schema_name
            )));
        }
        let tenant = data.into_tenant();
        tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn find_by_id(&self, id: TenantId) -> AppResult<Option<Tenant>> {
        Ok(self.tenants.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_schema(&self, schema: &SchemaName) -> AppResult<Option<Tenant>> {
        Ok(self
            .tenants
            .read()
            .await
            .iter()
            .find(|t| t.schema_name == schema.as_str())
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<Tenant>> {
        Ok(self.tenants.read().await.clone())
    }
}

/// Theme versions kept in memory.
#[derive(Debug, Default)]
pub struct MemoryThemeVersionStore {
    versions: RwLock<HashMap<TenantId, Vec<ThemeVersion>>>,
}

impl MemoryThemeVersionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every version recorded for a tenant, oldest first.
    pub async fn versions(&self, tenant: &TenantContext) -> Vec<ThemeVersion> {
        self.versions
            .read()
            .await
            .get(&tenant.tenant_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ThemeVersionStore for MemoryThemeVersionStore {
    async fn record(&self, tenant: &TenantContext, version: &ThemeVersion) -> AppResult<()> {
        self.versions
            .write()
            .await
            .entry(tenant.tenant_id)
            .or_default()
            .push(version.clone());
        Ok(())
    }

    async fn latest(&self, tenant: &TenantContext) -> AppResult<Option<ThemeVersion>> {
        Ok(self
            .versions
            .read()
            .await
            .get(&tenant.tenant_id)
            .and_then(|v| v.iter().max_by_key(|t| t.version).cloned()))
    }
}
