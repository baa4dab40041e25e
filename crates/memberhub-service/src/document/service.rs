//! Document tree operations: listing, creating, renaming, moving, trash and
//! permanent deletion.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};

use memberhub_core::config::StorageConfig;
use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::traits::StorageProvider;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::sorting::SortField;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::NodeStore;
use memberhub_entity::node::{Breadcrumbs, FileNode, NodeEntry, blob_key};

use super::tree;

/// Where a restored node goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreDestination {
    /// The nearest live ancestor, or the top level when there is none.
    Proposed,
    /// The top level.
    TopLevel,
    /// A specific directory.
    Directory(NodeId),
}

/// Result of a permanent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    /// File contents removed from the blob store.
    pub blobs_removed: usize,
    /// File contents that could not be removed and are left for the sweep.
    pub blobs_failed: usize,
}

/// Manages a tenant's document tree.
#[derive(Debug, Clone)]
pub struct DocumentService {
    /// Node persistence.
    pub(crate) nodes: Arc<dyn NodeStore>,
    /// Blob store for file contents.
    pub(crate) blobs: Arc<dyn StorageProvider>,
    /// Storage configuration.
    pub(crate) config: StorageConfig,
}

impl DocumentService {
    /// Creates a new document service.
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        blobs: Arc<dyn StorageProvider>,
        config: StorageConfig,
    ) -> Self {
        Self {
            nodes,
            blobs,
            config,
        }
    }

    /// Gets a node by ID.
    pub async fn get(&self, tenant: &TenantContext, id: NodeId) -> AppResult<FileNode> {
        self.nodes
            .get(tenant, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    /// Resolves an optional parent into a directory, rejecting files.
    pub(crate) async fn require_directory(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
    ) -> AppResult<Option<FileNode>> {
        let Some(parent_id) = parent else {
            return Ok(None);
        };
        let parent = self.get(tenant, parent_id).await?;
        if !parent.is_directory() {
            return Err(AppError::invalid_move(format!(
                "'{}' is a file and cannot contain other nodes",
                parent.name
            )));
        }
        Ok(Some(parent))
    }

    /// Fails with a name collision if a live child of `parent` other than
    /// `except` carries `name`.
    pub(crate) async fn ensure_name_free(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
        except: Option<NodeId>,
    ) -> AppResult<()> {
        match self.nodes.live_child_named(tenant, parent, name).await? {
            Some(existing) if Some(existing.id) != except => Err(AppError::name_collision(name)),
            _ => Ok(()),
        }
    }

    /// Lists the children of a directory (top level for `None`): directories
    /// first, then files, in the requested order.
    pub async fn list_children(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        sort: &[SortField],
        include_trashed: bool,
    ) -> AppResult<Vec<NodeEntry>> {
        self.require_directory(tenant, parent).await?;
        let mut entries = self.nodes.children(tenant, parent, include_trashed).await?;
        tree::sort_entries(&mut entries, sort);
        Ok(entries)
    }

    /// Lists every node carrying its own trash mark.
    pub async fn list_trash(
        &self,
        tenant: &TenantContext,
        sort: &[SortField],
    ) -> AppResult<Vec<NodeEntry>> {
        let mut entries = self.nodes.trashed(tenant).await?;
        tree::sort_entries(&mut entries, sort);
        Ok(entries)
    }

    /// Creates a directory.
    pub async fn create_directory(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
    ) -> AppResult<FileNode> {
        let name = tree::validate_name(name)?;
        self.require_directory(tenant, parent).await?;
        self.ensure_name_free(tenant, parent, &name, None).await?;

        let directory = FileNode::directory(name, parent);
        self.nodes.insert(tenant, &directory).await?;

        info!(
            tenant = %tenant.schema,
            node_id = %directory.id,
            name = %directory.name,
            "Directory created"
        );
        Ok(directory)
    }

    /// Renames a node in place.
    pub async fn rename(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        new_name: &str,
    ) -> AppResult<FileNode> {
        let new_name = tree::validate_name(new_name)?;
        let mut node = self.get(tenant, id).await?;
        if node.name == new_name {
            return Ok(node);
        }
        if !node.is_trashed() {
            self.ensure_name_free(tenant, node.parent_id, &new_name, Some(node.id))
                .await?;
        }

        let old_name = std::mem::replace(&mut node.name, new_name);
        self.nodes.save(tenant, &node).await?;

        info!(
            tenant = %tenant.schema,
            node_id = %node.id,
            old_name = %old_name,
            new_name = %node.name,
            "Node renamed"
        );
        Ok(node)
    }

    /// Moves a node below `destination` (top level for `None`). A trashed node
    /// comes out of the trash.
    pub async fn move_node(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: Option<NodeId>,
    ) -> AppResult<FileNode> {
        let node = self
            .nodes
            .relocate(tenant, id, destination, &tree::check_move)
            .await?;

        info!(
            tenant = %tenant.schema,
            node_id = %node.id,
            name = %node.name,
            to = ?destination,
            "Node moved"
        );
        Ok(node)
    }

    /// Moves a node to the trash. Nodes already in the trash, directly or
    /// through an ancestor, are left as they are.
    pub async fn trash(&self, tenant: &TenantContext, id: NodeId) -> AppResult<FileNode> {
        let mut node = self.get(tenant, id).await?;
        let ancestors = self.nodes.ancestors(tenant, id).await?;
        if tree::is_in_trash(&node, &ancestors) {
            return Ok(node);
        }

        node.trashed_at = Some(Utc::now());
        self.nodes.save(tenant, &node).await?;

        info!(tenant = %tenant.schema, node_id = %node.id, name = %node.name, "Node trashed");
        Ok(node)
    }

    /// Whether the node or any ancestor is in the trash.
    pub async fn is_in_trash(&self, tenant: &TenantContext, id: NodeId) -> AppResult<bool> {
        let node = self.get(tenant, id).await?;
        let ancestors = self.nodes.ancestors(tenant, id).await?;
        Ok(tree::is_in_trash(&node, &ancestors))
    }

    /// The closest ancestor that is neither trashed nor below a trashed node.
    /// `None` means the top level.
    pub async fn nearest_live_ancestor(
        &self,
        tenant: &TenantContext,
        id: NodeId,
    ) -> AppResult<Option<FileNode>> {
        let node = self.get(tenant, id).await?;
        let ancestors = self.nodes.ancestors(tenant, id).await?;
        Ok(tree::nearest_live_ancestor(&node, &ancestors).cloned())
    }

    /// Where a restore without explicit destination puts the node.
    pub async fn restore_target(
        &self,
        tenant: &TenantContext,
        id: NodeId,
    ) -> AppResult<Option<FileNode>> {
        self.nearest_live_ancestor(tenant, id).await
    }

    /// Takes a node out of the trash and places it at `destination`.
    pub async fn restore(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: RestoreDestination,
    ) -> AppResult<FileNode> {
        let node = self.get(tenant, id).await?;
        let ancestors = self.nodes.ancestors(tenant, id).await?;
        if !tree::is_in_trash(&node, &ancestors) {
            return Err(AppError::validation(format!(
                "'{}' is not in the trash",
                node.name
            )));
        }

        let destination = match destination {
            RestoreDestination::Proposed => {
                tree::nearest_live_ancestor(&node, &ancestors).map(|a| a.id)
            }
            RestoreDestination::TopLevel => None,
            RestoreDestination::Directory(dir) => Some(dir),
        };
        let restored = self.move_node(tenant, id, destination).await?;

        info!(tenant = %tenant.schema, node_id = %id, to = ?destination, "Node restored");
        Ok(restored)
    }

    /// Deletes a node and its subtree for good, then removes the contents of
    /// every file in it. Blob removal failures are logged and left for
    /// [`DocumentService::sweep_orphaned_blobs`].
    pub async fn permanently_delete(
        &self,
        tenant: &TenantContext,
        id: NodeId,
    ) -> AppResult<DeleteSummary> {
        let node = self.get(tenant, id).await?;
        let file_ids = self.nodes.subtree_file_ids(tenant, id).await?;

        if !self.nodes.delete(tenant, id).await? {
            return Err(AppError::not_found(format!("Node {id} not found")));
        }

        let mut summary = DeleteSummary {
            blobs_removed: 0,
            blobs_failed: 0,
        };
        for file_id in file_ids {
            let key = blob_key(&tenant.schema, file_id);
            match self.blobs.delete(&key).await {
                Ok(()) => summary.blobs_removed += 1,
                Err(e) => {
                    summary.blobs_failed += 1;
                    warn!(key = %key, error = %e, "Failed to remove blob of deleted file");
                }
            }
        }

        info!(
            tenant = %tenant.schema,
            node_id = %id,
            name = %node.name,
            blobs_removed = summary.blobs_removed,
            "Node permanently deleted"
        );
        Ok(summary)
    }

    /// Root-to-leaf trail to a node, rooted in the trashcan when the node is
    /// in the trash.
    pub async fn breadcrumbs(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Breadcrumbs> {
        let node = self.get(tenant, id).await?;
        let ancestors = self.nodes.ancestors(tenant, id).await?;
        Ok(tree::breadcrumbs(&node, &ancestors))
    }

    /// Reads a file together with its content.
    pub async fn read_file(&self, tenant: &TenantContext, id: NodeId) -> AppResult<(FileNode, Bytes)> {
        let node = self.get(tenant, id).await?;
        if !node.is_file() {
            return Err(AppError::validation(format!(
                "'{}' is a directory",
                node.name
            )));
        }
        let content = self.blobs.read_bytes(&node.blob_key(&tenant.schema)).await?;
        Ok((node, content))
    }
}
