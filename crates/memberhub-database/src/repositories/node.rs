//! File node repository implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection};

use memberhub_core::error::{AppError, ErrorKind};
use memberhub_core::result::AppResult;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_entity::node::{FileNode, FileNodeRow, NodeEntry, NodeKind};

use crate::store::{MoveCheck, NodeStore};
use crate::tenant_scope::{self, TenantScope};

const LIVE_SIBLING_INDEX: &str = "file_nodes_live_sibling_name_key";

const NODE_COLUMNS: &str = "id, name, parent_id, created_at, trashed_at, kind, size_bytes, content_type";

const ENTRY_SELECT: &str = "SELECT n.id, n.name, n.parent_id, n.created_at, n.trashed_at, n.kind, \
     n.size_bytes, n.content_type, \
     CASE WHEN n.kind = 'directory' THEN ( \
        SELECT COUNT(*) FROM file_nodes c WHERE c.parent_id = n.id AND c.trashed_at IS NULL \
     ) END AS live_children \
     FROM file_nodes n";

#[derive(Debug, FromRow)]
struct EntryRow {
    #[sqlx(flatten)]
    node: FileNodeRow,
    live_children: Option<i64>,
}

impl TryFrom<EntryRow> for NodeEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(NodeEntry {
            node: FileNode::try_from(row.node)?,
            live_children: row.live_children.map(|n| n as u64),
        })
    }
}

/// Repository for a tenant's `file_nodes` table.
#[derive(Debug, Clone)]
pub struct NodeRepository {
    scope: TenantScope,
}

impl NodeRepository {
    /// Create a new node repository.
    pub fn new(scope: TenantScope) -> Self {
        Self { scope }
    }
}

/// Translate a write failure, turning the live-sibling index into a
/// name collision.
fn write_error(e: sqlx::Error, node: &FileNode, action: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.constraint() == Some(LIVE_SIBLING_INDEX) => {
            AppError::name_collision(&node.name)
        }
        _ => AppError::with_source(ErrorKind::Database, format!("Failed to {action} node"), e),
    }
}

async fn fetch_node(conn: &mut PgConnection, id: NodeId) -> AppResult<Option<FileNode>> {
    let row = sqlx::query_as::<_, FileNodeRow>(&format!(
        "SELECT {NODE_COLUMNS} FROM file_nodes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find node", e))?;
    row.map(FileNode::try_from).transpose()
}

/// Strict ancestors of `id`, nearest first. The path array stops the walk
/// at a repeated node.
async fn fetch_ancestors(conn: &mut PgConnection, id: NodeId) -> AppResult<Vec<FileNode>> {
    let rows = sqlx::query_as::<_, FileNodeRow>(&format!(
        "WITH RECURSIVE chain AS ( \
            SELECT p.*, 1 AS depth, ARRAY[n.id, p.id] AS path \
            FROM file_nodes n JOIN file_nodes p ON p.id = n.parent_id \
            WHERE n.id = $1 \
            UNION ALL \
            SELECT p.*, c.depth + 1, c.path || p.id \
            FROM chain c JOIN file_nodes p ON p.id = c.parent_id \
            WHERE NOT p.id = ANY(c.path) \
         ) SELECT {NODE_COLUMNS} FROM chain ORDER BY depth ASC"
    ))
    .bind(id)
    .fetch_all(conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find ancestors", e))?;
    rows.into_iter().map(FileNode::try_from).collect()
}

fn into_entries(rows: Vec<EntryRow>) -> AppResult<Vec<NodeEntry>> {
    rows.into_iter().map(NodeEntry::try_from).collect()
}

#[async_trait]
impl NodeStore for NodeRepository {
    async fn get(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Option<FileNode>> {
        let mut tx = self.scope.begin(tenant).await?;
        let node = fetch_node(&mut tx, id).await?;
        tenant_scope::commit(tx).await?;
        Ok(node)
    }

    async fn insert(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        let (size_bytes, content_type) = match &node.kind {
            NodeKind::Directory => (None, None),
            NodeKind::File {
                size_bytes,
                content_type,
            } => (Some(*size_bytes), Some(content_type.as_str())),
        };

        let mut tx = self.scope.begin(tenant).await?;
        sqlx::query(
            "INSERT INTO file_nodes (id, name, parent_id, created_at, trashed_at, kind, size_bytes, content_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(node.id)
        .bind(&node.name)
        .bind(node.parent_id)
        .bind(node.created_at)
        .bind(node.trashed_at)
        .bind(node.kind.as_str())
        .bind(size_bytes)
        .bind(content_type)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, node, "create"))?;
        tenant_scope::commit(tx).await
    }

    async fn save(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        let mut tx = self.scope.begin(tenant).await?;
        let result = sqlx::query("UPDATE file_nodes SET name = $2, trashed_at = $3 WHERE id = $1")
            .bind(node.id)
            .bind(&node.name)
            .bind(node.trashed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, node, "update"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Node {} not found", node.id)));
        }
        tenant_scope::commit(tx).await
    }

    async fn relocate(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: Option<NodeId>,
        check: &MoveCheck,
    ) -> AppResult<FileNode> {
        let mut tx = self.scope.begin(tenant).await?;

        // Held until commit. Reads below run after any earlier relocation in
        // this schema has committed.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("file_nodes.relocate:{}", tenant.schema))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock document tree", e))?;

        let mut node = fetch_node(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))?;
        let target = match destination {
            Some(dest_id) => Some(
                fetch_node(&mut tx, dest_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Node {dest_id} not found")))?,
            ),
            None => None,
        };
        let target_ancestors = match &target {
            Some(t) if t.is_directory() => fetch_ancestors(&mut tx, t.id).await?,
            _ => Vec::new(),
        };
        check(&node, target.as_ref(), &target_ancestors)?;

        node.parent_id = destination;
        node.trashed_at = None;
        sqlx::query("UPDATE file_nodes SET parent_id = $2, trashed_at = NULL WHERE id = $1")
            .bind(node.id)
            .bind(node.parent_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, &node, "move"))?;
        tenant_scope::commit(tx).await?;
        Ok(node)
    }

    async fn delete(&self, tenant: &TenantContext, id: NodeId) -> AppResult<bool> {
        let mut tx = self.scope.begin(tenant).await?;
        let result = sqlx::query("DELETE FROM file_nodes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete node", e))?;
        tenant_scope::commit(tx).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn children(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        include_trashed: bool,
    ) -> AppResult<Vec<NodeEntry>> {
        let mut tx = self.scope.begin(tenant).await?;
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "{ENTRY_SELECT} WHERE n.parent_id IS NOT DISTINCT FROM $1 \
             AND ($2 OR n.trashed_at IS NULL)"
        ))
        .bind(parent)
        .bind(include_trashed)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))?;
        tenant_scope::commit(tx).await?;
        into_entries(rows)
    }

    async fn trashed(&self, tenant: &TenantContext) -> AppResult<Vec<NodeEntry>> {
        let mut tx = self.scope.begin(tenant).await?;
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "{ENTRY_SELECT} WHERE n.trashed_at IS NOT NULL"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trash", e))?;
        tenant_scope::commit(tx).await?;
        into_entries(rows)
    }

    async fn ancestors(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<FileNode>> {
        let mut tx = self.scope.begin(tenant).await?;
        let ancestors = fetch_ancestors(&mut tx, id).await?;
        tenant_scope::commit(tx).await?;
        Ok(ancestors)
    }

    async fn live_child_named(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
    ) -> AppResult<Option<FileNode>> {
        let mut tx = self.scope.begin(tenant).await?;
        let row = sqlx::query_as::<_, FileNodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM file_nodes \
             WHERE parent_id IS NOT DISTINCT FROM $1 AND name = $2 AND trashed_at IS NULL"
        ))
        .bind(parent)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up sibling", e))?;
        tenant_scope::commit(tx).await?;
        row.map(FileNode::try_from).transpose()
    }

    async fn subtree_file_ids(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<NodeId>> {
        let mut tx = self.scope.begin(tenant).await?;
        let ids = sqlx::query_scalar::<_, NodeId>(
            "WITH RECURSIVE subtree AS ( \
                SELECT id, kind, ARRAY[id] AS path FROM file_nodes WHERE id = $1 \
                UNION ALL \
                SELECT c.id, c.kind, s.path || c.id \
                FROM file_nodes c JOIN subtree s ON c.parent_id = s.id \
                WHERE NOT c.id = ANY(s.path) \
             ) SELECT id FROM subtree WHERE kind = 'file'",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list subtree files", e))?;
        tenant_scope::commit(tx).await?;
        Ok(ids)
    }

    async fn all_file_ids(&self, tenant: &TenantContext) -> AppResult<Vec<NodeId>> {
        let mut tx = self.scope.begin(tenant).await?;
        let ids = sqlx::query_scalar::<_, NodeId>("SELECT id FROM file_nodes WHERE kind = 'file'")
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))?;
        tenant_scope::commit(tx).await?;
        Ok(ids)
    }
}
