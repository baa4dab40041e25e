use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;

use memberhub_core::config::StorageConfig;
use memberhub_core::error::ErrorKind;
use memberhub_core::result::AppResult;
use memberhub_core::traits::StorageProvider;
use memberhub_core::types::id::{NodeId, TenantId};
use memberhub_core::types::tenant::{SchemaName, TenantContext};
use memberhub_database::store::memory::MemoryNodeStore;
use memberhub_database::{MoveCheck, NodeStore};
use memberhub_entity::node::{BreadcrumbRoot, FileNode, NodeEntry, blob_prefix};
use memberhub_storage::LocalStorageProvider;

use super::tree::parse_sort;
use super::{DocumentService, RestoreDestination, UploadItem};

struct Fixture {
    _dir: tempfile::TempDir,
    blobs: Arc<LocalStorageProvider>,
    service: DocumentService,
    tenant: TenantContext,
}

async fn fixture() -> Fixture {
    fixture_with(Arc::new(MemoryNodeStore::new())).await
}

async fn fixture_with(nodes: Arc<dyn NodeStore>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
    let service = DocumentService::new(nodes, blobs.clone(), StorageConfig::default());
    Fixture {
        _dir: dir,
        blobs,
        service,
        tenant: tenant("noord"),
    }
}

fn tenant(schema: &str) -> TenantContext {
    TenantContext::new(TenantId::new(), SchemaName::parse(schema).unwrap())
}

impl Fixture {
    async fn mkdir(&self, parent: Option<NodeId>, name: &str) -> NodeId {
        self.service
            .create_directory(&self.tenant, parent, name)
            .await
            .unwrap()
            .id
    }

    async fn blob_count(&self) -> usize {
        self.blobs
            .list(&blob_prefix(&self.tenant.schema))
            .await
            .unwrap()
            .len()
    }

    /// depth1 / depth2 / depth3 / depth4
    async fn chain(&self) -> [NodeId; 4] {
        let d1 = self.mkdir(None, "depth1").await;
        let d2 = self.mkdir(Some(d1), "depth2").await;
        let d3 = self.mkdir(Some(d2), "depth3").await;
        let d4 = self.mkdir(Some(d3), "depth4").await;
        [d1, d2, d3, d4]
    }
}

#[tokio::test]
async fn test_sibling_names_unique_among_live_nodes() {
    let f = fixture().await;
    let first = f.mkdir(None, "Notulen").await;

    let err = f
        .service
        .create_directory(&f.tenant, None, "Notulen")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);

    // Case differs, so the name is free.
    f.mkdir(None, "notulen").await;

    f.service.trash(&f.tenant, first).await.unwrap();
    f.mkdir(None, "Notulen").await;
}

#[tokio::test]
async fn test_create_below_file_or_missing_parent() {
    let f = fixture().await;
    let file = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("a.txt", "a"))
        .await
        .unwrap();

    let err = f
        .service
        .create_directory(&f.tenant, Some(file.id), "sub")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidMove);

    let err = f
        .service
        .create_directory(&f.tenant, Some(NodeId::new()), "sub")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = f
        .service
        .create_directory(&f.tenant, None, "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_rename() {
    let f = fixture().await;
    let a = f.mkdir(None, "a").await;
    let b = f.mkdir(None, "b").await;

    let err = f.service.rename(&f.tenant, b, "a").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);

    let renamed = f.service.rename(&f.tenant, b, "c").await.unwrap();
    assert_eq!(renamed.name, "c");
    assert_eq!(f.service.get(&f.tenant, b).await.unwrap().name, "c");

    // Trashed nodes do not hold on to their name.
    f.service.trash(&f.tenant, a).await.unwrap();
    f.service.rename(&f.tenant, b, "a").await.unwrap();
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected_at_any_depth() {
    let f = fixture().await;
    let chain = f.chain().await;

    for target in chain {
        let err = f
            .service
            .move_node(&f.tenant, chain[0], Some(target))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidMove);
    }
    assert_eq!(f.service.get(&f.tenant, chain[0]).await.unwrap().parent_id, None);
}

#[tokio::test]
async fn test_move_round_trip_restores_layout() {
    let f = fixture().await;
    let a = f.mkdir(None, "a").await;
    let b = f.mkdir(None, "b").await;
    let x = f.mkdir(Some(a), "x").await;

    f.service.move_node(&f.tenant, x, Some(b)).await.unwrap();
    let a_children = f
        .service
        .list_children(&f.tenant, Some(a), &parse_sort("name"), false)
        .await
        .unwrap();
    assert!(a_children.is_empty());

    f.service.move_node(&f.tenant, x, Some(a)).await.unwrap();
    let node = f.service.get(&f.tenant, x).await.unwrap();
    assert_eq!(node.parent_id, Some(a));
    assert_eq!(node.name, "x");
    assert!(node.trashed_at.is_none());
}

/// Hands control back to the scheduler around every store call, so two
/// operations joined on one task interleave at each await.
#[derive(Debug, Default)]
struct YieldingNodeStore {
    inner: MemoryNodeStore,
}

#[async_trait]
impl NodeStore for YieldingNodeStore {
    async fn get(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Option<FileNode>> {
        tokio::task::yield_now().await;
        let node = self.inner.get(tenant, id).await;
        tokio::task::yield_now().await;
        node
    }

    async fn insert(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        self.inner.insert(tenant, node).await
    }

    async fn save(&self, tenant: &TenantContext, node: &FileNode) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.save(tenant, node).await
    }

    async fn relocate(
        &self,
        tenant: &TenantContext,
        id: NodeId,
        destination: Option<NodeId>,
        check: &MoveCheck,
    ) -> AppResult<FileNode> {
        tokio::task::yield_now().await;
        let moved = self.inner.relocate(tenant, id, destination, check).await;
        tokio::task::yield_now().await;
        moved
    }

    async fn delete(&self, tenant: &TenantContext, id: NodeId) -> AppResult<bool> {
        self.inner.delete(tenant, id).await
    }

    async fn children(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        include_trashed: bool,
    ) -> AppResult<Vec<NodeEntry>> {
        self.inner.children(tenant, parent, include_trashed).await
    }

    async fn trashed(&self, tenant: &TenantContext) -> AppResult<Vec<NodeEntry>> {
        self.inner.trashed(tenant).await
    }

    async fn ancestors(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<FileNode>> {
        tokio::task::yield_now().await;
        let ancestors = self.inner.ancestors(tenant, id).await;
        tokio::task::yield_now().await;
        ancestors
    }

    async fn live_child_named(
        &self,
        tenant: &TenantContext,
        parent: Option<NodeId>,
        name: &str,
    ) -> AppResult<Option<FileNode>> {
        tokio::task::yield_now().await;
        self.inner.live_child_named(tenant, parent, name).await
    }

    async fn subtree_file_ids(&self, tenant: &TenantContext, id: NodeId) -> AppResult<Vec<NodeId>> {
        self.inner.subtree_file_ids(tenant, id).await
    }

    async fn all_file_ids(&self, tenant: &TenantContext) -> AppResult<Vec<NodeId>> {
        self.inner.all_file_ids(tenant).await
    }
}

#[tokio::test]
async fn test_opposite_concurrent_moves_cannot_form_a_cycle() {
    let f = fixture_with(Arc::new(YieldingNodeStore::default())).await;
    let a = f.mkdir(None, "a").await;
    let b = f.mkdir(None, "b").await;

    let (a_into_b, b_into_a) = tokio::join!(
        f.service.move_node(&f.tenant, a, Some(b)),
        f.service.move_node(&f.tenant, b, Some(a)),
    );

    assert!(a_into_b.is_ok() != b_into_a.is_ok(), "exactly one move may win");
    let err = a_into_b.err().or(b_into_a.err()).unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidMove);

    let top = f
        .service
        .list_children(&f.tenant, None, &parse_sort("name"), false)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].live_children, Some(1));
}

#[tokio::test]
async fn test_rename_does_not_undo_a_move() {
    let f = fixture_with(Arc::new(YieldingNodeStore::default())).await;
    let a = f.mkdir(None, "a").await;
    let b = f.mkdir(None, "b").await;
    let x = f.mkdir(Some(a), "x").await;

    let (renamed, moved) = tokio::join!(
        f.service.rename(&f.tenant, x, "y"),
        f.service.move_node(&f.tenant, x, Some(b)),
    );
    renamed.unwrap();
    moved.unwrap();

    let node = f.service.get(&f.tenant, x).await.unwrap();
    assert_eq!(node.parent_id, Some(b));
    assert_eq!(node.name, "y");
}

#[tokio::test]
async fn test_move_name_collision() {
    let f = fixture().await;
    let a = f.mkdir(None, "a").await;
    f.mkdir(Some(a), "x").await;
    let x = f.mkdir(None, "x").await;

    let err = f.service.move_node(&f.tenant, x, Some(a)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);
}

#[tokio::test]
async fn test_trash_is_idempotent() {
    let f = fixture().await;
    let [d1, d2, ..] = f.chain().await;

    let first = f.service.trash(&f.tenant, d1).await.unwrap();
    let second = f.service.trash(&f.tenant, d1).await.unwrap();
    assert!(first.trashed_at.is_some());
    assert_eq!(first.trashed_at, second.trashed_at);

    // Already in the trash through its parent: no mark of its own.
    let child = f.service.trash(&f.tenant, d2).await.unwrap();
    assert!(child.trashed_at.is_none());
    assert!(f.service.is_in_trash(&f.tenant, d2).await.unwrap());
}

#[tokio::test]
async fn test_trash_and_restore_nested_chain() {
    let f = fixture().await;
    let [d1, d2, d3, d4] = f.chain().await;

    f.service.trash(&f.tenant, d3).await.unwrap();
    assert!(f.service.is_in_trash(&f.tenant, d3).await.unwrap());
    assert!(f.service.is_in_trash(&f.tenant, d4).await.unwrap());
    assert!(!f.service.is_in_trash(&f.tenant, d2).await.unwrap());

    for node in [d3, d4] {
        let target = f.service.restore_target(&f.tenant, node).await.unwrap();
        assert_eq!(target.map(|n| n.id), Some(d2));
    }

    let crumbs = f.service.breadcrumbs(&f.tenant, d4).await.unwrap();
    assert_eq!(crumbs.root, BreadcrumbRoot::Trashcan);
    assert_eq!(crumbs.display_path(), "Trashcan / depth3 / depth4");

    let restored = f
        .service
        .restore(&f.tenant, d4, RestoreDestination::Proposed)
        .await
        .unwrap();
    assert_eq!(restored.parent_id, Some(d2));
    assert!(!f.service.is_in_trash(&f.tenant, d4).await.unwrap());

    let crumbs = f.service.breadcrumbs(&f.tenant, d4).await.unwrap();
    assert_eq!(crumbs.root, BreadcrumbRoot::Documents);
    assert_eq!(crumbs.display_path(), "Documents / depth1 / depth2 / depth4");

    // The whole top is trashed now: restore lands on the top level.
    f.service.trash(&f.tenant, d1).await.unwrap();
    assert!(f.service.restore_target(&f.tenant, d3).await.unwrap().is_none());
    let restored = f
        .service
        .restore(&f.tenant, d3, RestoreDestination::Proposed)
        .await
        .unwrap();
    assert_eq!(restored.parent_id, None);
    assert!(restored.trashed_at.is_none());
}

#[tokio::test]
async fn test_restore_requires_trash_and_free_name() {
    let f = fixture().await;
    let a = f.mkdir(None, "a").await;
    let err = f
        .service
        .restore(&f.tenant, a, RestoreDestination::TopLevel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    f.service.trash(&f.tenant, a).await.unwrap();
    f.mkdir(None, "a").await;
    let err = f
        .service
        .restore(&f.tenant, a, RestoreDestination::Proposed)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);

    let dir = f.mkdir(None, "elsewhere").await;
    let restored = f
        .service
        .restore(&f.tenant, a, RestoreDestination::Directory(dir))
        .await
        .unwrap();
    assert_eq!(restored.parent_id, Some(dir));
}

#[tokio::test]
async fn test_listing_and_trash_listing() {
    let f = fixture().await;
    let docs = f.mkdir(None, "docs").await;
    f.mkdir(Some(docs), "b-dir").await;
    let old = f.mkdir(Some(docs), "A-dir").await;
    f.service
        .upload_file(&f.tenant, Some(docs), UploadItem::new("big.bin", vec![0u8; 64]))
        .await
        .unwrap();
    f.service
        .upload_file(&f.tenant, Some(docs), UploadItem::new("small.txt", "hi"))
        .await
        .unwrap();
    f.service.trash(&f.tenant, old).await.unwrap();

    let live = f
        .service
        .list_children(&f.tenant, Some(docs), &parse_sort("-size"), false)
        .await
        .unwrap();
    let names: Vec<&str> = live.iter().map(|e| e.node.name.as_str()).collect();
    assert_eq!(names, vec!["b-dir", "big.bin", "small.txt"]);

    let all = f
        .service
        .list_children(&f.tenant, Some(docs), &parse_sort("name"), true)
        .await
        .unwrap();
    let names: Vec<&str> = all.iter().map(|e| e.node.name.as_str()).collect();
    assert_eq!(names, vec!["A-dir", "b-dir", "big.bin", "small.txt"]);

    let top = f
        .service
        .list_children(&f.tenant, None, &parse_sort("name"), false)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].live_children, Some(3));

    let trash = f.service.list_trash(&f.tenant, &parse_sort("name")).await.unwrap();
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].node.id, old);
}

#[tokio::test]
async fn test_upload_collision_leaves_no_blob() {
    let f = fixture().await;
    let first = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("report.pdf", "v1"))
        .await
        .unwrap();
    assert_eq!(first.content_type(), Some("application/pdf"));

    let err = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("report.pdf", "v2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);
    assert_eq!(f.blob_count().await, 1);

    let (node, content) = f.service.read_file(&f.tenant, first.id).await.unwrap();
    assert_eq!(node.id, first.id);
    assert_eq!(content, Bytes::from("v1"));
}

#[tokio::test]
async fn test_upload_batch_collects_failures() {
    let f = fixture().await;
    f.service
        .upload_file(&f.tenant, None, UploadItem::new("taken.txt", "x"))
        .await
        .unwrap();

    let summary = f
        .service
        .upload_files(
            &f.tenant,
            None,
            vec![
                UploadItem::new("one.txt", "1"),
                UploadItem::new("taken.txt", "2"),
                UploadItem::new("", "3"),
                UploadItem::new("two.txt", "4"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(summary.uploaded.len(), 2);
    assert_eq!(summary.failed_names(), vec!["taken.txt", ""]);
    assert_eq!(summary.failed[0].error.kind, ErrorKind::NameCollision);
    assert_eq!(f.blob_count().await, 3);
}

#[tokio::test]
async fn test_permanent_delete_removes_subtree_and_blobs() {
    let f = fixture().await;
    let root = f.mkdir(None, "root").await;
    let sub = f.mkdir(Some(root), "sub").await;
    f.service
        .upload_file(&f.tenant, Some(root), UploadItem::new("a.txt", "a"))
        .await
        .unwrap();
    f.service
        .upload_file(&f.tenant, Some(sub), UploadItem::new("b.txt", "b"))
        .await
        .unwrap();
    let keep = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("keep.txt", "k"))
        .await
        .unwrap();

    let summary = f.service.permanently_delete(&f.tenant, root).await.unwrap();
    assert_eq!(summary.blobs_removed, 2);
    assert_eq!(summary.blobs_failed, 0);
    assert_eq!(f.blob_count().await, 1);

    for id in [root, sub] {
        let err = f.service.get(&f.tenant, id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
    f.service.read_file(&f.tenant, keep.id).await.unwrap();
}

#[tokio::test]
async fn test_sweep_removes_only_orphans() {
    let f = fixture().await;
    let kept = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("kept.txt", "k"))
        .await
        .unwrap();
    let orphan_key = format!("{}/{}", blob_prefix(&f.tenant.schema), NodeId::new());
    f.blobs.write(&orphan_key, Bytes::from("o")).await.unwrap();
    f.blobs
        .write(&format!("{}/notes", blob_prefix(&f.tenant.schema)), Bytes::from("n"))
        .await
        .unwrap();

    // Fresh blobs are inside the grace period.
    let removed = f
        .service
        .sweep_orphaned_blobs(&f.tenant, Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let removed = f
        .service
        .sweep_orphaned_blobs(&f.tenant, Duration::seconds(-60))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!f.blobs.exists(&orphan_key).await.unwrap());
    assert!(f.blobs.exists(&kept.blob_key(&f.tenant.schema)).await.unwrap());
}

#[tokio::test]
async fn test_tenants_do_not_share_nodes_or_blobs() {
    let f = fixture().await;
    let other = tenant("zuid");
    let node = f
        .service
        .upload_file(&f.tenant, None, UploadItem::new("a.txt", "a"))
        .await
        .unwrap();

    let err = f.service.get(&other, node.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    f.service
        .upload_file(&other, None, UploadItem::new("a.txt", "b"))
        .await
        .unwrap();

    let removed = f
        .service
        .sweep_orphaned_blobs(&other, Duration::seconds(-60))
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(f.blob_count().await, 1);
}
