//! Integration tests for the document tree and its trash.

use bytes::Bytes;

use memberhub_core::error::ErrorKind;
use memberhub_core::types::sorting::SortField;
use memberhub_entity::node::BreadcrumbRoot;
use memberhub_service::{RestoreDestination, UploadItem};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_trash_and_restore_into_nearest_live_ancestor() {
    let app = TestApp::new().await;
    let t = app.tenant("noord").await;
    let docs = &app.documents;

    let bestuur = docs.create_directory(&t, None, "Bestuur").await.unwrap();
    let notulen = docs.create_directory(&t, Some(bestuur.id), "Notulen").await.unwrap();
    let file = docs
        .upload_file(&t, Some(notulen.id), UploadItem::new("2024-03.txt", &b"agenda"[..]))
        .await
        .unwrap();

    docs.trash(&t, file.id).await.unwrap();
    docs.trash(&t, notulen.id).await.unwrap();

    let trash = docs.list_trash(&t, &[SortField::asc("name")]).await.unwrap();
    let names: Vec<&str> = trash.iter().map(|e| e.node.name.as_str()).collect();
    assert_eq!(names, vec!["Notulen", "2024-03.txt"]);

    let crumbs = docs.breadcrumbs(&t, file.id).await.unwrap();
    assert_eq!(crumbs.root, BreadcrumbRoot::Trashcan);

    // The file's own parent is trashed, so the proposal skips to Bestuur.
    let target = docs.restore_target(&t, file.id).await.unwrap();
    assert_eq!(target.map(|n| n.id), Some(bestuur.id));

    let restored = docs
        .restore(&t, file.id, RestoreDestination::Proposed)
        .await
        .unwrap();
    assert_eq!(restored.parent_id, Some(bestuur.id));
    assert!(!docs.is_in_trash(&t, file.id).await.unwrap());
    assert_eq!(
        docs.breadcrumbs(&t, file.id).await.unwrap().display_path(),
        "Documents / Bestuur / 2024-03.txt"
    );
}

#[tokio::test]
async fn test_restore_into_occupied_name_is_a_collision() {
    let app = TestApp::new().await;
    let t = app.tenant("zuid").await;
    let docs = &app.documents;

    let first = docs.create_directory(&t, None, "Archief").await.unwrap();
    docs.trash(&t, first.id).await.unwrap();
    // The name is free again once the first directory is in the trash.
    docs.create_directory(&t, None, "Archief").await.unwrap();

    let err = docs
        .restore(&t, first.id, RestoreDestination::TopLevel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);
    assert!(docs.is_in_trash(&t, first.id).await.unwrap());
}

#[tokio::test]
async fn test_permanent_delete_removes_subtree_and_blobs() {
    let app = TestApp::new().await;
    let t = app.tenant("oost").await;
    let docs = &app.documents;

    let dir = docs.create_directory(&t, None, "Foto's").await.unwrap();
    let summary = docs
        .upload_files(
            &t,
            Some(dir.id),
            vec![
                UploadItem::new("a.jpg", Bytes::from_static(b"a")),
                UploadItem::new("b.jpg", Bytes::from_static(b"b")),
                UploadItem::new("a.jpg", Bytes::from_static(b"again")),
            ],
        )
        .await
        .unwrap();
    assert_eq!(summary.uploaded.len(), 2);
    assert_eq!(summary.failed_names(), vec!["a.jpg"]);

    let listing = docs
        .list_children(&t, None, &[SortField::asc("name")], false)
        .await
        .unwrap();
    assert_eq!(listing[0].live_children, Some(2));

    let deleted = docs.permanently_delete(&t, dir.id).await.unwrap();
    assert_eq!(deleted.blobs_removed, 2);
    assert_eq!(deleted.blobs_failed, 0);
    for node in &summary.uploaded {
        assert!(docs.get(&t, node.id).await.is_err());
        assert!(!app.path(&format!("media/oost/documents/{}", node.id)).exists());
    }
}

#[tokio::test]
async fn test_move_rules() {
    let app = TestApp::new().await;
    let t = app.tenant("west").await;
    let docs = &app.documents;

    let a = docs.create_directory(&t, None, "A").await.unwrap();
    let b = docs.create_directory(&t, Some(a.id), "B").await.unwrap();
    let f = docs
        .upload_file(&t, None, UploadItem::new("B", &b"x"[..]))
        .await
        .unwrap();

    let err = docs.move_node(&t, a.id, Some(b.id)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidMove);

    let err = docs.move_node(&t, b.id, Some(f.id)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidMove);

    let err = docs.move_node(&t, b.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NameCollision);

    let moved = docs.move_node(&t, f.id, Some(a.id)).await.unwrap();
    assert_eq!(moved.parent_id, Some(a.id));
}

#[tokio::test]
async fn test_upload_size_limit() {
    let app = TestApp::new().await;
    let t = app.tenant("groot").await;

    let too_big = vec![0u8; app.config.storage.max_upload_size_bytes as usize + 1];
    let err = app
        .documents
        .upload_file(&t, None, UploadItem::new("big.bin", too_big))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(app.blobs.list("groot/documents").await.unwrap().is_empty());
}
