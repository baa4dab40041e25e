//! Integration tests for tenants and tenant isolation.

use memberhub_core::error::ErrorKind;
use memberhub_service::UploadItem;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_create_and_resolve_tenant() {
    let app = TestApp::new().await;
    let tenant = app.tenants.create("vereniging_a", "Vereniging A").await.unwrap();

    let by_schema = app.tenants.resolve("vereniging_a").await.unwrap();
    let by_id = app.tenants.resolve(&tenant.id.to_string()).await.unwrap();
    assert_eq!(by_schema, by_id);
    assert_eq!(by_schema.schema.as_str(), "vereniging_a");
}

#[tokio::test]
async fn test_duplicate_and_invalid_schemas() {
    let app = TestApp::new().await;
    app.tenants.create("noord", "Noord").await.unwrap();

    let err = app.tenants.create("noord", "Noord 2").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    for bad in ["public", "pg_catalog", "Noord", "1club", "club-a"] {
        let err = app.tenants.create(bad, "Bad").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{bad} should be rejected");
    }
    assert_eq!(app.tenants.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_trees_and_blobs_are_isolated() {
    let app = TestApp::new().await;
    let noord = app.tenant("noord").await;
    let zuid = app.tenant("zuid").await;

    let a = app
        .documents
        .upload_file(&noord, None, UploadItem::new("jaarverslag.pdf", &b"noord"[..]))
        .await
        .unwrap();
    let b = app
        .documents
        .upload_file(&zuid, None, UploadItem::new("jaarverslag.pdf", &b"zuid"[..]))
        .await
        .unwrap();

    assert!(app.documents.get(&zuid, a.id).await.is_err());
    let (_, content) = app.documents.read_file(&zuid, b.id).await.unwrap();
    assert_eq!(&content[..], b"zuid");

    assert!(app.path(&format!("media/noord/documents/{}", a.id)).exists());
    assert!(app.path(&format!("media/zuid/documents/{}", b.id)).exists());

    // Sweeping one tenant leaves the other tenant's blobs alone.
    app.documents
        .sweep_orphaned_blobs(&zuid, chrono::Duration::zero())
        .await
        .unwrap();
    assert!(app.path(&format!("media/noord/documents/{}", a.id)).exists());
}
