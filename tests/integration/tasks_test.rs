//! Integration tests for the task queue and worker.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use memberhub_core::error::ErrorKind;
use memberhub_entity::task::{TaskArgs, TaskStatus};
use memberhub_service::UploadItem;
use memberhub_worker::tasks::{RebuildTheme, SweepOrphanedBlobs};
use memberhub_worker::{NodeResolver, TaskContext, TaskHandler};

use crate::helpers::TestApp;

/// Records the name of the `node` keyword argument as seen at run time.
#[derive(Debug, Default)]
struct SeenNodeName {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TaskHandler for SeenNodeName {
    fn name(&self) -> &str {
        "seen_node_name"
    }

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        let node: serde_json::Value = ctx.kwarg("node")?;
        let name = node["name"].as_str().unwrap_or_default().to_string();
        tracing::info!("Node is called {name}");
        self.seen.lock().unwrap().push(name);
        Ok(())
    }
}

#[tokio::test]
async fn test_unknown_task_is_rejected_without_a_row() {
    let app = TestApp::new().await;
    let t = app.tenant("noord").await;

    let err = app
        .worker
        .queue
        .enqueue(Some(&t), "send_newsletter", TaskArgs::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownTaskType);
    assert!(app.tasks.all().await.is_empty());
}

#[tokio::test]
async fn test_failing_theme_build_is_recorded_as_exception() {
    let app = TestApp::new().await;
    let t = app.tenant("noord").await;

    let task = app
        .worker
        .queue
        .enqueue(Some(&t), RebuildTheme::NAME, TaskArgs::new())
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Queued);

    assert_eq!(app.runner("worker-a").run_batch().await.unwrap(), 1);

    let task = app.worker.queue.find(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Exception);
    assert_eq!(task.worker_id.as_deref(), Some("worker-a"));
    assert!(task.completed_at.is_some());
    assert!(task.output.contains("Task failed with exception"));
    assert!(task.output.contains("Starting theme build"));
}

#[tokio::test]
async fn test_entity_arguments_are_fetched_when_the_task_runs() {
    let handler = Arc::new(SeenNodeName::default());
    let app = TestApp::with_handlers(vec![handler.clone()]).await;
    let t = app.tenant("zuid").await;

    let dir = app
        .documents
        .create_directory(&t, None, "Concept")
        .await
        .unwrap();
    let task = app
        .worker
        .queue
        .enqueue(
            Some(&t),
            "seen_node_name",
            TaskArgs::new().kwarg_entity("node", NodeResolver::reference(dir.id)),
        )
        .await
        .unwrap();

    app.documents.rename(&t, dir.id, "Definitief").await.unwrap();
    app.runner("worker-a").run_batch().await.unwrap();

    assert_eq!(*handler.seen.lock().unwrap(), vec!["Definitief".to_string()]);
    let task = app.worker.queue.find(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.output.contains("Node is called Definitief"));
}

#[tokio::test]
async fn test_sync_mode_runs_the_task_on_enqueue() {
    let handler = Arc::new(SeenNodeName::default());
    let app = TestApp::sync(vec![handler.clone()]).await;
    let t = app.tenant("oost").await;

    let dir = app.documents.create_directory(&t, None, "Leden").await.unwrap();
    let task = app
        .worker
        .queue
        .enqueue(
            Some(&t),
            "seen_node_name",
            TaskArgs::new().kwarg_entity("node", NodeResolver::reference(dir.id)),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.worker_id.as_deref(), Some("sync"));
    assert_eq!(handler.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sweep_task_removes_orphaned_blobs() {
    let app = TestApp::new().await;
    let t = app.tenant("west").await;

    let kept = app
        .documents
        .upload_file(&t, None, UploadItem::new("statuten.pdf", &b"statuten"[..]))
        .await
        .unwrap();
    let orphan = uuid::Uuid::new_v4();
    app.blobs
        .write(&format!("west/documents/{orphan}"), Bytes::from_static(b"lost"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let task = app
        .worker
        .queue
        .enqueue(
            Some(&t),
            SweepOrphanedBlobs::NAME,
            TaskArgs::new().kwarg("grace_minutes", 0).unwrap(),
        )
        .await
        .unwrap();
    app.runner("worker-a").run_batch().await.unwrap();

    let task = app.worker.queue.find(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed, "{}", task.output);
    assert!(task.output.contains("Removed 1 orphaned blobs"));
    assert!(!app.path(&format!("media/west/documents/{orphan}")).exists());
    assert!(app.path(&format!("media/west/documents/{}", kept.id)).exists());
}
