//! Bulk wipe: best-effort deletes, one flush, workflow transitions.

mod common;

use common::*;
use resumind::store::local::{FileKeyValueStore, LocalBlobStore};
use resumind::{
    BlobFile, BlobStore, FsItem, KeyValueStore, WipeCoordinator, WipeState, WipeWorkflow,
    WorkflowError,
};
use std::sync::Arc;

async fn seeded(fail: &[&str]) -> (Arc<FlakyBlobStore>, Arc<CountingKv>, Vec<FsItem>) {
    let blobs = FlakyBlobStore {
        fail_deletes: fail.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    for name in ["a.pdf", "b.pdf", "c.png"] {
        blobs
            .upload(&[BlobFile::new(name, vec![1, 2, 3])])
            .await
            .unwrap();
    }
    let kv = CountingKv::default();
    kv.set("resume:1", "{}").await.unwrap();
    let items = blobs.read_dir("./").await.unwrap();
    (Arc::new(blobs), Arc::new(kv), items)
}

#[tokio::test]
async fn one_failure_does_not_stop_the_wipe() {
    let (blobs, kv, items) = seeded(&["b.pdf"]).await;
    let coordinator = WipeCoordinator::new(blobs.clone(), kv.clone(), "./");

    let report = coordinator.wipe_all(&items).await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, vec![items[1].clone()]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "b.pdf");
    assert!(report.flush_error.is_none());
    assert!(!report.is_clean());

    // every item attempted once, in order
    assert_eq!(
        *blobs.delete_attempts.lock().unwrap(),
        vec!["a.pdf", "b.pdf", "c.png"]
    );
    assert_eq!(kv.flushes(), 1);
    assert!(kv.get("resume:1").await.unwrap().is_none());
}

#[tokio::test]
async fn flush_failure_is_reported_not_raised() {
    let (blobs, _, items) = seeded(&[]).await;
    let kv = Arc::new(CountingKv {
        fail_flush: true,
        ..Default::default()
    });
    let coordinator = WipeCoordinator::new(blobs.clone(), kv.clone(), "./");

    let report = coordinator.wipe_all(&items).await;

    assert_eq!(report.succeeded, 3);
    assert!(report.failed.is_empty());
    assert!(report.flush_error.unwrap().contains("read-only"));
    assert_eq!(kv.flushes(), 1);
    assert!(blobs.inner.is_empty());
}

#[tokio::test]
async fn empty_wipe_still_flushes() {
    let kv = Arc::new(CountingKv::default());
    let coordinator = WipeCoordinator::new(Arc::new(FlakyBlobStore::default()), kv.clone(), "./");
    let report = coordinator.wipe_all(&[]).await;
    assert_eq!(report.succeeded, 0);
    assert_eq!(kv.flushes(), 1);
}

#[tokio::test]
async fn listing_is_fresh_each_time() {
    let (blobs, kv, _) = seeded(&[]).await;
    let coordinator = WipeCoordinator::new(blobs.clone(), kv, "./");
    assert_eq!(coordinator.list_artifacts().await.unwrap().len(), 3);
    blobs.delete("a.pdf").await.unwrap();
    assert_eq!(coordinator.list_artifacts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn workflow_confirm_wipes_and_returns_to_idle() {
    let (blobs, kv, _) = seeded(&["c.png"]).await;
    let coordinator = WipeCoordinator::new(blobs.clone(), kv.clone(), "./");
    let workflow = WipeWorkflow::new();

    assert!(matches!(
        workflow.confirm(&coordinator).await,
        Err(WorkflowError::InvalidTransition {
            state: WipeState::Idle,
            ..
        })
    ));
    assert_eq!(kv.flushes(), 0);

    workflow.request().unwrap();
    let report = workflow.confirm(&coordinator).await.unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(workflow.state(), WipeState::Idle);
}

#[tokio::test]
async fn workflow_cancel_has_no_side_effects() {
    let (blobs, kv, _) = seeded(&[]).await;
    let workflow = WipeWorkflow::new();
    workflow.request().unwrap();
    workflow.cancel().unwrap();
    assert_eq!(workflow.state(), WipeState::Idle);
    assert!(blobs.delete_attempts.lock().unwrap().is_empty());
    assert_eq!(kv.flushes(), 0);
}

#[tokio::test]
async fn local_stores_wipe_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(LocalBlobStore::new(dir.path().join("files")));
    let kv = Arc::new(FileKeyValueStore::new(dir.path().join("kv.json")));
    blobs
        .upload(&[BlobFile::new("resume.pdf", b"%PDF".to_vec())])
        .await
        .unwrap();
    blobs
        .upload(&[BlobFile::new("resume.png", vec![0u8; 2048])])
        .await
        .unwrap();
    kv.set("resume:1", "\"x\"").await.unwrap();

    let coordinator = WipeCoordinator::new(blobs.clone(), kv.clone(), "./");
    let items = coordinator.list_artifacts().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(resumind::format_size(items[1].size), "2 KB");

    let report = coordinator.wipe_all(&items).await;
    assert!(report.is_clean());
    assert!(coordinator.list_artifacts().await.unwrap().is_empty());
    assert!(kv.list("").await.unwrap().is_empty());
}
