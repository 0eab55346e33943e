use std::sync::Arc;
use std::time::Duration;

use bulkdrop::chunk_store::ChunkStore;
use bulkdrop::reaper::SessionReaper;
use bulkdrop::session::SessionRegistry;

#[tokio::test]
async fn test_sweep_expires_idle_sessions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let chunks = ChunkStore::new(temp_dir.path());

    registry.create_if_absent("idle", 3, "a.bin", "a.bin");
    chunks.write_chunk("idle", 1, b"aaaa").await.unwrap();
    registry.mark_chunk_received("idle", 1).unwrap();

    let reaper = SessionReaper::new(
        registry.clone(),
        chunks.clone(),
        Duration::ZERO,
        Duration::from_secs(3600),
    );

    assert_eq!(reaper.sweep().await, 1);
    assert!(registry.get("idle").is_none());
    assert!(!temp_dir.path().join(".chunks/idle").exists());

    // the id is dead for good
    assert!(registry
        .mark_chunk_received("idle", 2)
        .is_err());
    assert_eq!(reaper.sweep().await, 0);
}

#[tokio::test]
async fn test_sweep_leaves_fresh_sessions_alone() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let chunks = ChunkStore::new(temp_dir.path());

    registry.create_if_absent("fresh", 3, "a.bin", "a.bin");
    chunks.write_chunk("fresh", 1, b"aaaa").await.unwrap();

    let reaper = SessionReaper::new(
        registry.clone(),
        chunks.clone(),
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );

    assert_eq!(reaper.sweep().await, 0);
    assert!(registry.get("fresh").is_some());
    assert!(temp_dir.path().join(".chunks/fresh/chunk_1").exists());
}

#[tokio::test]
async fn test_background_loop_sweeps_on_interval() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let chunks = ChunkStore::new(temp_dir.path());

    registry.create_if_absent("idle", 1, "a.bin", "a.bin");

    let handle = SessionReaper::new(
        registry.clone(),
        chunks.clone(),
        Duration::ZERO,
        Duration::from_millis(20),
    )
    .start();

    // give the loop a couple of ticks
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.get("idle").is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reaper never expired the idle session");

    handle.stop().await;
}

#[tokio::test]
async fn test_stop_without_any_sweep() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let chunks = ChunkStore::new(temp_dir.path());

    let handle = SessionReaper::new(
        registry,
        chunks,
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    )
    .start();

    // stopping before the first tick must not hang
    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("reaper did not stop promptly");
}
