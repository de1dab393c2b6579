//! Full cycles: pull then push

use std::time::Duration;

use davsync_core::ports::FileStore;
use davsync_sync::LocalFileStore;
use tempfile::TempDir;

use crate::common::{engine, MemoryStore};

#[tokio::test]
async fn test_cycle_mirrors_both_ways() {
    let remote = MemoryStore::new("Cloud");
    remote.add_dir("/shared", 10).add_file("/shared/from-remote.txt", 20, b"r");
    let local = MemoryStore::new("Local");
    local.add_file("/from-local.txt", 30, b"l");

    let report = engine().run_full_cycle(&remote, &local).await;

    assert_eq!(report.pull.source, "Cloud");
    assert_eq!(report.pull.files_transferred, 1);
    assert_eq!(report.push.source, "Local");
    assert_eq!(report.push.files_transferred, 1);
    assert_eq!(local.paths(), remote.paths());
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_pull_runs_before_push() {
    // Same file on both sides, remote newer: pull brings it down, and the
    // push that follows sees equal timestamps and leaves the remote alone.
    let remote = MemoryStore::new("Cloud");
    remote.add_file("/doc.txt", 200, b"remote edit");
    let local = MemoryStore::new("Local");
    local.add_file("/doc.txt", 100, b"local copy");

    let report = engine().run_full_cycle(&remote, &local).await;

    assert_eq!(local.content("/doc.txt").unwrap(), b"remote edit");
    assert_eq!(remote.content("/doc.txt").unwrap(), b"remote edit");
    assert!(remote.writes().is_empty());
    assert_eq!(report.push.files_up_to_date, 1);
}

#[tokio::test]
async fn test_local_edit_is_pushed() {
    let remote = MemoryStore::new("Cloud");
    remote.add_file("/doc.txt", 100, b"v1");
    let local = MemoryStore::new("Local");
    local.add_file("/doc.txt", 300, b"v2");

    engine().run_full_cycle(&remote, &local).await;

    assert_eq!(remote.content("/doc.txt").unwrap(), b"v2");
    assert!(local.writes().is_empty());
}

#[tokio::test]
async fn test_deletion_is_not_propagated() {
    let remote = MemoryStore::new("Cloud");
    remote.add_file("/keep.txt", 1, b"k");
    let local = MemoryStore::new("Local");
    let engine = engine();

    engine.run_full_cycle(&remote, &local).await;
    local.remove("/keep.txt");
    engine.run_full_cycle(&remote, &local).await;

    // The next pull restores what was deleted locally.
    assert!(local.get("/keep.txt").is_some());
    assert!(remote.get("/keep.txt").is_some());
}

#[tokio::test]
async fn test_cycle_against_local_disk_converges() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("photos")).unwrap();
    std::fs::write(dir.path().join("photos/cat.jpg"), b"meow").unwrap();

    let remote = MemoryStore::new("Cloud");
    remote.add_dir("/docs", 1_600_000_000_000)
        .add_file("/docs/report.pdf", 1_600_000_000_500, b"%PDF");
    let local = LocalFileStore::new(dir.path());
    let engine = engine();

    let first = engine.run_full_cycle(&remote, &local).await;
    assert!(first.is_clean(), "errors: {:?}", first.pull.errors);
    assert_eq!(first.pull.files_transferred, 1);
    assert_eq!(first.push.files_transferred, 1);

    assert_eq!(std::fs::read(dir.path().join("docs/report.pdf")).unwrap(), b"%PDF");
    assert_eq!(remote.content("/photos/cat.jpg").unwrap(), b"meow");

    let listing = local.list_children("/docs", false).await.unwrap();
    assert_eq!(listing["/docs/report.pdf"].modified(), 1_600_000_000_500);

    let second = engine.run_full_cycle(&remote, &local).await;
    assert_eq!(second.pull.changes() + second.push.changes(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_to_ancestor_is_not_followed() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("a")).unwrap();
    std::fs::write(dir.path().join("a/f.txt"), b"f").unwrap();
    std::os::unix::fs::symlink("..", dir.path().join("a/loop")).unwrap();

    let local = LocalFileStore::new(dir.path());
    let remote = MemoryStore::new("Cloud");

    let report = engine().propagate("", &local, &remote).await;

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(remote.mkdirs(), vec!["/a"]);
    assert_eq!(remote.writes(), vec!["/a/f.txt"]);
    assert!(remote.paths().iter().all(|p| !p.contains("loop")));
}

#[tokio::test]
async fn test_unreachable_remote_is_not_fatal() {
    let remote = MemoryStore::new("Cloud").with_latency(Duration::from_millis(1));
    remote.fail_listing("");
    let local = MemoryStore::new("Local");
    local.add_file("/a", 1, b"a");

    let report = engine().run_full_cycle(&remote, &local).await;

    assert_eq!(report.pull.listing_failures, 1);
    assert_eq!(report.push.listing_failures, 1);
    assert_eq!(report.error_count(), 2);
    assert!(!report.cancelled());
}
