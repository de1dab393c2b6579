//! One-directional pass behaviour

use std::sync::Arc;

use davsync_core::filter::{ExclusionSet, MAX_FILE_SIZE};
use davsync_sync::SyncEngine;
use tokio_util::sync::CancellationToken;

use crate::common::{engine, engine_excluding, MemoryStore};

// ============================================================================
// Reference scenarios
// ============================================================================

#[tokio::test]
async fn test_missing_directory_and_file_are_created() {
    let src = MemoryStore::new("src");
    src.add_dir("/docs", 100)
        .add_file("/docs/a.txt", 200, b"0123456789");
    let dst = MemoryStore::new("dst");

    let report = engine().propagate("", &src, &dst).await;

    let docs = dst.get("/docs").expect("directory created");
    assert!(docs.is_directory());
    assert_eq!(docs.modified(), 100);

    let a = dst.get("/docs/a.txt").expect("file transferred");
    assert_eq!(a.modified(), 200);
    assert_eq!(a.size(), 10);
    assert_eq!(dst.content("/docs/a.txt").unwrap(), b"0123456789");

    // The directory exists before the file written into it.
    assert_eq!(dst.mkdirs(), vec!["/docs"]);
    assert_eq!(dst.writes(), vec!["/docs/a.txt"]);
    assert_eq!(report.directories_created, 1);
    assert_eq!(report.files_transferred, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_newer_destination_is_not_overwritten() {
    let src = MemoryStore::new("src");
    src.add_dir("/docs", 100).add_file("/docs/a.txt", 200, b"old");
    let dst = MemoryStore::new("dst");
    dst.add_dir("/docs", 100).add_file("/docs/a.txt", 300, b"new");

    let report = engine().propagate("", &src, &dst).await;

    assert!(dst.writes().is_empty());
    assert_eq!(dst.content("/docs/a.txt").unwrap(), b"new");
    assert_eq!(report.files_up_to_date, 1);
}

#[tokio::test]
async fn test_excluded_directory_hides_its_subtree() {
    let src = MemoryStore::new("src");
    src.add_dir("/.git", 1)
        .add_file("/.git/config", 2, b"[core]")
        .add_dir("/.git/objects", 3)
        .add_file("/.git/objects/ab", 4, b"blob");
    let dst = MemoryStore::new("dst");

    let report = engine_excluding(&[(".git", "vcs")])
        .propagate("", &src, &dst)
        .await;

    assert!(dst.paths().is_empty());
    assert_eq!(report.excluded, 1);
    assert_eq!(report.changes(), 0);
}

#[tokio::test]
async fn test_oversized_file_is_excluded() {
    let src = MemoryStore::new("src");
    src.add_sized_file("/big.bin", 10, 2_147_483_648)
        .add_file("/small.bin", 10, b"ok");
    let dst = MemoryStore::new("dst");

    let report = engine().propagate("", &src, &dst).await;

    assert!(dst.get("/big.bin").is_none());
    assert!(dst.get("/small.bin").is_some());
    assert_eq!(report.excluded, 1);
}

#[tokio::test]
async fn test_file_exactly_at_limit_is_transferred() {
    let src = MemoryStore::new("src");
    src.add_sized_file("/edge.bin", 10, MAX_FILE_SIZE);
    let dst = MemoryStore::new("dst");

    let report = engine().propagate("", &src, &dst).await;

    assert_eq!(report.excluded, 0);
    assert_eq!(dst.writes(), vec!["/edge.bin"]);
}

#[tokio::test]
async fn test_broken_listing_has_no_side_effects() {
    let src = MemoryStore::new("src");
    src.add_dir("/broken", 1).add_file("/broken/x", 2, b"x");
    src.fail_listing("/broken");
    let dst = MemoryStore::new("dst");
    dst.add_dir("/broken", 1);
    dst.fail_listing("/broken");

    let report = engine().propagate("/broken", &src, &dst).await;

    assert!(dst.writes().is_empty());
    assert!(dst.mkdirs().is_empty());
    assert_eq!(report.listing_failures, 1);
    assert_eq!(report.changes(), 0);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_pass_converges_nested_tree() {
    let src = MemoryStore::new("src");
    src.add_file("/root.txt", 5, b"root")
        .add_dir("/a", 10)
        .add_file("/a/one.txt", 11, b"one")
        .add_dir("/a/b", 12)
        .add_file("/a/b/two.txt", 13, b"two")
        .add_dir("/empty", 14);
    let dst = MemoryStore::new("dst");

    engine().propagate("", &src, &dst).await;

    assert_eq!(dst.paths(), src.paths());
    for path in src.paths() {
        let (s, d) = (src.get(&path).unwrap(), dst.get(&path).unwrap());
        assert_eq!(s.modified(), d.modified(), "mtime of {path}");
        assert_eq!(s.is_directory(), d.is_directory(), "kind of {path}");
        assert_eq!(src.content(&path), dst.content(&path), "content of {path}");
    }
}

#[tokio::test]
async fn test_equal_timestamps_count_as_in_sync() {
    let src = MemoryStore::new("src");
    src.add_file("/same.txt", 500, b"source");
    let dst = MemoryStore::new("dst");
    dst.add_file("/same.txt", 500, b"destination");

    engine().propagate("", &src, &dst).await;

    assert!(dst.writes().is_empty());
    assert_eq!(dst.content("/same.txt").unwrap(), b"destination");
}

#[tokio::test]
async fn test_older_destination_is_replaced() {
    let src = MemoryStore::new("src");
    src.add_file("/doc.txt", 900, b"fresh");
    let dst = MemoryStore::new("dst");
    dst.add_file("/doc.txt", 100, b"stale");

    engine().propagate("", &src, &dst).await;

    assert_eq!(dst.content("/doc.txt").unwrap(), b"fresh");
    assert_eq!(dst.get("/doc.txt").unwrap().modified(), 900);
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let src = MemoryStore::new("src");
    src.add_dir("/d", 1)
        .add_file("/d/f", 2, b"f")
        .add_file("/g", 3, b"g");
    let dst = MemoryStore::new("dst");
    let engine = engine();

    let first = engine.propagate("", &src, &dst).await;
    assert_eq!(first.changes(), 3);

    let second = engine.propagate("", &src, &dst).await;
    assert_eq!(second.changes(), 0);
    assert_eq!(second.files_up_to_date, 2);
    assert_eq!(dst.writes().len(), 2);
    assert_eq!(dst.mkdirs().len(), 1);
}

#[tokio::test]
async fn test_whole_second_destination_settles_after_one_copy() {
    let local = MemoryStore::new("Local");
    local.add_file("/a.txt", 1_700_000_000_123, b"hello");
    let remote = MemoryStore::new("Cloud").with_resolution(1000);
    let engine = engine();

    let first = engine.propagate("", &local, &remote).await;
    assert_eq!(first.files_transferred, 1);
    assert_eq!(remote.get("/a.txt").unwrap().modified(), 1_700_000_000_000);

    let second = engine.propagate("", &local, &remote).await;
    assert_eq!(second.changes(), 0);
    assert_eq!(second.files_up_to_date, 1);

    let back = engine.propagate("", &remote, &local).await;
    assert_eq!(back.changes(), 0);
    assert_eq!(remote.writes().len(), 1);
    assert!(local.writes().is_empty());
}

#[tokio::test]
async fn test_newer_second_still_wins_against_whole_second_store() {
    let local = MemoryStore::new("Local");
    local.add_file("/a.txt", 1_700_000_001_001, b"edited");
    let remote = MemoryStore::new("Cloud").with_resolution(1000);
    remote.add_file("/a.txt", 1_700_000_000_000, b"old");

    let report = engine().propagate("", &local, &remote).await;

    assert_eq!(report.files_transferred, 1);
    assert_eq!(remote.content("/a.txt").unwrap(), b"edited");
}

#[tokio::test]
async fn test_listing_failure_is_contained_to_its_subtree() {
    let src = MemoryStore::new("src");
    src.add_dir("/a", 1)
        .add_file("/a/ok.txt", 1, b"a")
        .add_dir("/broken", 1)
        .add_file("/broken/lost.txt", 1, b"lost")
        .add_dir("/broken/deeper", 1)
        .add_dir("/c", 1)
        .add_file("/c/ok.txt", 1, b"c");
    src.fail_listing("/broken");
    let dst = MemoryStore::new("dst");

    let report = engine().propagate("", &src, &dst).await;

    assert!(dst.get("/a/ok.txt").is_some());
    assert!(dst.get("/c/ok.txt").is_some());
    assert!(dst.get("/broken/lost.txt").is_none());
    assert!(dst.get("/broken/deeper").is_none());
    assert_eq!(report.listing_failures, 1);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_failed_root_listing_does_nothing() {
    let src = MemoryStore::new("src");
    src.add_file("/f", 1, b"f");
    let dst = MemoryStore::new("dst");
    dst.fail_listing("");

    let report = engine().propagate("", &src, &dst).await;

    assert!(dst.paths().is_empty());
    assert_eq!(report.listing_failures, 1);
}

#[tokio::test]
async fn test_transfer_failure_does_not_stop_siblings() {
    let src = MemoryStore::new("src");
    src.add_file("/a.txt", 1, b"a")
        .add_file("/b.txt", 1, b"b")
        .add_file("/c.txt", 1, b"c");
    let dst = MemoryStore::new("dst");
    dst.fail_write("/b.txt");

    let report = engine().propagate("", &src, &dst).await;

    assert_eq!(dst.writes(), vec!["/a.txt", "/c.txt"]);
    assert_eq!(report.files_transferred, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("/b.txt"));
}

#[tokio::test]
async fn test_excluded_name_nested_anywhere() {
    let src = MemoryStore::new("src");
    src.add_dir("/proj", 1)
        .add_file("/proj/main.rs", 1, b"fn main() {}")
        .add_file("/proj/main.rs.tmp", 1, b"scratch")
        .add_dir("/proj/node_modules", 1)
        .add_file("/proj/node_modules/pkg.js", 1, b"x");
    let dst = MemoryStore::new("dst");

    let report = engine_excluding(&[(r".*\.tmp", "temp"), ("node_modules", "deps")])
        .propagate("", &src, &dst)
        .await;

    assert_eq!(dst.paths(), vec!["/proj", "/proj/main.rs"]);
    assert_eq!(report.excluded, 2);
}

#[tokio::test]
async fn test_global_exclusions_apply() {
    let src = MemoryStore::new("src");
    src.add_file("/.DS_Store", 1, b"junk")
        .add_file("/notes.txt", 1, b"keep");
    let dst = MemoryStore::new("dst");

    SyncEngine::new(Arc::new(ExclusionSet::global()))
        .propagate("", &src, &dst)
        .await;

    assert_eq!(dst.paths(), vec!["/notes.txt"]);
}

#[tokio::test]
async fn test_very_deep_tree_does_not_recurse() {
    let src = MemoryStore::new("src");
    let mut path = String::new();
    for depth in 0..500 {
        path.push_str(&format!("/d{depth}"));
        src.add_dir(&path, 1);
    }
    src.add_file(&format!("{path}/leaf.txt"), 1, b"leaf");
    let dst = MemoryStore::new("dst");

    let report = engine().propagate("", &src, &dst).await;

    assert_eq!(report.directories_created, 500);
    assert_eq!(dst.content(&format!("{path}/leaf.txt")).unwrap(), b"leaf");
}

#[tokio::test]
async fn test_existing_directory_is_still_descended() {
    let src = MemoryStore::new("src");
    src.add_dir("/d", 1).add_file("/d/new.txt", 1, b"n");
    let dst = MemoryStore::new("dst");
    dst.add_dir("/d", 1);

    let report = engine().propagate("", &src, &dst).await;

    assert_eq!(report.directories_created, 0);
    assert_eq!(dst.writes(), vec!["/d/new.txt"]);
}

#[tokio::test]
async fn test_cancelled_pass_stops_before_any_change() {
    let src = MemoryStore::new("src");
    src.add_file("/a", 1, b"a");
    let dst = MemoryStore::new("dst");
    let token = CancellationToken::new();
    token.cancel();

    let report = engine()
        .with_cancellation(token)
        .propagate("", &src, &dst)
        .await;

    assert!(report.cancelled);
    assert!(dst.paths().is_empty());
}

#[tokio::test]
async fn test_destination_is_never_pruned() {
    let src = MemoryStore::new("src");
    src.add_file("/kept.txt", 1, b"k");
    let dst = MemoryStore::new("dst");
    dst.add_file("/extra.txt", 1, b"only here");

    engine().propagate("", &src, &dst).await;

    assert_eq!(dst.paths(), vec!["/extra.txt", "/kept.txt"]);
}
