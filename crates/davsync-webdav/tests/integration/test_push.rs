//! Pushing local files to a mock WebDAV server that keeps whole seconds

use std::sync::Arc;

use davsync_core::filter::ExclusionSet;
use davsync_sync::{LocalFileStore, SyncEngine};
use filetime::FileTime;
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, dav_dir, dav_file};

/// 2023-11-14 22:13:20.123 UTC
const LOCAL_MTIME: FileTime = FileTime::from_unix_time(1_700_000_000, 123_000_000);

fn local_with_file(name: &str, content: &[u8]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join(name);
    std::fs::write(&file, content).unwrap();
    filetime::set_file_mtime(&file, LOCAL_MTIME).unwrap();
    dir
}

#[tokio::test]
async fn test_pushed_file_with_subsecond_mtime_settles() {
    let (server, remote) = common::setup_dav_mock().await;
    common::mount_listing(
        &server,
        "",
        &[
            dav_dir("", "Tue, 14 Nov 2023 22:00:00 GMT"),
            dav_file("/a.txt", 5, "Tue, 14 Nov 2023 22:13:20 GMT"),
        ],
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = local_with_file("a.txt", b"hello");
    let local = LocalFileStore::new(dir.path());
    let engine = SyncEngine::new(Arc::new(ExclusionSet::global()));

    for _ in 0..2 {
        let report = engine.run_full_cycle(&remote, &local).await;
        assert!(report.is_clean(), "errors: {:?}", report);
        assert_eq!(report.pull.files_transferred, 0);
        assert_eq!(report.push.files_transferred, 0);
        assert_eq!(report.push.files_up_to_date, 1);
    }
}

#[tokio::test]
async fn test_newer_local_second_is_pushed() {
    let (server, remote) = common::setup_dav_mock().await;
    common::mount_listing(
        &server,
        "",
        &[
            dav_dir("", "Tue, 14 Nov 2023 22:00:00 GMT"),
            dav_file("/a.txt", 5, "Tue, 14 Nov 2023 22:13:19 GMT"),
        ],
    )
    .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPPATCH"))
        .respond_with(ResponseTemplate::new(207))
        .mount(&server)
        .await;

    let dir = local_with_file("a.txt", b"hello");
    let local = LocalFileStore::new(dir.path());
    let engine = SyncEngine::new(Arc::new(ExclusionSet::global()));

    let report = engine.propagate("", &local, &remote).await;
    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.files_transferred, 1);
}
