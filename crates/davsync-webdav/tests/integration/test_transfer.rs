//! Content transfer and mutations against a mock WebDAV server

use davsync_core::domain::Resource;
use davsync_core::ports::{byte_stream, read_to_end, FileStore, StoreError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, ROOT};

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_read_file_streams_content() {
    let (server, store) = common::setup_dav_mock().await;
    let content: Vec<u8> = (0..262_144).map(|i| (i % 251) as u8).collect();
    common::mount_download(&server, "/big.bin", &content).await;

    let resource = Resource::file("big.bin", "/big.bin", 1, content.len() as u64).unwrap();
    let stream = store.read_file(&resource).await.expect("read");
    let data = read_to_end(stream).await.unwrap();

    assert_eq!(data, content);
}

#[tokio::test]
async fn test_read_missing_file() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resource = Resource::file("x", "/x", 1, 1).unwrap();
    assert!(matches!(
        store.read_file(&resource).await,
        Err(StoreError::NotFound(_))
    ));
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_write_file_announces_mtime() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("PUT"))
        .and(path(format!("{ROOT}/notes/today.txt")))
        .and(header("X-OC-Mtime", "1700000000"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPPATCH"))
        .and(path(format!("{ROOT}/notes/today.txt")))
        .respond_with(ResponseTemplate::new(207).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let resource = Resource::file("today.txt", "/notes/today.txt", 1_700_000_000_000, 5).unwrap();
    store
        .write_file(&resource, byte_stream(&b"hello"[..]))
        .await
        .expect("write");

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    assert_eq!(put.body, b"hello");

    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PROPPATCH")
        .unwrap();
    let body = String::from_utf8_lossy(&patch.body);
    assert!(body.contains("Tue, 14 Nov 2023 22:13:20 GMT"), "{body}");
}

#[tokio::test]
async fn test_refused_proppatch_does_not_fail_write() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("PROPPATCH"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let resource = Resource::file("a", "/a", 1_000, 1).unwrap();
    assert!(store.write_file(&resource, byte_stream(&b"a"[..])).await.is_ok());
}

#[tokio::test]
async fn test_rejected_upload() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(507))
        .mount(&server)
        .await;

    let resource = Resource::file("a", "/a", 1_000, 1).unwrap();
    let err = store
        .write_file(&resource, byte_stream(&b"a"[..]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected { status: 507, .. }));
}

// ============================================================================
// Collections
// ============================================================================

#[tokio::test]
async fn test_create_directory() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("MKCOL"))
        .and(path(format!("{ROOT}/new%20folder/")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPPATCH"))
        .respond_with(ResponseTemplate::new(207).set_body_string(""))
        .mount(&server)
        .await;

    let dir = Resource::directory("new folder", "/new folder", 1_000).unwrap();
    store.create_directory(&dir).await.expect("mkcol");
}

#[tokio::test]
async fn test_existing_directory_is_not_an_error() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("PROPPATCH"))
        .respond_with(ResponseTemplate::new(207).set_body_string(""))
        .mount(&server)
        .await;

    let dir = Resource::directory("docs", "/docs", 1_000).unwrap();
    assert!(store.create_directory(&dir).await.is_ok());
}

#[tokio::test]
async fn test_delete_resource() {
    let (server, store) = common::setup_dav_mock().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{ROOT}/old/")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = Resource::directory("old", "/old", 1).unwrap();
    store.delete_resource(&dir).await.expect("delete");
}

#[tokio::test]
async fn test_root_cannot_be_deleted_or_written() {
    let (server, store) = common::setup_dav_mock().await;

    let root = Resource::directory("root", "/", 1).unwrap();
    assert!(matches!(
        store.delete_resource(&root).await,
        Err(StoreError::InvalidPath(_))
    ));
    assert!(matches!(
        store.create_directory(&root).await,
        Err(StoreError::InvalidPath(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dot_segments_never_reach_the_server() {
    let (server, store) = common::setup_dav_mock().await;

    let escape = Resource::file("passwd", "/../../etc/passwd", 1, 1).unwrap();
    assert!(matches!(
        store.read_file(&escape).await,
        Err(StoreError::InvalidPath(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}
