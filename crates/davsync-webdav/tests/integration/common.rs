//! Shared helpers for WebDAV integration tests
//!
//! Builds multistatus bodies and mounts PROPFIND/GET endpoints on a wiremock
//! server. Every store returned here is rooted at [`ROOT`].

use davsync_webdav::{DavClient, WebDavStore};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Root collection (`/<tenant>/<site>`) used by every test store
pub const ROOT: &str = "/acme.com/jane-doe-acme-com";

/// Starts a mock server and returns a store pointing at it.
pub async fn setup_dav_mock() -> (MockServer, WebDavStore) {
    let server = MockServer::start().await;
    let client = DavClient::new(
        &server.uri(),
        ROOT,
        "jane.doe@acme.com",
        Some("secret".to_string()),
    )
    .expect("client");
    (server, WebDavStore::new(client))
}

/// A `<response>` for a collection
pub fn dav_dir(rel: &str, modified: &str) -> String {
    format!(
        r#"<d:response>
  <d:href>{ROOT}{rel}/</d:href>
  <d:propstat>
    <d:prop>
      <d:getlastmodified>{modified}</d:getlastmodified>
      <d:resourcetype><d:collection/></d:resourcetype>
    </d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

/// A `<response>` for a file
pub fn dav_file(rel: &str, size: u64, modified: &str) -> String {
    format!(
        r#"<d:response>
  <d:href>{ROOT}{rel}</d:href>
  <d:propstat>
    <d:prop>
      <d:getlastmodified>{modified}</d:getlastmodified>
      <d:getcontentlength>{size}</d:getcontentlength>
      <d:resourcetype/>
    </d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"#
    )
}

pub fn multistatus(responses: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
{}
</d:multistatus>"#,
        responses.join("\n")
    )
}

/// Mounts a `Depth: 1` PROPFIND answer for the collection at `rel`.
///
/// `rel` is the URL path below [`ROOT`], already percent-encoded.
pub async fn mount_listing(server: &MockServer, rel: &str, responses: &[String]) {
    Mock::given(method("PROPFIND"))
        .and(path(format!("{ROOT}{rel}/")))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(responses)))
        .mount(server)
        .await;
}

/// Mounts a GET endpoint for a file.
pub async fn mount_download(server: &MockServer, rel: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("{ROOT}{rel}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}
