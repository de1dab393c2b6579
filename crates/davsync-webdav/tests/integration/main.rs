//! Integration tests for davsync-webdav
//!
//! Uses wiremock to simulate a WebDAV server and verifies the `FileStore`
//! behaviour of `WebDavStore`, including a full pull into a local directory and push settling.

mod common;

mod test_push;
mod test_transfer;
