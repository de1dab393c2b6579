//! WebDAV HTTP client
//!
//! Wraps `reqwest::Client` with basic authentication and URL construction
//! for one root collection (`protocol://host/<tenant>/<site>`). All paths
//! taken by this client are root-relative, the same paths the sync engine
//! uses.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use davsync_webdav::client::{DavClient, Depth};
//!
//! # async fn example() -> Result<(), davsync_webdav::WebDavError> {
//! let client = DavClient::new(
//!     "https://my.alfresco.com",
//!     "/example.com/jane-doe-example-com",
//!     "jane.doe@example.com",
//!     Some("secret".to_string()),
//! )?;
//! for entry in client.propfind("/docs", Depth::One).await? {
//!     println!("{}", entry.href);
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use davsync_core::domain::path_segments;
use davsync_core::ports::ByteStream;
use futures_util::Stream;
use percent_encoding::percent_decode_str;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::multistatus::{format_http_date, parse_multistatus, DavEntry};
use crate::WebDavError;

/// Header ownCloud-compatible servers read as the upload's mtime (epoch seconds)
pub const MTIME_HEADER: &str = "X-OC-Mtime";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:displayname/>
    <d:getlastmodified/>
    <d:getcontentlength/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

/// PROPFIND depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The addressed resource only
    Zero,
    /// The resource and its direct members
    One,
}

impl Depth {
    fn as_header(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

// ============================================================================
// DavClient
// ============================================================================

/// HTTP client bound to one WebDAV root collection
pub struct DavClient {
    client: Client,
    base: Url,
    root: String,
    /// Decoded URL path of the root collection, without trailing `/`
    prefix: String,
    username: String,
    password: Option<String>,
}

impl DavClient {
    /// Creates a client for `root` on the server at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - `protocol://host`, optionally with a path prefix
    /// * `root` - Root collection below the base (e.g. `/tenant/site`)
    /// * `username` - Basic auth user (the account email)
    /// * `password` - Basic auth secret
    pub fn new(
        base_url: &str,
        root: &str,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Result<Self, WebDavError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(WebDavError::InvalidPath(base_url.to_string()));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("davsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut this = Self {
            client,
            base,
            root: root.to_string(),
            prefix: String::new(),
            username: username.into(),
            password,
        };

        let root_url = this.url_for("", false)?;
        this.prefix = decode(root_url.path())?.trim_end_matches('/').to_string();

        Ok(this)
    }

    /// The server base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The root collection path this client is bound to
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Builds the URL of a root-relative path
    ///
    /// Segments are percent-encoded individually. Collections get a trailing
    /// `/`.
    ///
    /// # Errors
    /// Returns [`WebDavError::InvalidPath`] for `.` or `..` segments.
    pub fn url_for(&self, path: &str, collection: bool) -> Result<Url, WebDavError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| WebDavError::InvalidPath(self.base.to_string()))?;
            segments.pop_if_empty();
            for segment in path_segments(&self.root).chain(path_segments(path)) {
                if segment == "." || segment == ".." {
                    return Err(WebDavError::InvalidPath(path.to_string()));
                }
                segments.push(segment);
            }
            if collection {
                segments.push("");
            }
        }
        Ok(url)
    }

    /// Maps an `href` from a multistatus response back to a root-relative path
    ///
    /// Accepts absolute-path and full-URL hrefs. The root collection itself
    /// maps to `""`.
    pub fn relative_path(&self, href: &str) -> Result<String, WebDavError> {
        let raw = if href.starts_with('/') {
            href.to_string()
        } else {
            Url::parse(href)?.path().to_string()
        };
        let decoded = decode(&raw)?;

        let rest = decoded
            .strip_prefix(self.prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| WebDavError::InvalidResponse(format!("href outside root: {href}")))?;

        Ok(rest.trim_end_matches('/').to_string())
    }

    /// Creates an authenticated request builder for the given method and URL
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, self.password.as_deref())
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Lists properties of `path` (and its members for [`Depth::One`])
    #[tracing::instrument(skip(self), fields(root = %self.root))]
    pub async fn propfind(&self, path: &str, depth: Depth) -> Result<Vec<DavEntry>, WebDavError> {
        let url = self.url_for(path, true)?;
        let response = self
            .request(dav_method("PROPFIND")?, url)
            .header("Depth", depth.as_header())
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await?;
        let response = check(response, path)?;

        if response.status() != StatusCode::MULTI_STATUS {
            return Err(WebDavError::InvalidResponse(format!(
                "PROPFIND {path} answered {} instead of 207",
                response.status()
            )));
        }

        let body = response.text().await?;
        let entries = parse_multistatus(&body)?;
        debug!(path, entries = entries.len(), "PROPFIND complete");
        Ok(entries)
    }

    /// Starts a download of the file at `path`
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<Response, WebDavError> {
        let url = self.url_for(path, false)?;
        let response = self.request(Method::GET, url).send().await?;
        check(response, path)
    }

    /// Uploads `content` to `path`, announcing `modified` through [`MTIME_HEADER`]
    #[tracing::instrument(skip(self, content))]
    pub async fn put(
        &self,
        path: &str,
        content: ByteStream,
        size: u64,
        modified: DateTime<Utc>,
    ) -> Result<(), WebDavError> {
        let url = self.url_for(path, false)?;
        let response = self
            .request(Method::PUT, url)
            .header(CONTENT_LENGTH, size)
            .header(MTIME_HEADER, modified.timestamp().to_string())
            .body(Body::wrap_stream(SyncStream::new(content)))
            .send()
            .await?;
        check(response, path)?;
        debug!(path, size, "PUT complete");
        Ok(())
    }

    /// Creates the collection at `path`
    ///
    /// A 405 answer means the collection already exists and counts as success.
    #[tracing::instrument(skip(self))]
    pub async fn mkcol(&self, path: &str) -> Result<(), WebDavError> {
        let url = self.url_for(path, true)?;
        let response = self.request(dav_method("MKCOL")?, url).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(path, "Collection already exists");
            return Ok(());
        }
        check(response, path)?;
        Ok(())
    }

    /// Deletes the resource at `path` (collections recursively)
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, path: &str, collection: bool) -> Result<(), WebDavError> {
        let url = self.url_for(path, collection)?;
        let response = self.request(Method::DELETE, url).send().await?;
        check(response, path)?;
        Ok(())
    }

    /// Sets `getlastmodified` on `path`
    ///
    /// Many servers treat this property as protected and refuse it inside a
    /// 207 response, so callers should treat failure as non-fatal.
    #[tracing::instrument(skip(self))]
    pub async fn proppatch_lastmodified(
        &self,
        path: &str,
        collection: bool,
        modified: DateTime<Utc>,
    ) -> Result<(), WebDavError> {
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<d:propertyupdate xmlns:d="DAV:">
  <d:set><d:prop><d:getlastmodified>{}</d:getlastmodified></d:prop></d:set>
</d:propertyupdate>"#,
            format_http_date(modified)
        );

        let url = self.url_for(path, collection)?;
        let response = self
            .request(dav_method("PROPPATCH")?, url)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body)
            .send()
            .await?;
        check(response, path)?;
        Ok(())
    }

    /// Verifies the server is reachable and accepts the credentials
    ///
    /// Issues a `Depth: 0` PROPFIND on the root collection.
    pub async fn check(&self) -> Result<(), WebDavError> {
        match self.propfind("", Depth::Zero).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(root = %self.root, error = %e, "WebDAV root not reachable");
                Err(e)
            }
        }
    }
}

fn dav_method(name: &str) -> Result<Method, WebDavError> {
    Method::from_bytes(name.as_bytes()).map_err(|_| WebDavError::Method(name.to_string()))
}

fn check(response: Response, path: &str) -> Result<Response, WebDavError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(WebDavError::from_status(status, path))
    }
}

fn decode(raw: &str) -> Result<String, WebDavError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| WebDavError::InvalidResponse(format!("path is not valid UTF-8: {raw}")))
}

// ============================================================================
// Upload body adapter
// ============================================================================

/// Makes a `Send`-only [`ByteStream`] usable as a request body
///
/// `reqwest` requires upload streams to be `Sync`. The stream is only ever
/// polled through `&mut`, so the mutex is never contended.
struct SyncStream(Mutex<ByteStream>);

impl SyncStream {
    fn new(content: ByteStream) -> Self {
        Self(Mutex::new(content))
    }
}

impl Stream for SyncStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = self
            .get_mut()
            .0
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        inner.as_mut().poll_next(cx)
    }
}
