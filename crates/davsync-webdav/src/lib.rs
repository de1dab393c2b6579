//! davsync WebDAV - remote store over WebDAV
//!
//! Provides:
//! - A thin async WebDAV client (PROPFIND, GET, PUT, MKCOL, DELETE, PROPPATCH)
//! - A `multistatus` response parser
//! - [`WebDavStore`](store::WebDavStore), the remote [`FileStore`](davsync_core::ports::FileStore)
//!
//! ## Modules
//!
//! - [`client`] - HTTP client bound to a server and a root collection
//! - [`multistatus`] - PROPFIND response parsing
//! - [`store`] - `FileStore` implementation

pub mod client;
pub mod multistatus;
pub mod store;

pub use client::DavClient;
pub use store::WebDavStore;

use davsync_core::ports::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to a WebDAV server
#[derive(Debug, Error)]
pub enum WebDavError {
    /// Credentials were refused
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other unexpected status
    #[error("Unexpected status {status} for {path}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Target path
        path: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A path that cannot be turned into a request URL
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The server URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response body was not a usable multistatus document
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An extension method name was rejected by the HTTP stack
    #[error("Unsupported method: {0}")]
    Method(String),
}

impl WebDavError {
    /// Maps an unsuccessful status to an error for `path`
    pub fn from_status(status: StatusCode, path: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => WebDavError::Unauthorized(path.to_string()),
            StatusCode::FORBIDDEN => WebDavError::Forbidden(path.to_string()),
            StatusCode::NOT_FOUND => WebDavError::NotFound(path.to_string()),
            other => WebDavError::Status {
                status: other.as_u16(),
                path: path.to_string(),
            },
        }
    }
}

impl From<WebDavError> for StoreError {
    fn from(err: WebDavError) -> Self {
        match err {
            WebDavError::NotFound(path) => StoreError::NotFound(path),
            WebDavError::Unauthorized(path) => {
                StoreError::Unavailable(format!("credentials refused for {path}"))
            }
            WebDavError::Network(e) => StoreError::Unavailable(e.to_string()),
            WebDavError::Forbidden(path) => StoreError::Rejected { status: 403, path },
            WebDavError::Status { status, path } => StoreError::Rejected { status, path },
            WebDavError::InvalidPath(path) => StoreError::InvalidPath(path),
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}
