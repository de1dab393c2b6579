//! Store port (driven/secondary port)
//!
//! [`FileStore`] is the capability set every storage backend exposes so the
//! sync engine can run identically against local disk and a WebDAV server.
//!
//! ## Design Notes
//!
//! - Every operation is fallible through [`StoreError`]. A failed listing
//!   means "no information" and must never be read as an empty directory.
//! - Content moves as a [`ByteStream`] so large files are never buffered
//!   whole in memory.
//! - Stores are bound to their root at construction; all paths crossing this
//!   port are root-relative (see [`Resource`]).

use std::collections::HashMap;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{stream, Stream, TryStreamExt};
use thiserror::Error;

use crate::domain::{DomainError, Resource};

/// Streamed file content
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Result of a listing, keyed by each child's own root-relative path
pub type Listing = HashMap<String, Resource>;

// ============================================================================
// StoreError
// ============================================================================

/// Errors returned by [`FileStore`] implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed path does not exist on the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend could not be reached (network down, root missing, auth refused)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The path cannot be mapped onto the backend
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The backend answered but refused the operation
    #[error("Rejected with status {status}: {path}")]
    Rejected {
        /// Backend status code (HTTP status for WebDAV)
        status: u16,
        /// The path the operation targeted
        path: String,
    },

    /// A local I/O error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backend produced an entry that violates a domain invariant
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Any other backend-specific failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

// ============================================================================
// FileStore trait
// ============================================================================

/// Port trait for one tree of resources rooted at a fixed location
///
/// ## Implementation Notes
///
/// - `is_valid_connection` must not fail on ordinary connectivity problems;
///   it reports `false` instead.
/// - `write_file` and `create_directory` stamp the *source* resource's
///   modification time on the destination entry, so later staleness
///   comparisons converge.
/// - `create_directory` is idempotent: an existing directory is not an error.
/// - Timestamps a store reports are only meaningful down to
///   [`FileStore::timestamp_resolution_ms`].
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// Backend label used in logs ("Local", "Cloud")
    fn name(&self) -> &str;

    /// Smallest timestamp step the store can keep, in milliseconds
    ///
    /// A backend that stores whole seconds reports `1000`; comparisons
    /// against it are made at that granularity.
    fn timestamp_resolution_ms(&self) -> i64 {
        1
    }

    /// Performs a lightweight reachability and credential check
    async fn is_valid_connection(&self) -> bool;

    /// Lists the children of `path` (the whole subtree when `deep`)
    ///
    /// # Arguments
    /// * `path` - Root-relative directory path, `""` for the root
    /// * `deep` - Whether to descend into subdirectories
    async fn list_children(&self, path: &str, deep: bool) -> Result<Listing, StoreError>;

    /// Opens a content stream for a file resource
    async fn read_file(&self, resource: &Resource) -> Result<ByteStream, StoreError>;

    /// Writes `content` at `resource.path()` and stamps `resource.modified()`
    async fn write_file(&self, resource: &Resource, content: ByteStream) -> Result<(), StoreError>;

    /// Creates the directory at `resource.path()` if absent
    async fn create_directory(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Removes a file, or a directory recursively
    async fn delete_resource(&self, resource: &Resource) -> Result<(), StoreError>;
}

// ============================================================================
// Stream helpers
// ============================================================================

/// Wraps an in-memory buffer as a single-chunk [`ByteStream`]
pub fn byte_stream(data: impl Into<Bytes>) -> ByteStream {
    let chunk: Bytes = data.into();
    Box::pin(stream::once(async move { Ok(chunk) }))
}

/// Drains a [`ByteStream`] into a buffer
pub async fn read_to_end(content: ByteStream) -> io::Result<Vec<u8>> {
    content
        .try_fold(Vec::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(&chunk);
            Ok(buf)
        })
        .await
}
