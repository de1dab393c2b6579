//! WebDAV store (secondary/driven adapter)
//!
//! Implements [`FileStore`] on top of [`DavClient`].
//!
//! ## Design Decisions
//!
//! - **Listings**: one `Depth: 1` PROPFIND per directory; deep listings walk
//!   the tree with a worklist. The collection itself, which every server
//!   echoes in its own PROPFIND response, is dropped.
//! - **Names**: a child's name is taken from its decoded `href`, not from
//!   `displayname`, because the href is what addresses it.
//! - **Timestamps**: a missing `getlastmodified` reads as epoch 0, so the
//!   other side always counts as newer. Writes announce the source mtime
//!   with `X-OC-Mtime` and follow up with a best-effort PROPPATCH.

use std::io;

use davsync_core::{
    config::RemoteConfig,
    domain::{child_path, path_segments, Resource},
    ports::{ByteStream, FileStore, Listing, StoreError},
};
use futures_util::TryStreamExt;
use tracing::{debug, info, instrument, warn};

use crate::client::{DavClient, Depth};
use crate::multistatus::DavEntry;
use crate::WebDavError;

/// [`FileStore`] over a WebDAV root collection
pub struct WebDavStore {
    client: DavClient,
}

impl WebDavStore {
    pub fn new(client: DavClient) -> Self {
        Self { client }
    }

    /// Builds a store from the `remote` configuration section
    ///
    /// # Errors
    /// Fails when tenant or site cannot be derived, or the server URL is
    /// invalid.
    pub fn from_config(remote: &RemoteConfig) -> Result<Self, WebDavError> {
        let root = remote.root_path().ok_or_else(|| {
            WebDavError::InvalidPath(format!(
                "cannot derive tenant and site from email '{}'",
                remote.email
            ))
        })?;
        let client = DavClient::new(&remote.base_url(), &root, &remote.email, remote.secret())?;
        info!(base = %client.base_url(), root = %root, "WebDAV store configured");
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &DavClient {
        &self.client
    }

    /// Turns one multistatus entry below `dir` into a resource
    ///
    /// Returns `None` for the collection itself and for anything that is not
    /// a direct member of `dir`.
    fn to_resource(&self, dir: &str, entry: &DavEntry) -> Result<Option<Resource>, StoreError> {
        let path = self.client.relative_path(&entry.href)?;
        let Some((parent, name)) = path.rsplit_once('/') else {
            return Ok(None);
        };
        if name.is_empty() || parent != dir.trim_end_matches('/') {
            if path != dir.trim_end_matches('/') {
                debug!(href = %entry.href, dir, "Ignoring entry outside listed collection");
            }
            return Ok(None);
        }

        let modified = entry
            .last_modified
            .map(|at| at.timestamp_millis())
            .unwrap_or(0);
        let resource = Resource::new(
            name,
            child_path(dir, name),
            modified,
            entry.is_collection,
            entry.content_length.unwrap_or(0),
        )?;
        Ok(Some(resource))
    }

    async fn stamp(&self, resource: &Resource) {
        let Some(at) = resource.modified_at() else {
            return;
        };
        if let Err(e) = self
            .client
            .proppatch_lastmodified(resource.path(), resource.is_directory(), at)
            .await
        {
            debug!(path = %resource.path(), error = %e, "Server kept its own modification time");
        }
    }
}

fn ensure_not_root(path: &str) -> Result<(), StoreError> {
    if path_segments(path).next().is_none() {
        return Err(StoreError::InvalidPath(format!(
            "'{path}' addresses the store root"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl FileStore for WebDavStore {
    fn name(&self) -> &str {
        "Cloud"
    }

    /// `getlastmodified` and `X-OC-Mtime` carry whole seconds
    fn timestamp_resolution_ms(&self) -> i64 {
        1000
    }

    async fn is_valid_connection(&self) -> bool {
        self.client.check().await.is_ok()
    }

    #[instrument(skip(self), fields(root = %self.client.root()))]
    async fn list_children(&self, path: &str, deep: bool) -> Result<Listing, StoreError> {
        let mut listing = Listing::new();
        let mut pending = vec![path.to_string()];

        while let Some(dir) = pending.pop() {
            let entries = self.client.propfind(&dir, Depth::One).await?;
            for entry in &entries {
                let Some(resource) = self.to_resource(&dir, entry)? else {
                    continue;
                };
                if deep && resource.is_directory() {
                    pending.push(resource.path().to_string());
                }
                listing.insert(resource.path().to_string(), resource);
            }
        }

        debug!(path, entries = listing.len(), "Listed remote directory");
        Ok(listing)
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn read_file(&self, resource: &Resource) -> Result<ByteStream, StoreError> {
        let response = self.client.get(resource.path()).await?;
        Ok(Box::pin(response.bytes_stream().map_err(io::Error::other)))
    }

    #[instrument(skip(self, resource, content), fields(path = %resource.path()))]
    async fn write_file(&self, resource: &Resource, content: ByteStream) -> Result<(), StoreError> {
        ensure_not_root(resource.path())?;
        let modified = resource.modified_at().unwrap_or_default();
        self.client
            .put(resource.path(), content, resource.size(), modified)
            .await?;
        self.stamp(resource).await;
        Ok(())
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn create_directory(&self, resource: &Resource) -> Result<(), StoreError> {
        ensure_not_root(resource.path())?;
        self.client.mkcol(resource.path()).await?;
        self.stamp(resource).await;
        Ok(())
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn delete_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        ensure_not_root(resource.path())?;
        self.client
            .delete(resource.path(), resource.is_directory())
            .await
            .map_err(|e| {
                warn!(path = %resource.path(), error = %e, "Remote delete failed");
                StoreError::from(e)
            })
    }
}
