//! Local filesystem store (secondary/driven adapter)
//!
//! Implements [`FileStore`] over a directory tree using `tokio::fs`.
//!
//! ## Design Decisions
//!
//! - **Root binding**: the store owns its root; resource paths are joined
//!   segment by segment and `.`/`..` segments are rejected, so no operation
//!   can reach outside the root.
//! - **Atomic writes**: content goes to a hidden `*.davsync-part` file in the
//!   target directory, gets its mtime stamped, then is renamed over the
//!   target. A crash leaves at most a partial file the exclusion rules skip.
//! - **Timestamps**: modification times are read and written with
//!   `filetime` at millisecond precision.
//! - **Symlinks**: a link to a file is listed as that file. A link to a
//!   directory is skipped, so a link back to an ancestor cannot make a
//!   listing or a sync pass loop.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use davsync_core::{
    domain::{child_path, path_segments, Resource},
    filter::PARTIAL_SUFFIX,
    ports::{ByteStream, FileStore, Listing, StoreError},
};
use filetime::FileTime;
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

// ============================================================================
// LocalFileStore struct
// ============================================================================

/// [`FileStore`] rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a store rooted at `root`. The directory is not required to exist
    /// yet; [`FileStore::is_valid_connection`] reports whether it does.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this store is rooted at
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a root-relative resource path onto the filesystem
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut resolved = self.root.clone();
        for segment in path_segments(path) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

/// Converts an I/O error, keeping "not found" distinguishable
fn map_io(err: std::io::Error, path: &str) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::Io(err)
    }
}

fn millis_of(time: FileTime) -> i64 {
    time.unix_seconds() * 1000 + i64::from(time.nanoseconds() / 1_000_000)
}

fn file_time_of(millis: i64) -> FileTime {
    FileTime::from_unix_time(
        millis.div_euclid(1000),
        (millis.rem_euclid(1000) * 1_000_000) as u32,
    )
}

/// Longest file name most filesystems accept, in bytes
const NAME_MAX: usize = 255;

static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Path of the temporary file a write to `target` goes through
///
/// Names too long to carry the prefix and suffix fall back to a short
/// process-unique name in the same directory.
fn partial_path(target: &Path, name: &str) -> PathBuf {
    let partial = format!(".{name}{PARTIAL_SUFFIX}");
    if partial.len() <= NAME_MAX {
        return target.with_file_name(partial);
    }
    let n = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{}-{n}{PARTIAL_SUFFIX}", std::process::id()))
}

/// Metadata of a directory entry, following a link only when it points at a
/// file. `None` for a link to a directory.
async fn entry_metadata(entry: &tokio::fs::DirEntry) -> std::io::Result<Option<std::fs::Metadata>> {
    if !entry.file_type().await?.is_symlink() {
        return entry.metadata().await.map(Some);
    }
    let target = tokio::fs::metadata(entry.path()).await?;
    Ok((!target.is_dir()).then_some(target))
}

async fn write_partial(tmp: &Path, mut content: ByteStream, modified: i64) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(tmp).await?;
    let mut written = 0u64;
    while let Some(chunk) = content.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    filetime::set_file_mtime(tmp, file_time_of(modified))?;
    Ok(written)
}

// ============================================================================
// FileStore implementation
// ============================================================================

#[async_trait::async_trait]
impl FileStore for LocalFileStore {
    fn name(&self) -> &str {
        "Local"
    }

    async fn is_valid_connection(&self) -> bool {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir(),
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "local root unavailable");
                false
            }
        }
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list_children(&self, path: &str, deep: bool) -> Result<Listing, StoreError> {
        let mut listing = HashMap::new();
        let mut pending = vec![(path.trim_end_matches('/').to_string(), self.resolve(path)?)];

        while let Some((parent, dir)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| map_io(e, &parent))?;

            while let Some(entry) = entries.next_entry().await? {
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(raw) => {
                        warn!(name = ?raw, "skipping entry with non UTF-8 name");
                        continue;
                    }
                };

                let meta = match entry_metadata(&entry).await {
                    Ok(Some(meta)) => meta,
                    Ok(None) => {
                        warn!(name = %name, "skipping symlink to a directory");
                        continue;
                    }
                    Err(e) => {
                        warn!(name = %name, error = %e, "skipping unreadable entry");
                        continue;
                    }
                };

                let child = child_path(&parent, &name);
                let modified = millis_of(FileTime::from_last_modification_time(&meta));
                let resource = if meta.is_dir() {
                    Resource::directory(name, child.clone(), modified)?
                } else {
                    Resource::file(name, child.clone(), modified, meta.len())?
                };

                if deep && meta.is_dir() {
                    pending.push((child.clone(), entry.path()));
                }
                listing.insert(child, resource);
            }
        }

        debug!(count = listing.len(), "listing complete");
        Ok(listing)
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn read_file(&self, resource: &Resource) -> Result<ByteStream, StoreError> {
        let target = self.resolve(resource.path())?;
        let file = tokio::fs::File::open(&target)
            .await
            .map_err(|e| map_io(e, resource.path()))?;
        debug!("file opened for reading");
        Ok(Box::pin(ReaderStream::new(file)))
    }

    #[instrument(skip(self, resource, content), fields(path = %resource.path()))]
    async fn write_file(&self, resource: &Resource, content: ByteStream) -> Result<(), StoreError> {
        let target = self.resolve(resource.path())?;
        if target == self.root {
            return Err(StoreError::InvalidPath(resource.path().to_string()));
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = partial_path(&target, resource.name());
        debug!(tmp = %tmp.display(), "writing to temporary file");

        let written = match write_partial(&tmp, content, resource.modified()).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        };

        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(bytes = written, "write complete");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn create_directory(&self, resource: &Resource) -> Result<(), StoreError> {
        let target = self.resolve(resource.path())?;

        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                debug!("directory already exists");
                return Ok(());
            }
            Ok(_) => {
                return Err(StoreError::Io(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    format!("{} exists and is not a directory", resource.path()),
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tokio::fs::create_dir_all(&target).await?;
        filetime::set_file_mtime(&target, file_time_of(resource.modified()))?;
        debug!("directory created");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(path = %resource.path()))]
    async fn delete_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        let target = self.resolve(resource.path())?;
        if target == self.root {
            return Err(StoreError::InvalidPath(resource.path().to_string()));
        }

        let meta = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| map_io(e, resource.path()))?;

        if meta.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(&target).await?;
        }

        debug!("delete complete");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
