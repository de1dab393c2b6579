//! Logging store decorator
//!
//! [`LoggingStore`] wraps any [`FileStore`] and traces every call: a `debug!`
//! event before delegating and an `error!` event when the delegate fails.
//! The wrapped store's behaviour is otherwise unchanged.

use std::sync::Arc;

use davsync_core::{
    domain::Resource,
    ports::{ByteStream, FileStore, Listing, StoreError},
};
use tracing::{debug, error, info, warn};

/// Tracing decorator around another store
pub struct LoggingStore {
    inner: Arc<dyn FileStore>,
}

impl LoggingStore {
    pub fn new(inner: Arc<dyn FileStore>) -> Self {
        Self { inner }
    }

    /// Wraps `inner` and returns it ready to share
    pub fn wrap(inner: Arc<dyn FileStore>) -> Arc<dyn FileStore> {
        Arc::new(Self::new(inner))
    }

    fn report<T>(&self, op: &'static str, path: &str, result: Result<T, StoreError>) -> Result<T, StoreError> {
        if let Err(e) = &result {
            error!(store = self.inner.name(), op, path, error = %e, "Store operation failed");
        }
        result
    }
}

#[async_trait::async_trait]
impl FileStore for LoggingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn timestamp_resolution_ms(&self) -> i64 {
        self.inner.timestamp_resolution_ms()
    }

    async fn is_valid_connection(&self) -> bool {
        debug!(store = self.name(), "Checking connection");
        let valid = self.inner.is_valid_connection().await;
        if valid {
            info!(store = self.name(), "Connection is valid");
        } else {
            warn!(store = self.name(), "Connection is not valid");
        }
        valid
    }

    async fn list_children(&self, path: &str, deep: bool) -> Result<Listing, StoreError> {
        debug!(store = self.name(), path, deep, "Listing children");
        let result = self.inner.list_children(path, deep).await;
        self.report("list_children", path, result)
    }

    async fn read_file(&self, resource: &Resource) -> Result<ByteStream, StoreError> {
        debug!(store = self.name(), path = resource.path(), size = resource.size(), "Reading file");
        let result = self.inner.read_file(resource).await;
        self.report("read_file", resource.path(), result)
    }

    async fn write_file(&self, resource: &Resource, content: ByteStream) -> Result<(), StoreError> {
        debug!(
            store = self.name(),
            path = resource.path(),
            modified = resource.modified(),
            "Writing file"
        );
        let result = self.inner.write_file(resource, content).await;
        self.report("write_file", resource.path(), result)
    }

    async fn create_directory(&self, resource: &Resource) -> Result<(), StoreError> {
        debug!(store = self.name(), path = resource.path(), "Creating directory");
        let result = self.inner.create_directory(resource).await;
        self.report("create_directory", resource.path(), result)
    }

    async fn delete_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        debug!(store = self.name(), path = resource.path(), "Deleting resource");
        let result = self.inner.delete_resource(resource).await;
        self.report("delete_resource", resource.path(), result)
    }
}
