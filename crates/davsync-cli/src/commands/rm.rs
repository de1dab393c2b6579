//! Rm command - delete one resource from either store
//!
//! Sync never propagates deletions, so removing a file everywhere means
//! deleting it on both sides; this command does one side at a time.

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use davsync_core::domain::Resource;
use davsync_core::ports::FileStore;
use serde_json::json;

use super::{local_store, normalize_path, remote_store, CliContext};

/// Delete a file or directory (recursively) from one store
#[derive(Debug, Args)]
pub struct RmCommand {
    /// Path below the sync root
    pub path: String,

    /// Delete on the server instead of the local root
    #[arg(long)]
    pub remote: bool,
}

impl RmCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let path = normalize_path(&self.path);
        if path.is_empty() {
            bail!("Refusing to delete the sync root");
        }

        let store = if self.remote {
            remote_store(&ctx.load_valid_config()?)?
        } else {
            local_store(&ctx.load_config()?)
        };

        let resource = lookup(store.as_ref(), &path).await?;
        store
            .delete_resource(&resource)
            .await
            .with_context(|| format!("Failed to delete {} on {}", path, store.name()))?;

        formatter.print_json(&json!({
            "deleted": resource.path(),
            "directory": resource.is_directory(),
            "store": store.name(),
        }));
        formatter.success(&format!("Deleted {} from {}", resource, store.name()));
        Ok(())
    }
}

/// Finds `path` in its parent's listing, which tells file from directory
async fn lookup(store: &dyn FileStore, path: &str) -> Result<Resource> {
    let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
    let mut listing = store
        .list_children(parent, false)
        .await
        .with_context(|| format!("Failed to list parent of {path} on {}", store.name()))?;
    listing
        .remove(path)
        .ok_or_else(|| anyhow!("{path} does not exist on {}", store.name()))
}
