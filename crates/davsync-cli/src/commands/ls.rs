//! Ls command - list a directory of either store

use anyhow::{Context, Result};
use clap::Args;
use davsync_core::domain::Resource;

use super::{local_store, normalize_path, remote_store, CliContext};
use crate::output::{emit, human_size};

/// List a directory of the local root or the server
#[derive(Debug, Args)]
pub struct LsCommand {
    /// Path below the sync root (defaults to the root)
    #[arg(default_value = "")]
    pub path: String,

    /// List the server instead of the local root
    #[arg(long)]
    pub remote: bool,

    /// Include the whole subtree
    #[arg(long)]
    pub deep: bool,
}

impl LsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let path = normalize_path(&self.path);

        let store = if self.remote {
            remote_store(&ctx.load_valid_config()?)?
        } else {
            local_store(&ctx.load_config()?)
        };

        let listing = store
            .list_children(&path, self.deep)
            .await
            .with_context(|| format!("Failed to list '{}' on {}", display(&path), store.name()))?;

        let mut resources: Vec<Resource> = listing.into_values().collect();
        resources.sort_by(|a, b| a.path().cmp(b.path()));

        emit(formatter.as_ref(), &resources)?;
        formatter.success(&format!(
            "{} entr{} in {}:{}",
            resources.len(),
            if resources.len() == 1 { "y" } else { "ies" },
            store.name(),
            display(&path)
        ));
        for resource in &resources {
            formatter.info(&line(resource));
        }
        Ok(())
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn line(resource: &Resource) -> String {
    let modified = resource
        .modified_at()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    if resource.is_directory() {
        format!("d  {modified}  {:>10}  {}/", "-", resource.path())
    } else {
        format!(
            "-  {modified}  {:>10}  {}",
            human_size(resource.size()),
            resource.path()
        )
    }
}
