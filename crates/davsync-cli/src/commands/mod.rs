//! Subcommands and the wiring they share
//!
//! Every command receives a [`CliContext`] carrying the global flags. Stores
//! are built here the same way the daemon builds them, wrapped in
//! [`LoggingStore`] so `-v` shows every store call.

pub mod check;
pub mod config;
pub mod exclusions;
pub mod ls;
pub mod rm;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use davsync_core::{config::Config, domain::path_segments, filter::ExclusionSet, ports::FileStore};
use davsync_sync::{LocalFileStore, LoggingStore};
use davsync_webdav::WebDavStore;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options resolved once in `main`
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CliContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    /// Loads the configuration; a missing file yields the defaults
    pub fn load_config(&self) -> Result<Config> {
        if self.config_path.exists() {
            Config::load(&self.config_path)
                .with_context(|| format!("Failed to load {}", self.config_path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Loads the configuration and refuses to continue when it is invalid
    pub fn load_valid_config(&self) -> Result<Config> {
        let config = self.load_config()?;
        let errors = config.validate();
        if let Some(first) = errors.first() {
            anyhow::bail!(
                "Invalid configuration ({} error(s), first: {}). Run 'davsync config validate'.",
                errors.len(),
                first
            );
        }
        Ok(config)
    }
}

/// Built-in rules merged with the user's exclusion file, if any
pub fn exclusions(config: &Config) -> Result<ExclusionSet> {
    let path = config.sync.exclusions_path();
    let user = ExclusionSet::load_optional(&path)
        .with_context(|| format!("Failed to load exclusions from {}", path.display()))?;
    Ok(ExclusionSet::merged(&ExclusionSet::global(), user.as_ref()))
}

pub fn remote_store(config: &Config) -> Result<Arc<dyn FileStore>> {
    let store = WebDavStore::from_config(&config.remote)
        .context("Failed to configure WebDAV store")?;
    Ok(LoggingStore::wrap(Arc::new(store)))
}

pub fn local_store(config: &Config) -> Arc<dyn FileStore> {
    LoggingStore::wrap(Arc::new(LocalFileStore::new(config.sync.root_dir())))
}

/// Turns user input (`docs/`, `/docs`, `/`) into a root-relative store path
pub fn normalize_path(input: &str) -> String {
    path_segments(input).fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(segment);
        path
    })
}
