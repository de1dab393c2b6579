//! Two-way mirror engine
//!
//! The [`SyncEngine`] reconciles two [`FileStore`]s by walking the source
//! tree and copying whatever the destination lacks or holds an older copy of.
//!
//! ## Sync Flow
//!
//! 1. **Pull**: propagate remote -> local from the root
//! 2. **Push**: propagate local -> remote from the root
//!
//! Pull finishes before push begins, so a file updated remotely is never
//! overwritten by a stale local copy in the same cycle.
//!
//! ## Propagation rules
//!
//! - Excluded resources are skipped; an excluded directory hides its subtree.
//! - Missing directories are created and always descended into.
//! - A file is copied when the destination has none or has a strictly older
//!   one. Equal timestamps are in sync. Times are compared at the coarser
//!   resolution of the two stores, so a whole-second server and a
//!   millisecond filesystem agree after one copy.
//! - Nothing is ever deleted.
//! - A failed listing abandons that subtree only; a failed transfer is
//!   recorded and its siblings continue.

use std::sync::Arc;
use std::time::Instant;

use davsync_core::{
    domain::Resource,
    filter::ExclusionSet,
    ports::{FileStore, Listing, StoreError},
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Reports
// ============================================================================

/// Summary of one directional pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Name of the store content was read from
    pub source: String,
    /// Name of the store content was written to
    pub destination: String,
    /// Directories created at the destination
    pub directories_created: u32,
    /// Files copied to the destination
    pub files_transferred: u32,
    /// Files whose destination copy was already current
    pub files_up_to_date: u32,
    /// Resources skipped by the exclusion rules
    pub excluded: u32,
    /// Subtrees abandoned because a listing failed
    pub listing_failures: u32,
    /// Errors encountered during the pass (non-fatal)
    pub errors: Vec<String>,
    /// Whether the pass stopped early on cancellation
    pub cancelled: bool,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl PassReport {
    fn new(source: &dyn FileStore, destination: &dyn FileStore) -> Self {
        Self {
            source: source.name().to_string(),
            destination: destination.name().to_string(),
            ..Self::default()
        }
    }

    fn record_error(&mut self, message: String) {
        warn!(error = %message, "Sync error");
        self.errors.push(message);
    }

    /// Number of changes applied to the destination
    pub fn changes(&self) -> u32 {
        self.directories_created + self.files_transferred
    }

    /// True when the pass ran to completion without any error
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

/// Summary of a full cycle (pull then push)
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub pull: PassReport,
    pub push: PassReport,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn cancelled(&self) -> bool {
        self.pull.cancelled || self.push.cancelled
    }

    pub fn error_count(&self) -> usize {
        self.pull.errors.len() + self.push.errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.pull.is_clean() && self.push.is_clean()
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Stateless reconciliation engine
///
/// Holds only the effective exclusion set and a cancellation token; the
/// stores are passed per call.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    exclusions: Arc<ExclusionSet>,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(exclusions: Arc<ExclusionSet>) -> Self {
        Self {
            exclusions,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the engine to an externally owned token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs a full cycle: pull (`remote` -> `local`) then push (`local` -> `remote`)
    #[tracing::instrument(skip_all)]
    pub async fn run_full_cycle(&self, remote: &dyn FileStore, local: &dyn FileStore) -> CycleReport {
        let start = Instant::now();
        info!(remote = remote.name(), local = local.name(), "Starting sync cycle");

        let pull = self.propagate("", remote, local).await;
        let push = if pull.cancelled {
            PassReport {
                cancelled: true,
                ..PassReport::new(local, remote)
            }
        } else {
            self.propagate("", local, remote).await
        };

        let report = CycleReport {
            pull,
            push,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            downloaded = report.pull.files_transferred,
            uploaded = report.push.files_transferred,
            errors = report.error_count(),
            cancelled = report.cancelled(),
            duration_ms = report.duration_ms,
            "Sync cycle finished"
        );
        report
    }

    /// Makes `destination` a superset of `source` below `path`
    ///
    /// Never fails: every problem is logged and recorded in the report.
    #[tracing::instrument(skip(self, source, destination), fields(source = source.name(), destination = destination.name()))]
    pub async fn propagate(&self, path: &str, source: &dyn FileStore, destination: &dyn FileStore) -> PassReport {
        let start = Instant::now();
        let mut report = PassReport::new(source, destination);

        // Depth-first: subdirectories are pushed in reverse so they pop in order.
        let mut worklist = vec![path.to_string()];
        while let Some(dir) = worklist.pop() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let subdirs = self.visit_directory(&dir, source, destination, &mut report).await;
            worklist.extend(subdirs.into_iter().rev());
        }

        if report.cancelled {
            info!(path, "Pass cancelled");
        }
        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Reconciles the immediate children of `dir` and returns the
    /// subdirectories still to visit
    async fn visit_directory(
        &self,
        dir: &str,
        source: &dyn FileStore,
        destination: &dyn FileStore,
        report: &mut PassReport,
    ) -> Vec<String> {
        let Some(source_children) = self.list(source, dir, report).await else {
            return Vec::new();
        };
        let Some(destination_children) = self.list(destination, dir, report).await else {
            return Vec::new();
        };

        let mut entries: Vec<&Resource> = source_children.values().collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        let mut subdirs = Vec::new();
        for resource in entries {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if let Some(reason) = self.exclusions.check(resource) {
                debug!(path = resource.path(), %reason, "Excluded");
                report.excluded += 1;
                continue;
            }

            let counterpart = destination_children.get(resource.path());

            if resource.is_directory() {
                if counterpart.is_none() {
                    match destination.create_directory(resource).await {
                        Ok(()) => {
                            debug!(path = resource.path(), "Directory created");
                            report.directories_created += 1;
                        }
                        Err(e) => report.record_error(format!(
                            "create directory {} on {}: {e}",
                            resource.path(),
                            destination.name()
                        )),
                    }
                }
                subdirs.push(resource.path().to_string());
                continue;
            }

            let resolution = source
                .timestamp_resolution_ms()
                .max(destination.timestamp_resolution_ms());
            let stale = counterpart
                .map_or(true, |existing| existing.is_older_than_at(resource, resolution));
            if !stale {
                report.files_up_to_date += 1;
                continue;
            }

            match Self::transfer(resource, source, destination).await {
                Ok(()) => {
                    debug!(
                        path = resource.path(),
                        from = source.name(),
                        to = destination.name(),
                        "File transferred"
                    );
                    report.files_transferred += 1;
                }
                Err(e) => report.record_error(format!(
                    "transfer {} from {} to {}: {e}",
                    resource.path(),
                    source.name(),
                    destination.name()
                )),
            }
        }

        subdirs
    }

    async fn list(&self, store: &dyn FileStore, dir: &str, report: &mut PassReport) -> Option<Listing> {
        match store.list_children(dir, false).await {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!(store = store.name(), path = dir, error = %e, "Listing failed, skipping subtree");
                report.listing_failures += 1;
                report.errors.push(format!("list {dir:?} on {}: {e}", store.name()));
                None
            }
        }
    }

    async fn transfer(
        resource: &Resource,
        source: &dyn FileStore,
        destination: &dyn FileStore,
    ) -> Result<(), StoreError> {
        let content = source.read_file(resource).await?;
        destination.write_file(resource, content).await
    }
}
