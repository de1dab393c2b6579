//! davsync daemon - background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Periodic pull/push cycles between the WebDAV root and the local mirror
//! - On-demand cycles when local changes settle (file watcher)
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon checks the remote connection once, then hands both stores to
//! a [`SyncScheduler`]. The watcher only ever *requests* cycles; the
//! scheduler alone decides when one runs, so cycles never overlap. A
//! `CancellationToken` fired by the signal handler stops everything.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use davsync_core::{
    config::Config,
    filter::ExclusionSet,
    ports::FileStore,
};
use davsync_sync::{
    watcher::{forward_changes, FileWatcher},
    LocalFileStore, LoggingStore, SchedulerHandle, SyncEngine, SyncScheduler,
};
use davsync_webdav::WebDavStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// DaemonService struct
// ============================================================================

/// Main daemon service that wires stores, scheduler and watcher together
struct DaemonService {
    /// Application configuration loaded from YAML
    config: Config,
    /// Merged global and user exclusion rules
    exclusions: Arc<ExclusionSet>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Validates the configuration and loads the exclusion list; either
    /// failing is fatal.
    fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            for problem in &problems {
                error!(field = %problem.field, "{}", problem.message);
            }
            bail!("Configuration has {} error(s)", problems.len());
        }

        let exclusions_path = config.sync.exclusions_path();
        let user = ExclusionSet::load_optional(&exclusions_path).with_context(|| {
            format!("Failed to load exclusions from {}", exclusions_path.display())
        })?;
        match &user {
            Some(set) => info!(path = %exclusions_path.display(), patterns = set.len(), "Loaded exclusion list"),
            None => info!(path = %exclusions_path.display(), "No exclusion list, using built-in rules only"),
        }
        let exclusions = Arc::new(ExclusionSet::merged(&ExclusionSet::global(), user.as_ref()));

        Ok(Self {
            config,
            exclusions,
            shutdown,
        })
    }

    /// Runs the daemon until shutdown
    ///
    /// 1. Builds the local and remote stores
    /// 2. Verifies the remote credentials
    /// 3. Starts the scheduler and, if enabled, the watcher
    async fn run(&self) -> Result<()> {
        let root = self.config.sync.root_dir();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create local root {}", root.display()))?;

        let remote = WebDavStore::from_config(&self.config.remote)
            .context("Failed to configure WebDAV store")?;
        let remote = LoggingStore::wrap(Arc::new(remote));
        let local = LoggingStore::wrap(Arc::new(LocalFileStore::new(&root)));

        if !remote.is_valid_connection().await {
            error!(
                host = %self.config.remote.host,
                email = %self.config.remote.email,
                "Invalid credentials"
            );
            bail!("Invalid credentials for {}", self.config.remote.email);
        }

        let engine = SyncEngine::new(Arc::clone(&self.exclusions));
        let (scheduler, handle) = SyncScheduler::new(
            engine,
            remote,
            local,
            self.config.sync.interval(),
            self.shutdown.clone(),
        );
        let scheduler_task = scheduler.spawn();

        // Kept alive until the scheduler stops; dropping it ends the watch.
        let _watcher = if self.config.sync.watch {
            self.start_watcher(&root, handle.clone())
        } else {
            info!("Local file watching disabled");
            None
        };

        scheduler_task.await.context("Scheduler task panicked")?;

        info!(cycles = handle.status().cycles_completed, "Scheduler stopped");
        Ok(())
    }

    /// Starts watching the local root and forwarding settled changes
    ///
    /// A watcher that cannot start is not fatal; periodic cycles still run.
    fn start_watcher(&self, root: &std::path::Path, handle: SchedulerHandle) -> Option<FileWatcher> {
        let (mut watcher, events) = match FileWatcher::new() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "File watcher unavailable, relying on periodic sync");
                return None;
            }
        };
        if let Err(e) = watcher.watch(root) {
            warn!(error = %format!("{e:#}"), "Cannot watch local root, relying on periodic sync");
            return None;
        }

        tokio::spawn(forward_changes(
            events,
            self.config.sync.debounce(),
            Arc::clone(&self.exclusions),
            handle,
            self.shutdown.clone(),
        ));
        Some(watcher)
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

#[cfg(unix)]
async fn terminate() -> Result<()> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?
        .recv()
        .await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate() -> Result<()> {
    std::future::pending().await
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let result = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C)");
            res.context("Failed to install Ctrl+C handler")
        }
        res = terminate() => {
            info!("Received SIGTERM");
            res
        }
    };

    if let Err(e) = result {
        error!(error = %format!("{e:#}"), "Signal handling failed, shutting down");
    }
    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Reads the configuration file if present; a missing file means defaults
fn load_config() -> Result<Config> {
    let path = Config::default_path();
    if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    info!("davsync daemon starting (davsyncd)");
    let config = config?;
    info!(config = ?config.redacted(), "Loaded configuration");

    let shutdown_token = CancellationToken::new();

    // Spawn signal handler task
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = match DaemonService::new(config, shutdown_token.clone()) {
        Ok(service) => service.run().await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => info!("davsync daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "davsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
