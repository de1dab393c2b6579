//! Sync command - run one cycle now
//!
//! Provides the `davsync sync` CLI command which:
//! 1. Loads configuration and the exclusion rules
//! 2. Builds both stores and checks the remote credentials
//! 3. Runs a full cycle (or a single pull/push pass) and prints the report
//!
//! Ctrl+C cancels the running pass; whatever completed stays applied.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use davsync_sync::{PassReport, SyncEngine};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{exclusions, local_store, remote_store, CliContext};
use crate::output::{emit, OutputFormatter};

/// Run a synchronization cycle immediately
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only copy remote changes down to the local root
    #[arg(long, conflicts_with = "push_only")]
    pub pull_only: bool,

    /// Only copy local changes up to the server
    #[arg(long)]
    pub push_only: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_valid_config()?;

        let exclusions = Arc::new(exclusions(&config)?);
        let remote = remote_store(&config)?;
        let local = local_store(&config);

        tokio::fs::create_dir_all(config.sync.root_dir()).await?;

        if !remote.is_valid_connection().await {
            formatter.error(&format!(
                "Invalid credentials or server unreachable ({})",
                config.remote.base_url()
            ));
            bail!("Invalid credentials");
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling sync");
                on_interrupt.cancel();
            }
        });

        let engine = SyncEngine::new(exclusions).with_cancellation(cancel);
        formatter.info("Starting synchronization...");

        let (passes, clean) = if self.pull_only {
            let pull = engine.propagate("", remote.as_ref(), local.as_ref()).await;
            emit(formatter.as_ref(), &pull)?;
            let clean = pull.is_clean();
            (vec![("Pull", pull)], clean)
        } else if self.push_only {
            let push = engine.propagate("", local.as_ref(), remote.as_ref()).await;
            emit(formatter.as_ref(), &push)?;
            let clean = push.is_clean();
            (vec![("Push", push)], clean)
        } else {
            let report = engine.run_full_cycle(remote.as_ref(), local.as_ref()).await;
            emit(formatter.as_ref(), &report)?;
            let clean = report.is_clean();
            (vec![("Pull", report.pull), ("Push", report.push)], clean)
        };

        for (label, pass) in &passes {
            print_pass(formatter.as_ref(), label, pass);
        }

        let errors: usize = passes.iter().map(|(_, p)| p.errors.len()).sum();
        if passes.iter().any(|(_, p)| p.cancelled) {
            formatter.warn("Synchronization was cancelled before it finished");
        }
        if clean {
            formatter.success("Synchronization complete");
            Ok(())
        } else if errors > 0 {
            bail!("Synchronization finished with {errors} error(s)")
        } else {
            bail!("Synchronization cancelled")
        }
    }
}

fn print_pass(formatter: &dyn OutputFormatter, label: &str, pass: &PassReport) {
    formatter.info(&format!(
        "{label} ({} -> {}): {} file(s) copied, {} folder(s) created, {} up to date, {} excluded ({} ms)",
        pass.source,
        pass.destination,
        pass.files_transferred,
        pass.directories_created,
        pass.files_up_to_date,
        pass.excluded,
        pass.duration_ms,
    ));
    for error in &pass.errors {
        formatter.warn(error);
    }
}
