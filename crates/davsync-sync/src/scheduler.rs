//! Sync scheduler - runs the engine periodically and on demand
//!
//! The [`SyncScheduler`] owns both stores and the [`SyncEngine`]. It runs one
//! cycle as soon as it starts, then one per interval, plus one for every
//! trigger received through a [`SchedulerHandle`].
//!
//! ## Flow
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ SyncScheduler loop ──→ SyncEngine::run_full_cycle
//! request_sync ───┘          │
//!  (mpsc, cap 1)        watch::Sender<SchedulerStatus>
//! ```
//!
//! Cycles execute inline in the loop, so at most one is ever active. A
//! trigger that arrives mid-cycle waits in the capacity-1 channel; any
//! further triggers are dropped, so a burst collapses into one follow-up.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use davsync_core::ports::FileStore;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{CycleReport, SyncEngine};

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Waiting for the next tick or trigger
    Idle,
    /// A cycle is in progress
    Running,
    /// The loop has exited
    Stopped,
}

/// Snapshot published after every state change
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    /// Number of cycles run so far
    pub cycles_completed: u64,
    /// When the last cycle ended
    pub last_finished: Option<DateTime<Utc>>,
    /// Report of the last cycle
    pub last_report: Option<CycleReport>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            cycles_completed: 0,
            last_finished: None,
            last_report: None,
        }
    }
}

// ============================================================================
// SchedulerHandle
// ============================================================================

/// Cloneable control surface for a running [`SyncScheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    status_rx: watch::Receiver<SchedulerStatus>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Requests a cycle as soon as the scheduler is free
    ///
    /// Returns `false` when a request is already pending (it is coalesced)
    /// or the scheduler has stopped.
    pub fn request_sync(&self) -> bool {
        match self.trigger_tx.try_send(()) {
            Ok(()) => {
                debug!("Sync requested");
                true
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Sync already pending, request coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> SchedulerStatus {
        self.status_rx.borrow().clone()
    }

    /// A receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_rx.clone()
    }

    /// Stops the scheduler, cancelling a cycle in progress at the next
    /// resource boundary
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Periodic and on-demand driver of the sync engine
pub struct SyncScheduler {
    engine: SyncEngine,
    remote: Arc<dyn FileStore>,
    local: Arc<dyn FileStore>,
    interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    status_tx: watch::Sender<SchedulerStatus>,
    cancel: CancellationToken,
}

impl SyncScheduler {
    /// Creates a scheduler and the handle that controls it
    ///
    /// # Arguments
    /// * `engine` - Engine to run; it is rebound to `cancel`
    /// * `remote` - The remote store (pull source, push destination)
    /// * `local` - The local store
    /// * `interval` - Time between scheduled cycles
    /// * `cancel` - Shutdown token
    pub fn new(
        engine: SyncEngine,
        remote: Arc<dyn FileStore>,
        local: Arc<dyn FileStore>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());

        info!(
            interval_secs = interval.as_secs(),
            remote = remote.name(),
            local = local.name(),
            "Creating sync scheduler"
        );

        let handle = SchedulerHandle {
            trigger_tx,
            status_rx,
            cancel: cancel.clone(),
        };

        let scheduler = Self {
            engine: engine.with_cancellation(cancel.clone()),
            remote,
            local,
            interval,
            trigger_rx,
            status_tx,
            cancel,
        };

        (scheduler, handle)
    }

    /// Runs the loop on a new task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Main loop; returns once the cancellation token fires
    pub async fn run(mut self) {
        info!("Sync scheduler starting");

        // The first tick completes immediately, giving the initial cycle.
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(()) = self.trigger_rx.recv() => {
                    info!("On-demand sync triggered");
                }

                _ = ticker.tick() => {
                    debug!("Scheduled sync due");
                }
            }

            self.run_cycle().await;
        }

        self.status_tx.send_modify(|status| status.state = SchedulerState::Stopped);
        info!("Sync scheduler stopped");
    }

    async fn run_cycle(&self) {
        self.status_tx.send_modify(|status| status.state = SchedulerState::Running);

        let report = self
            .engine
            .run_full_cycle(self.remote.as_ref(), self.local.as_ref())
            .await;

        self.status_tx.send_modify(|status| {
            status.state = SchedulerState::Idle;
            status.cycles_completed += 1;
            status.last_finished = Some(Utc::now());
            status.last_report = Some(report);
        });
    }
}

// ============================================================================
// Unit tests
// ============================================================================
