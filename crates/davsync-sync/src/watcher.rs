//! Local change watching
//!
//! [`FileWatcher`] wraps `notify` to observe the local root recursively and
//! turns raw OS events into [`ChangeEvent`]s. [`forward_changes`] feeds them
//! through a [`DebouncedChangeQueue`] and, once a burst has settled, asks the
//! scheduler for a cycle. The watcher never drives the engine directly.
//!
//! ```text
//! inotify ──→ FileWatcher ──→ mpsc ──→ DebouncedChangeQueue ──→ SchedulerHandle::request_sync
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use davsync_core::filter::ExclusionSet;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::scheduler::SchedulerHandle;

/// Capacity of the raw event channel; overflow only drops redundant events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Lower bound of the queue polling period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// ChangeEvent
// ============================================================================

/// A change under the watched root, decoupled from `notify`'s event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl ChangeEvent {
    /// The path the event leaves behind (the target for renames)
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Removed(p) => p,
            ChangeEvent::Renamed { to, .. } => to,
        }
    }
}

/// Converts a `notify::Event`; access and unknown events yield `None`
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let first = event.paths.first()?.clone();

    let change = match &event.kind {
        EventKind::Create(_) => ChangeEvent::Created(first),
        EventKind::Remove(_) => ChangeEvent::Removed(first),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            ChangeEvent::Renamed {
                from: first,
                to: event.paths[1].clone(),
            }
        }
        EventKind::Modify(_) => ChangeEvent::Modified(first),
        _ => return None,
    };

    debug!(event = ?change, "Mapped notify event");
    Some(change)
}

// ============================================================================
// FileWatcher
// ============================================================================

/// Recursive watcher over one or more local directories
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Creates the OS watcher and the channel its events arrive on
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (event_tx, event_rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&event) {
                        // A full channel already guarantees a pending trigger.
                        if let Err(mpsc::error::TrySendError::Closed(_)) = event_tx.try_send(change) {
                            debug!("Change receiver dropped");
                        }
                    }
                }
                Err(err) => error!(error = %err, "File watcher error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        Ok((Self { watcher }, event_rx))
    }

    /// Starts watching `path` and everything below it
    ///
    /// # Errors
    /// Returns an error if the path cannot be watched (missing directory,
    /// permissions, inotify watch limit)
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Watching local root");
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch path: {}", path.display()))
    }

    /// Stops watching `path`
    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Stopping watch");
        self.watcher
            .unwatch(path)
            .with_context(|| format!("Failed to unwatch path: {}", path.display()))
    }
}

// ============================================================================
// DebouncedChangeQueue
// ============================================================================

/// Coalesces bursts of events per path until the path has been quiet for
/// the debounce delay
///
/// Each push for a path replaces its pending event and restarts its window,
/// so a file being saved repeatedly settles once, after the last write.
pub struct DebouncedChangeQueue {
    pending: HashMap<PathBuf, (ChangeEvent, Instant)>,
    debounce_delay: Duration,
}

impl DebouncedChangeQueue {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        self.pending
            .insert(event.path().to_path_buf(), (event, Instant::now()));
    }

    /// Removes and returns every event whose window has elapsed
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        let now = Instant::now();
        let delay = self.debounce_delay;
        let mut settled = Vec::new();

        self.pending.retain(|_, (event, at)| {
            if now.duration_since(*at) >= delay {
                settled.push(event.clone());
                false
            } else {
                true
            }
        });

        if !settled.is_empty() {
            debug!(count = settled.len(), "Changes settled");
        }
        settled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// Forwarding to the scheduler
// ============================================================================

/// Returns false for events on names the exclusion rules would skip anyway
/// (editor swap files, our own partial downloads)
pub fn is_relevant(event: &ChangeEvent, exclusions: &ExclusionSet) -> bool {
    match event.path().file_name().and_then(|n| n.to_str()) {
        Some(name) => exclusions.matching_pattern(name).is_none(),
        None => true,
    }
}

/// Debounces local changes and requests a sync once they settle
///
/// Runs until `cancel` fires or the event channel closes.
pub async fn forward_changes(
    mut events: mpsc::Receiver<ChangeEvent>,
    debounce: Duration,
    exclusions: Arc<ExclusionSet>,
    scheduler: SchedulerHandle,
    cancel: CancellationToken,
) {
    let mut queue = DebouncedChangeQueue::new(debounce);
    let mut poll_timer = tokio::time::interval((debounce / 4).max(MIN_POLL_INTERVAL));

    info!(debounce_ms = debounce.as_millis() as u64, "Forwarding local changes");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            event = events.recv() => match event {
                Some(change) if is_relevant(&change, &exclusions) => queue.push(change),
                Some(change) => debug!(event = ?change, "Ignoring excluded change"),
                None => {
                    info!("Change channel closed");
                    if !queue.is_empty() {
                        scheduler.request_sync();
                    }
                    break;
                }
            },

            _ = poll_timer.tick() => {
                let settled = queue.poll();
                if !settled.is_empty() {
                    info!(count = settled.len(), "Local changes settled, requesting sync");
                    scheduler.request_sync();
                }
            }
        }
    }

    debug!("Change forwarder stopped");
}

// ============================================================================
// Unit tests
// ============================================================================
