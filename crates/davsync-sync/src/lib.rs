//! davsync Sync - Two-way mirror engine and local adapters
//!
//! Provides:
//! - The reconciliation engine (pull then push, no deletions)
//! - The local-disk store and the logging store decorator
//! - A periodic/on-demand scheduler with single-active-cycle semantics
//! - A debounced local change watcher feeding the scheduler
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncEngine`](engine::SyncEngine) and its reports
//! - [`filesystem`] - [`LocalFileStore`](filesystem::LocalFileStore) (atomic writes, mtime stamping)
//! - [`logging`] - [`LoggingStore`](logging::LoggingStore) tracing decorator
//! - [`scheduler`] - [`SyncScheduler`](scheduler::SyncScheduler) and its handle
//! - [`watcher`] - notify-based watcher and debounce queue

pub mod engine;
pub mod filesystem;
pub mod logging;
pub mod scheduler;
pub mod watcher;

pub use engine::{CycleReport, PassReport, SyncEngine};
pub use filesystem::LocalFileStore;
pub use logging::LoggingStore;
pub use scheduler::{SchedulerHandle, SchedulerState, SchedulerStatus, SyncScheduler};
