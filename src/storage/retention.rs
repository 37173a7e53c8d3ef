//! Periodic retention sweep
//!
//! Runs [`FileStorage::cleanup_old_files`] on a fixed schedule, independent of
//! any request. The sweeper has an explicit lifecycle: [`RetentionSweeper::start`]
//! spawns it and [`RetentionHandle::shutdown`] stops it.
//!
//! # Example
//!
//! ```no_run
//! use tubeaudio_dl::config::StorageConfig;
//! use tubeaudio_dl::storage::{FileStorage, RetentionSweeper};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::default();
//! let storage = Arc::new(FileStorage::new(&config));
//!
//! let handle = RetentionSweeper::new(storage)
//!     .start(config.cleanup_initial_delay, config.retention);
//!
//! // ... serve requests ...
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use super::FileStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background task that periodically deletes expired files
pub struct RetentionSweeper {
    storage: Arc<FileStorage>,
}

impl RetentionSweeper {
    /// Create a sweeper for the given storage
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }

    /// Spawn the sweep loop
    ///
    /// The first sweep happens after `initial_delay`, then every `period`.
    /// A zero `period` is treated as one second.
    pub fn start(self, initial_delay: Duration, period: Duration) -> RetentionHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = if period.is_zero() {
            Duration::from_secs(1)
        } else {
            period
        };

        let join = tokio::spawn(async move {
            info!(?initial_delay, ?period, "retention sweeper started");

            let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        debug!("running scheduled file cleanup");
                        let summary = self.storage.cleanup_old_files().await;
                        if !summary.failed_directories.is_empty() {
                            warn!(
                                failed = ?summary.failed_directories,
                                "retention sweep could not read some directories"
                            );
                        }
                    }
                    _ = token.cancelled() => {
                        break;
                    }
                }
            }

            info!("retention sweeper stopped");
        });

        RetentionHandle { cancel, join }
    }
}

/// Handle to a running [`RetentionSweeper`]
pub struct RetentionHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl RetentionHandle {
    /// Stop the sweeper and wait for it to exit
    ///
    /// A sweep that is already in progress is allowed to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "retention sweeper task ended abnormally");
        }
    }

    /// Whether the sweep loop has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
