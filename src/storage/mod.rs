//! File storage for staged downloads and converted output
//!
//! [`FileStorage`] owns two directories:
//! 1. Staging - raw audio as produced by the download tool
//! 2. Output - normalized MP3 files waiting for delivery
//!
//! All path construction and deletion for the pipeline happens here, so the
//! "no orphaned files after a failure" rule is enforced in one place.

use crate::config::StorageConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

mod clock;
mod retention;

pub use clock::{Clock, ManualClock, SystemClock};
pub use retention::{RetentionHandle, RetentionSweeper};

/// Longest file name produced by [`sanitize_file_name`]
pub const MAX_FILE_NAME_LEN: usize = 200;

/// Replace every character outside `[A-Za-z0-9.-]` with `_` and bound the length
///
/// The bound is taken from the length of the *input*, not the sanitized result.
/// Because the replacement is one character for one character both lengths are
/// the same, so the result never exceeds [`MAX_FILE_NAME_LEN`] characters.
///
/// # Examples
///
/// ```
/// use tubeaudio_dl::storage::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Song: Live (2024)"), "Song__Live__2024_");
/// assert_eq!(sanitize_file_name("a/b\\c.mp3"), "a_b_c.mp3");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let bound = name.chars().count().min(MAX_FILE_NAME_LEN);
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(bound)
        .collect()
}

/// Format a byte count with 1024-based units and two decimals
///
/// Values under 1024 are rendered as plain bytes.
///
/// # Examples
///
/// ```
/// use tubeaudio_dl::storage::human_size;
///
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(1536), "1.50 KB");
/// assert_eq!(human_size(50 * 1024 * 1024), "50.00 MB");
/// ```
pub fn human_size(bytes: u64) -> String {
    const UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut exp = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exp < UNITS.len() {
        scaled /= 1024;
        exp += 1;
    }

    let value = bytes as f64 / 1024f64.powi(exp as i32);
    format!("{:.2} {}B", value, UNITS[exp - 1])
}

/// Outcome of one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    /// Entries that were deleted
    pub deleted: usize,
    /// Directories that could not be swept
    pub failed_directories: Vec<PathBuf>,
}

/// Staging and output directory manager
pub struct FileStorage {
    download_dir: PathBuf,
    converted_dir: PathBuf,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl FileStorage {
    /// Create a storage manager using the system clock
    pub fn new(config: &StorageConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a storage manager with an injected clock
    pub fn with_clock(config: &StorageConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            download_dir: config.download_dir.clone(),
            converted_dir: config.converted_dir.clone(),
            retention: config.retention,
            clock,
        }
    }

    /// Create both directories if they do not exist yet
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        tokio::fs::create_dir_all(&self.converted_dir).await?;
        info!(
            downloads = ?self.download_dir,
            converted = ?self.converted_dir,
            "storage directories initialized"
        );
        Ok(())
    }

    /// Staging directory
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Output directory
    pub fn converted_dir(&self) -> &Path {
        &self.converted_dir
    }

    /// Retention window used by [`cleanup_old_files`](Self::cleanup_old_files)
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Staging path for a file stem (no extension; the download tool may add one)
    pub fn staging_path(&self, stem: &str) -> PathBuf {
        self.download_dir.join(sanitize_file_name(stem))
    }

    /// Output path for a file stem, with the `.mp3` suffix
    ///
    /// The suffix is appended after sanitizing, so a stem at the length bound
    /// still ends in `.mp3`.
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.converted_dir
            .join(format!("{}.mp3", sanitize_file_name(stem)))
    }

    /// Delete a file, returning whether anything was deleted
    ///
    /// A missing file is not an error. Other failures are logged and reported
    /// as `false`.
    pub async fn delete_file(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, "deleted file");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                error!(?path, error = %e, "failed to delete file");
                false
            }
        }
    }

    /// Size of a file in bytes
    pub async fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    /// Delete entries older than the retention window from both directories
    ///
    /// Each directory is swept independently; a failure in one is logged and
    /// recorded in the summary without stopping the other.
    pub async fn cleanup_old_files(&self) -> CleanupSummary {
        let cutoff = self
            .clock
            .now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut summary = CleanupSummary::default();
        for dir in [&self.download_dir, &self.converted_dir] {
            match sweep_directory(dir, cutoff).await {
                Ok(deleted) => summary.deleted += deleted,
                Err(e) => {
                    error!(directory = ?dir, error = %e, "error during cleanup of directory");
                    summary.failed_directories.push(dir.clone());
                }
            }
        }

        if summary.deleted > 0 {
            info!(deleted = summary.deleted, "retention sweep removed old files");
        }
        summary
    }
}

/// Delete entries in `dir` last modified before `cutoff`
async fn sweep_directory(dir: &Path, cutoff: SystemTime) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut deleted = 0;
    while let Some(entry) = entry_or_stop(dir, entries.next_entry().await) {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!(?path, error = %e, "failed to read metadata during cleanup");
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                warn!(?path, error = %e, "modification time unavailable");
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        // Only empty directories are removed, like a plain unlink would
        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match removed {
            Ok(()) => {
                info!(?path, "cleaned up old file");
                deleted += 1;
            }
            Err(e) => warn!(?path, error = %e, "failed to remove old entry"),
        }
    }

    Ok(deleted)
}

/// Next directory entry, or `None` once listing fails partway through
///
/// Entries already handled stay counted; the rest of the directory waits for
/// the next sweep.
fn entry_or_stop<T>(dir: &Path, next: std::io::Result<Option<T>>) -> Option<T> {
    match next {
        Ok(entry) => entry,
        Err(e) => {
            warn!(
                directory = ?dir,
                error = %e,
                "directory listing failed, stopping sweep early"
            );
            None
        }
    }
}
