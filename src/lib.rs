//! # tubeaudio-dl
//!
//! Conversion core for a chat bot that turns video links into MP3 files.
//!
//! ## Design Philosophy
//!
//! tubeaudio-dl is designed to be:
//! - **Library-first** - No chat protocol, no CLI; the delivery layer embeds it
//! - **Failure as data** - Every request ends as a terminal [`ConversionTask`]
//! - **Tool-agnostic tests** - yt-dlp and ffmpeg run behind [`CommandExecutor`]
//! - **No orphan files** - All paths and deletions go through [`FileStorage`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use tubeaudio_dl::{Config, ConversionService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.limits.max_file_size = 20 * 1024 * 1024;
//!
//!     let service = ConversionService::new(config).await?;
//!
//!     let task = service.spawn("https://youtu.be/dQw4w9WgXcQ", 42).await?;
//!     match task.output_path() {
//!         Some(mp3) => println!("deliver {}", mp3.display()),
//!         None => println!("failed: {}", task.error_message().unwrap_or_default()),
//!     }
//!     service.cleanup_task(&task).await;
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External process execution
pub mod executor;
/// MP3 transcoding via ffmpeg
pub mod ffmpeg;
/// Per-request conversion state machine
pub mod orchestrator;
/// Startup and shutdown wiring
pub mod service;
/// Staging/output directories and retention
pub mod storage;
/// Core task and metadata types
pub mod types;
/// Metadata and audio download via yt-dlp
pub mod ytdlp;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::{Config, LimitsConfig, StorageConfig, ToolsConfig};
pub use error::{Error, Result};
pub use executor::{CommandExecutor, ProcessOutput, SystemExecutor};
pub use orchestrator::ConversionOrchestrator;
pub use service::ConversionService;
pub use storage::{CleanupSummary, Clock, FileStorage, ManualClock, SystemClock};
pub use types::{ChatId, ConversionStatus, ConversionTask, TaskId, VideoMetadata};

/// Run the service until SIGTERM/SIGINT (Ctrl+C elsewhere), then shut it down
///
/// # Example
///
/// ```no_run
/// use tubeaudio_dl::{Config, ConversionService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = ConversionService::new(Config::default()).await?;
///     // hand `service` references to the chat adapter here
///     run_with_shutdown(service).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: ConversionService) {
    wait_for_signal().await;
    service.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            // Restricted environments (containers, tests) may refuse registration
            tracing::warn!(error = %e, "could not register signal handlers, using ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
