//! Error types for tubeaudio-dl
//!
//! This module provides the error taxonomy for the conversion pipeline:
//! - Stage failures (metadata, download, conversion, size policy)
//! - External process failures (spawn errors, timeouts)
//! - State machine defects that should never happen in a correct build

use crate::storage::human_size;
use crate::types::ConversionStatus;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for tubeaudio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tubeaudio-dl
///
/// Every failure in the pipeline is one of these variants. The orchestrator
/// intercepts all of them and turns them into a failed task, so callers of
/// [`ConversionOrchestrator::process`](crate::orchestrator::ConversionOrchestrator::process)
/// never see this type directly.
#[derive(Debug, Error)]
pub enum Error {
    /// Download tool exited nonzero or its output file could not be resolved
    #[error("download error: {0}")]
    Download(String),

    /// Transcoder input/output missing or transcoder exited nonzero
    #[error("conversion error: {0}")]
    Conversion(String),

    /// No complete structured metadata record found in the tool output
    #[error("metadata parse error: {0}")]
    MetadataParse(String),

    /// Converted file is larger than the configured maximum
    #[error(
        "file size ({}) exceeds the maximum allowed size ({})",
        size_label(.size),
        size_label(.limit)
    )]
    FileSizeExceeded {
        /// Actual size of the converted file in bytes
        size: u64,
        /// Configured maximum in bytes
        limit: u64,
    },

    /// External command exceeded the hard execution ceiling and was killed
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    ProcessTimeout {
        /// Program that was running (e.g. "yt-dlp")
        program: String,
        /// The ceiling that was exceeded
        timeout: Duration,
    },

    /// External tool could not be started
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A task was asked to move along an edge that the state machine does not have
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Status the task was in
        from: ConversionStatus,
        /// Status that was requested
        to: ConversionStatus,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.retention")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for defects
    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    /// Whether this error is a defect rather than an expected stage failure
    ///
    /// Defects are reported to the user as "Unexpected error" instead of being
    /// attributed to the stage that happened to be running.
    pub fn is_defect(&self) -> bool {
        matches!(self, Error::InvalidTransition { .. } | Error::Unexpected(_))
    }
}

fn size_label(bytes: &u64) -> String {
    human_size(*bytes)
}
