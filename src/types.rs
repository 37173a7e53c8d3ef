//! Core types for tubeaudio-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a conversion task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of the chat that owns a task
pub type ChatId = i64;

/// Conversion task status
///
/// Tasks only move forward along `Pending -> Downloading -> Converting -> Completed`.
/// `Failed` is reachable from every non-terminal status and is itself terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    /// Created, nothing started yet
    Pending,
    /// Fetching metadata or downloading the audio stream
    Downloading,
    /// Transcoding the staged file to MP3
    Converting,
    /// Output file is ready for delivery
    Completed,
    /// Failed with error
    Failed,
}

impl ConversionStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionStatus::Completed | ConversionStatus::Failed)
    }

    /// The transition table of the conversion state machine
    pub fn can_transition_to(&self, next: ConversionStatus) -> bool {
        use ConversionStatus::*;

        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, Converting) => true,
            (Converting, Completed) => true,
            (Pending | Downloading | Converting, Failed) => true,
            (Pending, _) | (Downloading, _) | (Converting, _) => false,
            (Completed, _) | (Failed, _) => false,
        }
    }

    /// Lowercase name, as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::Pending => "pending",
            ConversionStatus::Downloading => "downloading",
            ConversionStatus::Converting => "converting",
            ConversionStatus::Completed => "completed",
            ConversionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of a remote video, as reported by the download tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video title ("Unknown" when absent)
    pub title: String,
    /// Site-specific video identifier ("Unknown" when absent)
    pub video_id: String,
    /// Canonical URL of the video
    pub url: String,
    /// Duration in seconds (0 = unknown)
    pub duration: u64,
    /// Uploader or channel name ("Unknown" when absent)
    pub uploader: String,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
}

impl VideoMetadata {
    /// Render the duration as `H:MM:SS` or `M:SS`
    ///
    /// Returns "Unknown" when the duration was not reported.
    pub fn format_duration(&self) -> String {
        if self.duration == 0 {
            return "Unknown".to_string();
        }

        let hours = self.duration / 3600;
        let minutes = (self.duration % 3600) / 60;
        let secs = self.duration % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

/// One request's end-to-end conversion attempt and its outcome
///
/// Owned by the orchestrator while it runs. Once [`status`](Self::status) is
/// terminal the delivery layer reads it and eventually hands it back to
/// [`cleanup_task`](crate::orchestrator::ConversionOrchestrator::cleanup_task).
///
/// Status, completion time and failure message are read-only outside the
/// crate, so every status change goes through the transition table.
///
/// ```compile_fail
/// use tubeaudio_dl::{ConversionStatus, ConversionTask};
///
/// fn force_complete(task: &mut ConversionTask) {
///     task.status = ConversionStatus::Completed;
/// }
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct ConversionTask {
    /// Generated task identifier
    pub id: TaskId,
    /// URL the user submitted
    pub source_url: String,
    /// Chat that requested the conversion
    pub chat_id: ChatId,
    /// Video metadata, once fetched
    pub metadata: Option<VideoMetadata>,
    pub(crate) status: ConversionStatus,
    /// Raw audio file produced by the download stage
    pub staged_path: Option<PathBuf>,
    /// MP3 file produced by the conversion stage
    pub output_path: Option<PathBuf>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) error_message: Option<String>,
}

impl ConversionTask {
    /// Create a pending task for the given URL and chat
    pub fn new(source_url: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            id: TaskId::new(),
            source_url: source_url.into(),
            chat_id,
            metadata: None,
            status: ConversionStatus::Pending,
            staged_path: None,
            output_path: None,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Current status
    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    /// When the task completed successfully
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether the task completed successfully
    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Completed
    }

    /// The MP3 file to deliver, if any
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// The failure message to show the user, if any
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Move to `next`, rejecting edges that are not in the transition table
    pub(crate) fn advance(&mut self, next: ConversionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the task completed and stamp the completion time
    pub(crate) fn complete(&mut self) -> Result<()> {
        if self.output_path.is_none() {
            return Err(Error::Unexpected(
                "cannot complete a task without an output file".to_string(),
            ));
        }
        self.advance(ConversionStatus::Completed)?;
        // completed_at >= created_at even if the wall clock stepped backwards
        self.completed_at = Some(Utc::now().max(self.created_at));
        Ok(())
    }

    /// Mark the task failed with a message
    ///
    /// A task that already reached a terminal status keeps it.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if self.status.is_terminal() {
            tracing::error!(
                task_id = %self.id,
                status = %self.status,
                "refusing to fail a task that is already terminal"
            );
            return;
        }
        self.status = ConversionStatus::Failed;
        self.error_message = Some(message.into());
    }
}
