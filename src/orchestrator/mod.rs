//! Conversion pipeline orchestration
//!
//! One request moves through these stages, strictly in order:
//! 1. Metadata - ask yt-dlp for the title (accounted under `Downloading`)
//! 2. Download - fetch the best audio-only stream into the staging directory
//! 3. Convert - transcode the staged file to MP3 in the output directory
//! 4. Size check - reject output over the configured maximum
//!
//! Every outcome, including panics inside a stage, ends as a terminal
//! [`ConversionTask`]. Nothing is returned as an error.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::ffmpeg::Transcoder;
use crate::storage::{FileStorage, human_size, sanitize_file_name};
use crate::types::{ChatId, ConversionStatus, ConversionTask, VideoMetadata};
use crate::ytdlp::YtDlp;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Stem used when a video has neither a usable title nor an id
const FALLBACK_STEM: &str = "audio";

/// Pipeline stage, used to qualify failure messages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Metadata,
    Download,
    Conversion,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::Metadata => "Metadata fetch",
            Stage::Download => "Download",
            Stage::Conversion => "Conversion",
        }
    }
}

/// Sequences metadata, download, conversion and size policy for each request
pub struct ConversionOrchestrator {
    ytdlp: YtDlp,
    transcoder: Transcoder,
    storage: Arc<FileStorage>,
    max_file_size: u64,
}

impl ConversionOrchestrator {
    /// Wire an orchestrator from configuration
    ///
    /// Tool paths are resolved once here; `executor` runs every external command.
    pub fn new(
        config: &Config,
        executor: Arc<dyn CommandExecutor>,
        storage: Arc<FileStorage>,
    ) -> Self {
        Self {
            ytdlp: YtDlp::new(config.tools.resolve_yt_dlp(), executor.clone()),
            transcoder: Transcoder::from_config(&config.tools, executor),
            storage,
            max_file_size: config.limits.max_file_size,
        }
    }

    /// Storage manager shared with the retention sweeper
    pub fn storage(&self) -> &Arc<FileStorage> {
        &self.storage
    }

    /// Largest output file that may be delivered, in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Fetch metadata for a URL without starting a conversion
    ///
    /// Lets the delivery layer show a preview before the user commits.
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        self.ytdlp.fetch_metadata(url).await
    }

    /// Run one request to a terminal task
    ///
    /// The returned task is either [`Completed`](ConversionStatus::Completed)
    /// with an output file, or [`Failed`](ConversionStatus::Failed) with a
    /// stage-qualified message.
    pub async fn process(&self, url: impl Into<String>, chat_id: ChatId) -> ConversionTask {
        let mut task = ConversionTask::new(url, chat_id);
        let mut stage = Stage::Metadata;
        info!(task_id = %task.id, chat_id, url = %task.source_url, "conversion task created");

        let outcome = AssertUnwindSafe(self.run_pipeline(&mut task, &mut stage))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                info!(
                    task_id = %task.id,
                    output = ?task.output_path,
                    "conversion task completed"
                );
            }
            Ok(Err(e)) => {
                let message = failure_message(stage, &e);
                if e.is_defect() {
                    error!(
                        task_id = %task.id,
                        stage = stage.label(),
                        error = %e,
                        "conversion task hit a defect"
                    );
                } else {
                    warn!(
                        task_id = %task.id,
                        stage = stage.label(),
                        error = %e,
                        "conversion task failed"
                    );
                }
                task.fail(message);
            }
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                error!(
                    task_id = %task.id,
                    stage = stage.label(),
                    panic = %detail,
                    "conversion task panicked"
                );
                task.fail(format!("Unexpected error: {}", detail));
            }
        }

        task
    }

    /// Run [`process`](Self::process) as an independent tokio task
    pub fn spawn(
        self: &Arc<Self>,
        url: impl Into<String>,
        chat_id: ChatId,
    ) -> JoinHandle<ConversionTask> {
        let orchestrator = self.clone();
        let url = url.into();
        tokio::spawn(async move { orchestrator.process(url, chat_id).await })
    }

    /// Delete every file recorded on a task
    ///
    /// Called by the delivery layer once it is done with the task, whatever its
    /// status. Safe to call more than once.
    pub async fn cleanup_task(&self, task: &ConversionTask) {
        let mut deleted = 0;
        for path in [&task.staged_path, &task.output_path].into_iter().flatten() {
            if self.storage.delete_file(path).await {
                deleted += 1;
            }
        }
        debug!(task_id = %task.id, deleted, "task files cleaned up");
    }

    async fn run_pipeline(&self, task: &mut ConversionTask, stage: &mut Stage) -> Result<()> {
        task.advance(ConversionStatus::Downloading)?;

        *stage = Stage::Metadata;
        let metadata = self.ytdlp.fetch_metadata(&task.source_url).await?;
        let stem = file_stem(&metadata);
        debug!(task_id = %task.id, %stem, "derived file stem");
        task.metadata = Some(metadata);

        *stage = Stage::Download;
        let target = self.storage.staging_path(&stem);
        let staged = self.ytdlp.download_audio(&task.source_url, &target).await?;
        task.staged_path = Some(staged.clone());

        *stage = Stage::Conversion;
        task.advance(ConversionStatus::Converting)?;
        let output = self.storage.output_path(&stem);
        let output = self.transcoder.convert_to_mp3(&staged, &output).await?;
        task.output_path = Some(output.clone());

        let size = self.storage.file_size(&output).await?;
        if size > self.max_file_size {
            self.storage.delete_file(&staged).await;
            self.storage.delete_file(&output).await;
            return Err(Error::FileSizeExceeded {
                size,
                limit: self.max_file_size,
            });
        }

        self.storage.delete_file(&staged).await;
        task.complete()?;
        info!(task_id = %task.id, size = %human_size(size), "output ready for delivery");
        Ok(())
    }
}

/// Sanitized stem for both the staged and output file
///
/// Falls back to the video id, then to a fixed name, when the title
/// sanitizes to nothing.
fn file_stem(metadata: &VideoMetadata) -> String {
    [metadata.title.trim(), metadata.video_id.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .map(sanitize_file_name)
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}

/// User-facing message for a failed stage
fn failure_message(stage: Stage, err: &Error) -> String {
    if err.is_defect() {
        return format!("Unexpected error: {}", err);
    }

    match err {
        Error::FileSizeExceeded { size, limit } => format!(
            "File size ({}) exceeds the maximum allowed size ({})",
            human_size(*size),
            human_size(*limit)
        ),
        Error::Download(msg)
        | Error::Conversion(msg)
        | Error::MetadataParse(msg)
        | Error::ExternalTool(msg) => format!("{} failed: {}", stage.label(), msg),
        other => format!("{} failed: {}", stage.label(), other),
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in conversion pipeline".to_string()
    }
}

#[cfg(test)]
mod tests;
