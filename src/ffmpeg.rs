//! FFmpeg integration: normalize any audio file to MP3

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::executor::{CommandExecutor, output_tail};
use crate::storage::human_size;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Output sample rate in Hz
const SAMPLE_RATE: &str = "44100";

/// Output channel count
const CHANNELS: &str = "2";

/// Audio transcoder backed by the ffmpeg binary
pub struct Transcoder {
    binary_path: PathBuf,
    bitrate: String,
    codec: String,
    executor: Arc<dyn CommandExecutor>,
}

impl Transcoder {
    /// Create a transcoder with explicit parameters
    pub fn new(
        binary_path: PathBuf,
        bitrate: impl Into<String>,
        codec: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            binary_path,
            bitrate: bitrate.into(),
            codec: codec.into(),
            executor,
        }
    }

    /// Create a transcoder from the tools configuration
    pub fn from_config(tools: &ToolsConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self::new(
            tools.resolve_ffmpeg(),
            tools.audio_bitrate.clone(),
            tools.audio_codec.clone(),
            executor,
        )
    }

    /// Convert `input` to a stereo 44.1 kHz MP3 at `output`
    ///
    /// An existing `output` is overwritten. Returns `output` on success.
    ///
    /// # Errors
    ///
    /// - [`Error::Conversion`] if `input` is missing, ffmpeg exits nonzero, or
    ///   `output` does not exist afterwards
    /// - [`Error::ProcessTimeout`] if ffmpeg hangs
    pub async fn convert_to_mp3(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        info!(input = ?input.file_name(), "converting to MP3");

        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(Error::Conversion(format!(
                "input file does not exist: {}",
                input.display()
            )));
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Conversion(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let args: Vec<OsString> = vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-vn".into(),
            "-ar".into(),
            SAMPLE_RATE.into(),
            "-ac".into(),
            CHANNELS.into(),
            "-b:a".into(),
            self.bitrate.clone().into(),
            "-acodec".into(),
            self.codec.clone().into(),
            "-y".into(),
            output.as_os_str().to_owned(),
        ];

        let result = self
            .executor
            .run(&self.binary_path, &args)
            .await
            .map_err(|e| match e {
                Error::ExternalTool(msg) => Error::Conversion(msg),
                other => other,
            })?;

        if !result.is_success() {
            return Err(Error::Conversion(format!(
                "ffmpeg failed with exit code {}\nOutput: {}",
                result.exit_code,
                output_tail(&result.output)
            )));
        }

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(Error::Conversion(format!(
                    "output file was not created: {}",
                    output.display()
                )));
            }
        };

        info!(output = ?output.file_name(), size = %human_size(size), "conversion completed");
        Ok(output.to_path_buf())
    }
}
