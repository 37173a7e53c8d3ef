//! Configuration types for tubeaudio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling on a single external command (yt-dlp or ffmpeg)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Storage layout and retention configuration
///
/// Groups settings for the staging (raw download) and output (MP3) directories.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Staging directory for raw downloads (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Output directory for converted MP3 files (default: "./converted")
    #[serde(default = "default_converted_dir")]
    pub converted_dir: PathBuf,

    /// Minimum file age before the retention sweep may delete it (default: 30 minutes)
    ///
    /// Also the period of the sweep.
    #[serde(default = "default_retention", with = "minutes_serde")]
    pub retention: Duration,

    /// Delay between startup and the first retention sweep (default: 60 seconds)
    #[serde(default = "default_cleanup_initial_delay", with = "duration_serde")]
    pub cleanup_initial_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            converted_dir: default_converted_dir(),
            retention: default_retention(),
            cleanup_initial_delay: default_cleanup_initial_delay(),
        }
    }
}

/// External tool paths and transcoding parameters
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (default: "yt-dlp")
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: PathBuf,

    /// Path to the ffmpeg executable (default: "ffmpeg")
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// MP3 bitrate passed to ffmpeg's `-b:a` (default: "192k")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Audio codec passed to ffmpeg's `-acodec` (default: "libmp3lame")
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Hard ceiling on each external command (default: 300 seconds)
    #[serde(default = "default_command_timeout", with = "duration_serde")]
    pub command_timeout: Duration,

    /// Whether to search PATH for bare tool names (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: default_yt_dlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            audio_bitrate: default_audio_bitrate(),
            audio_codec: default_audio_codec(),
            command_timeout: default_command_timeout(),
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Resolved yt-dlp binary
    ///
    /// Bare names are looked up in PATH when `search_path` is enabled; if the lookup
    /// fails the configured value is used as-is and the spawn error surfaces later.
    pub fn resolve_yt_dlp(&self) -> PathBuf {
        self.resolve(&self.yt_dlp_path)
    }

    /// Resolved ffmpeg binary (see [`resolve_yt_dlp`](Self::resolve_yt_dlp))
    pub fn resolve_ffmpeg(&self) -> PathBuf {
        self.resolve(&self.ffmpeg_path)
    }

    fn resolve(&self, configured: &Path) -> PathBuf {
        let is_bare_name = configured.components().count() == 1 && configured.is_relative();
        if self.search_path && is_bare_name {
            match which::which(configured) {
                Ok(found) => return found,
                Err(e) => {
                    tracing::warn!(tool = ?configured, error = %e, "tool not found in PATH");
                }
            }
        }
        configured.to_path_buf()
    }
}

/// Size policy for delivered files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest MP3 the delivery layer accepts, in bytes (default: 50 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

/// Main configuration for the conversion pipeline
///
/// All fields have sensible defaults; `Config::default()` works out of the box
/// when yt-dlp and ffmpeg are on PATH.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directories and retention
    #[serde(default)]
    pub storage: StorageConfig,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Size limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.storage.retention.is_zero() {
            return Err(config_error(
                "retention window must be greater than zero",
                "storage.retention",
            ));
        }
        if self.storage.download_dir == self.storage.converted_dir {
            return Err(config_error(
                "download and converted directories must differ",
                "storage.converted_dir",
            ));
        }
        if self.tools.command_timeout.is_zero() {
            return Err(config_error(
                "command timeout must be greater than zero",
                "tools.command_timeout",
            ));
        }
        if self.tools.audio_bitrate.trim().is_empty() {
            return Err(config_error(
                "audio bitrate must not be empty",
                "tools.audio_bitrate",
            ));
        }
        if self.tools.audio_codec.trim().is_empty() {
            return Err(config_error(
                "audio codec must not be empty",
                "tools.audio_codec",
            ));
        }
        if self.limits.max_file_size == 0 {
            return Err(config_error(
                "maximum file size must be greater than zero",
                "limits.max_file_size",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_converted_dir() -> PathBuf {
    PathBuf::from("./converted")
}

fn default_retention() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_cleanup_initial_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_yt_dlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_audio_codec() -> String {
    "libmp3lame".to_string()
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (whole minutes)
mod minutes_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs() / 60)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let minutes = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(minutes.saturating_mul(60)))
    }
}
