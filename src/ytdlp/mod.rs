//! yt-dlp integration: metadata retrieval and audio-only download

use crate::error::{Error, Result};
use crate::executor::{CommandExecutor, output_tail};
use crate::storage::human_size;
use crate::types::VideoMetadata;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

mod parser;

pub use parser::{extract_json_record, parse_metadata};

/// Format selector: best audio-only stream, preferring m4a
const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio";

/// Extensions yt-dlp may append to the requested output path, in probe order
const PROBE_EXTENSIONS: [&str; 4] = ["m4a", "webm", "opus", "mp3"];

/// yt-dlp front end
///
/// # Examples
///
/// ```no_run
/// use tubeaudio_dl::executor::SystemExecutor;
/// use tubeaudio_dl::ytdlp::YtDlp;
/// use std::path::{Path, PathBuf};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ytdlp = YtDlp::new(PathBuf::from("yt-dlp"), Arc::new(SystemExecutor::default()));
///
/// let meta = ytdlp.fetch_metadata("https://youtu.be/dQw4w9WgXcQ").await?;
/// let file = ytdlp
///     .download_audio("https://youtu.be/dQw4w9WgXcQ", Path::new("./downloads/song"))
///     .await?;
/// println!("{} -> {}", meta.title, file.display());
/// # Ok(())
/// # }
/// ```
pub struct YtDlp {
    binary_path: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl YtDlp {
    /// Create a front end for the binary at `binary_path`
    pub fn new(binary_path: PathBuf, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            binary_path,
            executor,
        }
    }

    /// Retrieve video metadata without downloading media
    ///
    /// # Errors
    ///
    /// - [`Error::Download`] if yt-dlp cannot be started or exits nonzero
    /// - [`Error::MetadataParse`] if the output holds no complete JSON record
    /// - [`Error::ProcessTimeout`] if yt-dlp hangs
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        info!(%url, "fetching metadata");

        let args: Vec<OsString> = vec![
            "--dump-json".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--quiet".into(),
            url.into(),
        ];

        let result = self
            .executor
            .run(&self.binary_path, &args)
            .await
            .map_err(as_download_error)?;

        if !result.is_success() {
            return Err(Error::Download(format!(
                "failed to fetch metadata, exit code {}",
                result.exit_code
            )));
        }

        let record = extract_json_record(&result.output)?;
        let metadata = parse_metadata(&record, url)?;

        info!(title = %metadata.title, uploader = %metadata.uploader, "metadata fetched");
        Ok(metadata)
    }

    /// Download the best audio-only stream to `target`
    ///
    /// `target` carries no extension requirement: yt-dlp may append one, so the
    /// file actually written is located with [`resolve_downloaded_file`].
    ///
    /// # Errors
    ///
    /// - [`Error::Download`] on a nonzero exit or when no output file can be found
    /// - [`Error::ProcessTimeout`] if yt-dlp hangs
    pub async fn download_audio(&self, url: &str, target: &Path) -> Result<PathBuf> {
        info!(%url, ?target, "starting audio download");

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Download(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let args: Vec<OsString> = vec![
            "-f".into(),
            AUDIO_FORMAT.into(),
            "-o".into(),
            target.as_os_str().to_owned(),
            "--no-playlist".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            url.into(),
        ];

        let result = self
            .executor
            .run(&self.binary_path, &args)
            .await
            .map_err(as_download_error)?;

        if !result.is_success() {
            return Err(Error::Download(format!(
                "yt-dlp failed with exit code {}\nOutput: {}",
                result.exit_code,
                output_tail(&result.output)
            )));
        }

        let actual = resolve_downloaded_file(target).await.ok_or_else(|| {
            Error::Download(format!("downloaded file not found at {}", target.display()))
        })?;

        match tokio::fs::metadata(&actual).await {
            Ok(meta) => info!(
                file = ?actual.file_name(),
                size = %human_size(meta.len()),
                "audio downloaded"
            ),
            Err(e) => warn!(file = ?actual, error = %e, "downloaded file vanished"),
        }
        Ok(actual)
    }
}

/// Locate the file yt-dlp actually wrote for `target`
///
/// Checked in order:
/// 1. `target` itself
/// 2. `target` plus each of `.m4a`, `.webm`, `.opus`, `.mp3`
/// 3. the first entry in `target`'s directory whose name starts with `target`'s name
pub async fn resolve_downloaded_file(target: &Path) -> Option<PathBuf> {
    if tokio::fs::try_exists(target).await.unwrap_or(false) {
        return Some(target.to_path_buf());
    }

    for ext in PROBE_EXTENSIONS {
        let mut candidate = target.as_os_str().to_owned();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }

    let parent = target.parent()?;
    let base = target.file_name()?.to_string_lossy().into_owned();
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = ?parent, error = %e, "error finding downloaded file");
            return None;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(&base) {
            debug!(found = ?entry.path(), "resolved download by prefix");
            return Some(entry.path());
        }
    }
    None
}

/// Spawn failures surface as download errors; timeouts keep their own kind
fn as_download_error(e: Error) -> Error {
    match e {
        Error::ExternalTool(msg) => Error::Download(msg),
        other => other,
    }
}
