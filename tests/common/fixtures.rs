//! yt-dlp output samples and config builders

use std::path::Path;
use tubeaudio_dl::{Config, LimitsConfig, StorageConfig, ToolsConfig};

/// URL used by most scenarios
pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// `--dump-json` output preceded by the kind of noise yt-dlp prints on stderr
pub const METADATA_WITH_WARNINGS: &str = r#"WARNING: [youtube] Falling back to generic n function search
WARNING: [youtube] dQw4w9WgXcQ: nsig extraction failed: Some formats may be missing
{"id": "dQw4w9WgXcQ", "title": "Rick Astley - Never Gonna Give You Up (Official Video)",
 "duration": 212.0, "uploader": "Rick Astley",
 "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
 "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
 "formats": [{"format_id": "140", "ext": "m4a"}, {"format_id": "251", "ext": "webm"}]}
"#;

/// Stem the title above sanitizes to
pub const EXPECTED_STEM: &str = "Rick_Astley_-_Never_Gonna_Give_You_Up__Official_Video_";

/// Record that never closes
pub const TRUNCATED_METADATA: &str = "{\"id\": \"abc\", \"title\": \"cut off\"\n";

/// Config rooted in `root` that never searches PATH for tools
pub fn test_config(root: &Path, max_file_size: u64) -> Config {
    Config {
        storage: StorageConfig {
            download_dir: root.join("downloads"),
            converted_dir: root.join("converted"),
            ..Default::default()
        },
        tools: ToolsConfig {
            search_path: false,
            ..Default::default()
        },
        limits: LimitsConfig { max_file_size },
    }
}
