//! Parsing of yt-dlp `--dump-json` output

use crate::error::{Error, Result};
use crate::types::VideoMetadata;
use serde::Deserialize;

/// Placeholder for text fields the tool did not report
const UNKNOWN: &str = "Unknown";

/// Pull the first complete JSON object out of mixed tool output
///
/// yt-dlp can print warnings before the payload even with `--no-warnings`. Capture
/// starts at the first line whose trimmed text begins with `{`; from there every
/// structural `{` and `}` adjusts a depth counter and capture ends at the line
/// where the depth returns to zero. Braces inside string literals are ignored.
///
/// # Errors
///
/// [`Error::MetadataParse`] if no line opens a record or the braces never balance.
pub fn extract_json_record(output: &str) -> Result<String> {
    let mut record = String::new();
    let mut started = false;
    let mut scanner = BraceScanner::default();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !started {
            if !trimmed.starts_with('{') {
                continue;
            }
            started = true;
        }

        record.push_str(line);
        record.push('\n');

        for c in line.chars() {
            scanner.feed(c);
        }

        if scanner.depth <= 0 {
            if scanner.depth < 0 {
                return Err(Error::MetadataParse(
                    "unbalanced braces in metadata output".to_string(),
                ));
            }
            return Ok(record.trim().to_string());
        }
    }

    if started {
        Err(Error::MetadataParse(
            "metadata record is incomplete".to_string(),
        ))
    } else {
        Err(Error::MetadataParse(
            "no JSON record in yt-dlp output".to_string(),
        ))
    }
}

/// Nesting depth of JSON objects, skipping string contents
#[derive(Debug, Default)]
struct BraceScanner {
    depth: i64,
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    fn feed(&mut self, c: char) {
        if self.in_string {
            match c {
                _ if self.escaped => self.escaped = false,
                '\\' => self.escaped = true,
                '"' => self.in_string = false,
                _ => {}
            }
            return;
        }
        match c {
            '"' => self.in_string = true,
            '{' => self.depth += 1,
            '}' => self.depth -= 1,
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
}

/// Build [`VideoMetadata`] from a JSON record
///
/// Absent or null fields fall back to "Unknown" (text) or 0 (duration); the
/// canonical URL falls back to `requested_url`.
pub fn parse_metadata(record: &str, requested_url: &str) -> Result<VideoMetadata> {
    let raw: RawMetadata = serde_json::from_str(record)
        .map_err(|e| Error::MetadataParse(format!("invalid metadata JSON: {}", e)))?;

    let duration = raw
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d as u64)
        .unwrap_or(0);

    Ok(VideoMetadata {
        title: raw.title.unwrap_or_else(|| UNKNOWN.to_string()),
        video_id: raw.id.unwrap_or_else(|| UNKNOWN.to_string()),
        url: raw
            .webpage_url
            .unwrap_or_else(|| requested_url.to_string()),
        duration,
        uploader: raw.uploader.unwrap_or_else(|| UNKNOWN.to_string()),
        thumbnail: raw.thumbnail,
    })
}
