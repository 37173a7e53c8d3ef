// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::config::{LimitsConfig, StorageConfig, ToolsConfig};
use crate::executor::ProcessOutput;
use crate::test_helpers::{FakeExecutor, arg_after, ok};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const METADATA: &str = r#"{"id": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up", "duration": 212, "uploader": "Rick Astley"}"#;

fn test_config(temp: &TempDir, max_file_size: u64) -> Config {
    Config {
        storage: StorageConfig {
            download_dir: temp.path().join("downloads"),
            converted_dir: temp.path().join("converted"),
            ..Default::default()
        },
        tools: ToolsConfig {
            search_path: false,
            ..Default::default()
        },
        limits: LimitsConfig { max_file_size },
    }
}

fn orchestrator_with(
    temp: &TempDir,
    max_file_size: u64,
    executor: FakeExecutor,
) -> ConversionOrchestrator {
    let config = test_config(temp, max_file_size);
    let storage = Arc::new(FileStorage::new(&config.storage));
    ConversionOrchestrator::new(&config, Arc::new(executor), storage)
}

fn is_ffmpeg(program: &Path) -> bool {
    program.ends_with("ffmpeg")
}

/// yt-dlp and ffmpeg that succeed; ffmpeg writes `mp3_size` bytes
fn happy_tools(mp3_size: usize) -> FakeExecutor {
    FakeExecutor::new(move |program, args| {
        if is_ffmpeg(program) {
            let output = PathBuf::from(args.last().unwrap());
            std::fs::write(output, vec![0u8; mp3_size]).unwrap();
            return ok("");
        }
        if args.iter().any(|a| a == "--dump-json") {
            return ok(METADATA);
        }
        let target = arg_after(args, "-o").unwrap();
        std::fs::write(format!("{}.m4a", target.display()), b"m4a audio").unwrap();
        ok("")
    })
}

fn dir_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn successful_request_leaves_only_the_output() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, 1024, happy_tools(100));

    let task = orchestrator.process(URL, 7).await;

    assert_eq!(task.status, ConversionStatus::Completed, "{:?}", task.error_message);
    assert_eq!(task.chat_id, 7);
    assert!(task.error_message().is_none());
    assert!(task.completed_at.unwrap() >= task.created_at);

    let staged = task.staged_path.clone().unwrap();
    let output = task.output_path().unwrap().to_path_buf();
    assert_eq!(staged, temp.path().join("downloads").join("Never_Gonna_Give_You_Up.m4a"));
    assert_eq!(output, temp.path().join("converted").join("Never_Gonna_Give_You_Up.mp3"));
    assert!(!staged.exists(), "staged file must be removed on success");
    assert!(output.exists());

    let meta = task.metadata.as_ref().unwrap();
    assert_eq!(meta.uploader, "Rick Astley");
}

#[tokio::test]
async fn oversized_output_fails_and_removes_both_files() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, 1024, happy_tools(4096));

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    assert_eq!(
        task.error_message(),
        Some("File size (4.00 KB) exceeds the maximum allowed size (1.00 KB)")
    );
    assert!(!task.staged_path.as_ref().unwrap().exists());
    assert!(!task.output_path.as_ref().unwrap().exists());
    assert!(task.completed_at.is_none());
}

#[tokio::test]
async fn output_at_exact_limit_is_accepted() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, 1024, happy_tools(1024));

    let task = orchestrator.process(URL, 1).await;
    assert!(task.is_success());
}

#[tokio::test]
async fn download_failure_is_stage_qualified_and_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let executor = FakeExecutor::new(|_, args| {
        if args.iter().any(|a| a == "--dump-json") {
            return ok(METADATA);
        }
        Ok(ProcessOutput {
            exit_code: 1,
            output: "ERROR: Video unavailable".into(),
        })
    });
    let orchestrator = orchestrator_with(&temp, 1024, executor);

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    let message = task.error_message().unwrap();
    assert!(message.starts_with("Download failed: "), "{message}");
    assert!(message.contains("Video unavailable"));
    assert!(task.staged_path.is_none());
    assert!(task.output_path.is_none());
    assert!(dir_is_empty(&temp.path().join("downloads")));
    assert!(dir_is_empty(&temp.path().join("converted")));
}

#[tokio::test]
async fn metadata_failure_keeps_downloading_accounting() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, 1024, FakeExecutor::replying(0, "no json here"));

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    assert!(
        task.error_message().unwrap().starts_with("Metadata fetch failed: "),
        "{:?}",
        task.error_message()
    );
    assert!(task.metadata.is_none());
}

#[tokio::test]
async fn conversion_failure_keeps_staged_path_for_cleanup() {
    let temp = TempDir::new().unwrap();
    let executor = FakeExecutor::new(|program, args| {
        if is_ffmpeg(program) {
            return Ok(ProcessOutput {
                exit_code: 1,
                output: "Invalid data found when processing input".into(),
            });
        }
        if args.iter().any(|a| a == "--dump-json") {
            return ok(METADATA);
        }
        let target = arg_after(args, "-o").unwrap();
        std::fs::write(format!("{}.webm", target.display()), b"webm audio").unwrap();
        ok("")
    });
    let orchestrator = orchestrator_with(&temp, 1024, executor);

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    assert!(task.error_message().unwrap().starts_with("Conversion failed: "));
    let staged = task.staged_path.clone().unwrap();
    assert!(staged.exists(), "staged file is left for cleanup_task");
    assert!(task.output_path.is_none());

    orchestrator.cleanup_task(&task).await;
    assert!(!staged.exists());
}

#[tokio::test]
async fn timeout_is_reported_under_the_running_stage() {
    let temp = TempDir::new().unwrap();
    let executor = FakeExecutor::new(|program, args| {
        if args.iter().any(|a| a == "--dump-json") {
            return ok(METADATA);
        }
        Err(Error::ProcessTimeout {
            program: crate::executor::program_name(program),
            timeout: Duration::from_secs(300),
        })
    });
    let orchestrator = orchestrator_with(&temp, 1024, executor);

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    assert_eq!(
        task.error_message(),
        Some("Download failed: yt-dlp timed out after 300s")
    );
}

#[tokio::test]
async fn panic_in_a_stage_becomes_a_failed_task() {
    let temp = TempDir::new().unwrap();
    let executor = FakeExecutor::new(|_, _| panic!("executor exploded"));
    let orchestrator = orchestrator_with(&temp, 1024, executor);

    let task = orchestrator.process(URL, 1).await;

    assert_eq!(task.status, ConversionStatus::Failed);
    assert_eq!(task.error_message(), Some("Unexpected error: executor exploded"));
}

#[tokio::test]
async fn cleanup_task_removes_output_and_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(&temp, 1024, happy_tools(10));

    let task = orchestrator.process(URL, 1).await;
    let output = task.output_path().unwrap().to_path_buf();
    assert!(output.exists());

    orchestrator.cleanup_task(&task).await;
    assert!(!output.exists());
    orchestrator.cleanup_task(&task).await;
}

#[tokio::test]
async fn empty_title_falls_back_to_video_id() {
    let temp = TempDir::new().unwrap();
    let executor = FakeExecutor::new(|program, args| {
        if is_ffmpeg(program) {
            std::fs::write(PathBuf::from(args.last().unwrap()), b"mp3").unwrap();
            return ok("");
        }
        if args.iter().any(|a| a == "--dump-json") {
            return ok(r#"{"id": "abc123", "title": "  "}"#);
        }
        let target = arg_after(args, "-o").unwrap();
        std::fs::write(format!("{}.m4a", target.display()), b"m4a").unwrap();
        ok("")
    });
    let orchestrator = orchestrator_with(&temp, 1024, executor);

    let task = orchestrator.process(URL, 1).await;
    assert_eq!(
        task.output_path().unwrap(),
        temp.path().join("converted").join("abc123.mp3")
    );
}

#[tokio::test]
async fn spawned_requests_run_independently() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Arc::new(orchestrator_with(&temp, 1024, happy_tools(10)));

    let first_handle = orchestrator.spawn(URL, 1);
    let second_handle = orchestrator.spawn(URL, 2);

    let first = first_handle.await.unwrap();
    let second = second_handle.await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.chat_id, 1);
    assert_eq!(second.chat_id, 2);
    assert!(first.status.is_terminal());
    assert!(second.status.is_terminal());
}

#[test]
fn file_stem_fallbacks() {
    let mut meta = VideoMetadata {
        title: "My Song!".into(),
        video_id: "xyz".into(),
        url: URL.into(),
        duration: 0,
        uploader: "Unknown".into(),
        thumbnail: None,
    };
    assert_eq!(file_stem(&meta), "My_Song_");

    meta.title = String::new();
    assert_eq!(file_stem(&meta), "xyz");

    meta.video_id = String::new();
    assert_eq!(file_stem(&meta), FALLBACK_STEM);
}

#[test]
fn failure_messages_name_the_stage() {
    assert_eq!(
        failure_message(Stage::Download, &Error::Download("exit code 1".into())),
        "Download failed: exit code 1"
    );
    assert_eq!(
        failure_message(Stage::Conversion, &Error::Conversion("exit code 1".into())),
        "Conversion failed: exit code 1"
    );
    assert_eq!(
        failure_message(Stage::Metadata, &Error::MetadataParse("no record".into())),
        "Metadata fetch failed: no record"
    );
    assert_eq!(
        failure_message(Stage::Conversion, &Error::Unexpected("boom".into())),
        "Unexpected error: boom"
    );
}
