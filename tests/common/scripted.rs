//! A [`CommandExecutor`] that plays the part of yt-dlp and ffmpeg

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tubeaudio_dl::{CommandExecutor, Error, ProcessOutput, Result};

/// What yt-dlp does in download mode
#[derive(Clone, Debug)]
pub enum DownloadScript {
    /// Exit 0 and write `<target>.<ext>`
    Writes(&'static str),
    /// Exit 0 without writing anything
    WritesNothing,
    /// Exit with the code and print the output
    Exits(i32, &'static str),
    /// Never finish within the ceiling
    TimesOut,
}

/// What ffmpeg does
#[derive(Clone, Debug)]
pub enum TranscodeScript {
    /// Exit 0 and write this many bytes to the output path
    Writes(usize),
    /// Exit with the code and print the output
    Exits(i32, &'static str),
    /// Panic inside the executor
    Panics,
}

/// Scripted stand-in for both external tools
pub struct ScriptedExecutor {
    metadata: (i32, String),
    download: DownloadScript,
    transcode: TranscodeScript,
    calls: Mutex<Vec<Vec<OsString>>>,
}

impl ScriptedExecutor {
    /// Every tool succeeds; ffmpeg writes `mp3_size` bytes
    pub fn succeeding(metadata: &str, mp3_size: usize) -> Self {
        Self {
            metadata: (0, metadata.to_string()),
            download: DownloadScript::Writes("m4a"),
            transcode: TranscodeScript::Writes(mp3_size),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the metadata reply
    pub fn with_metadata(mut self, exit_code: i32, output: &str) -> Self {
        self.metadata = (exit_code, output.to_string());
        self
    }

    /// Replace the download behaviour
    pub fn with_download(mut self, script: DownloadScript) -> Self {
        self.download = script;
        self
    }

    /// Replace the transcode behaviour
    pub fn with_transcode(mut self, script: TranscodeScript) -> Self {
        self.transcode = script;
        self
    }

    /// Argument lists of every call so far
    pub fn calls(&self) -> Vec<Vec<OsString>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of ffmpeg invocations so far
    pub fn transcode_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.iter().any(|a| a == "-acodec"))
            .count()
    }

    fn reply(exit_code: i32, output: &str) -> Result<ProcessOutput> {
        Ok(ProcessOutput {
            exit_code,
            output: output.to_string(),
        })
    }

    fn run_ytdlp(&self, args: &[OsString]) -> Result<ProcessOutput> {
        if args.iter().any(|a| a == "--dump-json") {
            return Self::reply(self.metadata.0, &self.metadata.1);
        }

        let target = arg_after(args, "-o").expect("download call without -o");
        match &self.download {
            DownloadScript::Writes(ext) => {
                std::fs::write(format!("{}.{}", target.display(), ext), b"raw audio").unwrap();
                Self::reply(0, "")
            }
            DownloadScript::WritesNothing => Self::reply(0, ""),
            DownloadScript::Exits(code, output) => Self::reply(*code, output),
            DownloadScript::TimesOut => Err(Error::ProcessTimeout {
                program: "yt-dlp".to_string(),
                timeout: Duration::from_secs(300),
            }),
        }
    }

    fn run_ffmpeg(&self, args: &[OsString]) -> Result<ProcessOutput> {
        match &self.transcode {
            TranscodeScript::Writes(size) => {
                let output = PathBuf::from(args.last().expect("ffmpeg call without output"));
                std::fs::write(output, vec![0u8; *size]).unwrap();
                Self::reply(0, "")
            }
            TranscodeScript::Exits(code, output) => Self::reply(*code, output),
            TranscodeScript::Panics => panic!("ffmpeg wrapper blew up"),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        if program.ends_with("ffmpeg") {
            self.run_ffmpeg(args)
        } else {
            self.run_ytdlp(args)
        }
    }
}

/// The argument following `flag`, as a path
pub fn arg_after(args: &[OsString], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Names of the entries in `dir` (empty if it does not exist)
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
