//! External process execution
//!
//! Every call into yt-dlp or ffmpeg goes through a [`CommandExecutor`], so the
//! pipeline never spawns processes on its own and tests can substitute a fake.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;

mod system;

pub use system::SystemExecutor;

/// Outcome of a process that ran to completion
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (`-1` if the process was terminated by a signal)
    pub exit_code: i32,
    /// Standard output and standard error, interleaved line by line
    pub output: String,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands to completion
///
/// Implementations must be independent per call: no shared state across
/// invocations, safe to call concurrently.
///
/// # Errors
///
/// - [`Error::ProcessTimeout`](crate::Error::ProcessTimeout) if the command outlives the
///   executor's ceiling. The process is killed and no output is returned.
/// - [`Error::ExternalTool`](crate::Error::ExternalTool) if the command cannot be started.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`, returning its exit code and merged output
    async fn run(&self, program: &Path, args: &[OsString]) -> crate::Result<ProcessOutput>;
}

/// Space-joined command line for log output
pub(crate) fn display_command(program: &Path, args: &[OsString]) -> String {
    let mut line = program.to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Longest tool output quoted in an error message
const MAX_QUOTED_OUTPUT: usize = 2000;

/// The last `MAX_QUOTED_OUTPUT` characters of tool output, for error messages
pub(crate) fn output_tail(output: &str) -> &str {
    let trimmed = output.trim_end();
    let count = trimmed.chars().count();
    if count <= MAX_QUOTED_OUTPUT {
        return trimmed;
    }
    let start = trimmed
        .char_indices()
        .nth(count - MAX_QUOTED_OUTPUT)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &trimmed[start..]
}

/// Short program name for error messages ("/usr/bin/ffmpeg" -> "ffmpeg")
pub(crate) fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned())
}
