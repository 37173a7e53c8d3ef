//! Process executor backed by `tokio::process`

use super::{CommandExecutor, ProcessOutput, display_command, program_name};
use crate::config::DEFAULT_COMMAND_TIMEOUT;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Executor that spawns real processes
///
/// Standard output and standard error are both piped and read concurrently;
/// lines are appended to a single buffer in the order they arrive. The whole
/// run (reading plus waiting for exit) is bounded by `timeout`, after which the
/// child is killed and reaped.
///
/// # Examples
///
/// ```no_run
/// use tubeaudio_dl::executor::{CommandExecutor, SystemExecutor};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = SystemExecutor::default();
/// let out = executor.run(Path::new("yt-dlp"), &["--version".into()]).await?;
/// println!("exit {}: {}", out.exit_code, out.output);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    timeout: Duration,
}

impl SystemExecutor {
    /// Create an executor with an explicit ceiling per command
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The ceiling applied to every command
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &Path, args: &[OsString]) -> crate::Result<ProcessOutput> {
        let name = program_name(program);
        debug!(command = %display_command(program, args), "executing command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| crate::Error::ExternalTool(format!("failed to execute {}: {}", name, e)))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            crate::Error::ExternalTool(format!("{} stdout was not captured", name))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            crate::Error::ExternalTool(format!("{} stderr was not captured", name))
        })?;

        let finished = tokio::time::timeout(self.timeout, async {
            let output = read_merged(stdout, stderr).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, output))
        })
        .await;

        match finished {
            Ok(Ok((status, output))) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!(program = %name, exit_code, "command finished");
                Ok(ProcessOutput { exit_code, output })
            }
            Ok(Err(e)) => Err(crate::Error::ExternalTool(format!(
                "failed to collect {} output: {}",
                name, e
            ))),
            Err(_) => {
                warn!(program = %name, timeout = ?self.timeout, "command timed out, killing");
                if let Err(e) = child.kill().await {
                    warn!(program = %name, error = %e, "failed to kill timed out command");
                }
                Err(crate::Error::ProcessTimeout {
                    program: name,
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Read both streams to end-of-stream, interleaving whole lines
async fn read_merged<O, E>(stdout: O, stderr: E) -> std::io::Result<String>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    // read_until keeps partial lines in these buffers across select! iterations
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_done = false;
    let mut err_done = false;
    let mut merged = String::new();

    while !(out_done && err_done) {
        tokio::select! {
            n = out.read_until(b'\n', &mut out_buf), if !out_done => {
                if n? == 0 {
                    out_done = true;
                }
                flush_line(&mut out_buf, &mut merged, out_done);
            }
            n = err.read_until(b'\n', &mut err_buf), if !err_done => {
                if n? == 0 {
                    err_done = true;
                }
                flush_line(&mut err_buf, &mut merged, err_done);
            }
        }
    }

    Ok(merged)
}

fn flush_line(buf: &mut Vec<u8>, merged: &mut String, at_eof: bool) {
    if buf.is_empty() || !(at_eof || buf.ends_with(b"\n")) {
        return;
    }
    let text = String::from_utf8_lossy(buf);
    let line = text.trim_end_matches(['\n', '\r']);
    trace!(line, "command output");
    merged.push_str(line);
    merged.push('\n');
    buf.clear();
}
