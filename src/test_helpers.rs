//! Shared test helpers: a scriptable [`CommandExecutor`] stand-in.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::error::Result;
use crate::executor::{CommandExecutor, ProcessOutput};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Handler = dyn Fn(&Path, &[OsString]) -> Result<ProcessOutput> + Send + Sync;

/// Executor that answers every call with a closure and records the calls
pub(crate) struct FakeExecutor {
    handler: Box<Handler>,
    calls: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
}

impl FakeExecutor {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&Path, &[OsString]) -> Result<ProcessOutput> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always exit with `exit_code` and `output`, no side effects
    pub(crate) fn replying(exit_code: i32, output: &str) -> Self {
        let output = output.to_string();
        Self::new(move |_, _| {
            Ok(ProcessOutput {
                exit_code,
                output: output.clone(),
            })
        })
    }

    pub(crate) fn calls(&self) -> Vec<(PathBuf, Vec<OsString>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<ProcessOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        (self.handler)(program, args)
    }
}

/// The argument following `flag`, as a path
pub(crate) fn arg_after(args: &[OsString], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

pub(crate) fn ok(output: &str) -> Result<ProcessOutput> {
    Ok(ProcessOutput {
        exit_code: 0,
        output: output.to_string(),
    })
}
