// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safe spawning of external tools with timeout and non-throwing exit capture.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Captured result of a finished tool invocation.
///
/// Non-zero exits are outcomes, not errors; only spawn failures surface as
/// `Err` from [`run_tool`].
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok(&self) -> bool {
        self.exit_code == 0
    }
}

/// Options for [`run_tool`].
#[derive(Debug, Default)]
pub struct ToolOptions {
    pub cwd: Option<std::path::PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// Run an external tool to completion, capturing stdout and stderr.
///
/// On timeout the child is killed and the result carries `exit_code = -1`
/// with a diagnostic in stderr.
pub async fn run_tool(
    program: &Path,
    args: &[String],
    options: ToolOptions,
) -> std::io::Result<ToolOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref cwd) = options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    let child = cmd.spawn()?;
    let wait = child.wait_with_output();

    let output = match options.timeout {
        Some(limit) => match tokio::time::timeout(limit, wait).await {
            Ok(result) => result?,
            Err(_) => {
                // Dropping the wait future drops the child (kill_on_drop).
                return Ok(ToolOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!(
                        "{} timed out after {:.1}s",
                        program.display(),
                        limit.as_secs_f64()
                    ),
                });
            }
        },
        None => wait.await?,
    };

    Ok(ToolOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// A streaming child subprocess whose stdout/stderr the caller frames.
pub struct StreamingChild {
    child: Child,
}

/// Spawn a streaming subprocess with piped stdout and stderr.
pub fn spawn_streaming(
    program: &Path,
    args: &[String],
    env: &[(String, String)],
) -> std::io::Result<StreamingChild> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }
    Ok(StreamingChild { child: cmd.spawn()? })
}

impl StreamingChild {
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Cooperative stop: SIGTERM, wait out the grace period, then SIGKILL.
    /// Returns the child's exit code (`-1` when killed by signal).
    pub async fn stop(&mut self, grace: Duration) -> i32 {
        if let Ok(Some(status)) = self.child.try_wait() {
            return status.code().unwrap_or(-1);
        }

        if let Some(pid) = self.child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(-1),
            _ => {
                let _ = self.child.start_kill();
                match self.child.wait().await {
                    Ok(status) => status.code().unwrap_or(-1),
                    Err(_) => -1,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
