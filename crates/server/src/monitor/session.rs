// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single monitor session: owns one child subprocess reading one serial
//! port, frames its output into serial events, and terminates exactly once.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::event::{epoch_ms, EndReason, SerialEnd, SerialEvent, SerialLine};
use crate::install_log::{self, SubmitOutcome};
use crate::runner::{spawn_streaming, StreamingChild};
use crate::state::AppState;

use super::baud;
use super::{detect_signal, strip_ansi, MonitorOptions, SessionState};

/// Grace period between SIGTERM and SIGKILL on stop.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Raw-mode chunk size; each chunk becomes one base64 event.
const RAW_CHUNK: usize = 256;

/// Read-only session descriptor for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub token: String,
    pub port: String,
    pub baud: u32,
    pub state: &'static str,
    pub raw: bool,
    pub line_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_line: Option<String>,
    pub reboot_detected: bool,
    pub started_at: u64,
    pub elapsed_seconds: f64,
}

pub struct MonitorSession {
    pub token: String,
    pub port: String,
    options: MonitorOptions,
    stop_regex: Option<Regex>,
    effective_baud: AtomicU32,
    started: Instant,
    started_at: u64,
    line_count: AtomicU64,
    last_line: Mutex<Option<String>>,
    reboot_detected: AtomicBool,
    state: Mutex<SessionState>,
    stop_reason: Mutex<Option<EndReason>>,
    stop_requested: CancellationToken,
    done: CancellationToken,
    summary: Mutex<Option<SerialEnd>>,
}

impl MonitorSession {
    /// Build a session in `pending` state. Rejects an invalid stop pattern
    /// before anything is registered.
    pub fn new(options: MonitorOptions) -> Result<Arc<Self>, (ApiError, String)> {
        let stop_regex = match options.stop_on.as_deref() {
            Some(pattern) => match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    return Err((
                        ApiError::PatternInvalid,
                        format!("invalid stop pattern {pattern:?}: {e}"),
                    ))
                }
            },
            None => None,
        };

        Ok(Arc::new(Self {
            token: uuid::Uuid::new_v4().to_string(),
            port: options.port.clone(),
            effective_baud: AtomicU32::new(options.baud),
            options,
            stop_regex,
            started: Instant::now(),
            started_at: epoch_ms(),
            line_count: AtomicU64::new(0),
            last_line: Mutex::new(None),
            reboot_detected: AtomicBool::new(false),
            state: Mutex::new(SessionState::Pending),
            stop_reason: Mutex::new(None),
            stop_requested: CancellationToken::new(),
            done: CancellationToken::new(),
            summary: Mutex::new(None),
        }))
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn baud(&self) -> u32 {
        self.effective_baud.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            token: self.token.clone(),
            port: self.port.clone(),
            baud: self.baud(),
            state: self.state().as_str(),
            raw: self.options.raw,
            line_count: self.line_count.load(Ordering::Relaxed),
            last_line: self.last_line.lock().clone(),
            reboot_detected: self.reboot_detected.load(Ordering::Relaxed),
            started_at: self.started_at,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Request cooperative termination. Idempotent; the first caller's
    /// reason wins.
    pub fn request_stop(&self, reason: EndReason) {
        {
            let mut pending = self.stop_reason.lock();
            if pending.is_none() {
                *pending = Some(reason);
            }
        }
        {
            let mut state = self.state.lock();
            if *state == SessionState::Running {
                *state = SessionState::Stopping;
            }
        }
        self.stop_requested.cancel();
    }

    /// Resolve when the session reaches `terminated`. Every waiter receives
    /// the same summary.
    pub async fn wait(&self) -> SerialEnd {
        self.done.cancelled().await;
        self.summary.lock().clone().unwrap_or_else(|| SerialEnd {
            port: self.port.clone(),
            reason: EndReason::Error,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            reboot_detected: self.reboot_detected.load(Ordering::Relaxed),
            last_line: self.last_line.lock().clone(),
            exit_code: -1,
        })
    }

    /// Pre-stream phase: auto-baud probe, boot-reset pulse, child spawn.
    ///
    /// Runs inside the start request so spawn failures surface to the
    /// caller; the streaming read loop runs afterwards on its own task.
    pub async fn prepare(
        self: &Arc<Self>,
        ctx: &Arc<AppState>,
    ) -> Result<StreamingChild, (ApiError, String)> {
        *self.state.lock() = SessionState::Running;

        if self.options.auto_baud {
            let probe = baud::probe(&self.port, self.options.baud).await;
            self.effective_baud.store(probe.selected, Ordering::Relaxed);
            if probe.fallback {
                self.emit_line(
                    ctx,
                    format!(
                        "[monitor] auto-baud inconclusive (best score {:.2}), falling back to {}",
                        probe.score, probe.selected
                    ),
                    false,
                    false,
                );
            } else {
                self.emit_line(
                    ctx,
                    format!(
                        "[monitor] auto-baud selected {} (score {:.2})",
                        probe.selected, probe.score
                    ),
                    false,
                    false,
                );
            }
        }

        if ctx.config.monitor_command.is_none() {
            if let Err(e) = super::pulse_reset(&self.port, None).await {
                tracing::warn!(port = %self.port, err = %e, "reset pulse failed, continuing");
            }
        }

        let baud = self.baud();
        let (program, args) = monitor_command(ctx, &self.port, baud);
        let env = vec![
            ("ESPFLEET_PORT".to_owned(), self.port.clone()),
            ("ESPFLEET_BAUD".to_owned(), baud.to_string()),
        ];
        match spawn_streaming(&program, &args, &env) {
            Ok(child) => Ok(child),
            Err(e) => {
                *self.state.lock() = SessionState::Terminated;
                self.done.cancel();
                tracing::error!(port = %self.port, command = %program.display(), err = %e, "monitor spawn failed");
                Err((ApiError::SpawnFailed, format!("failed to spawn monitor: {e}")))
            }
        }
    }

    /// Streaming read loop plus finalisation. Runs on the session task.
    pub async fn run(self: &Arc<Self>, ctx: &Arc<AppState>, mut child: StreamingChild) {
        let deadline = self
            .options
            .max_seconds
            .filter(|s| *s > 0)
            .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
        let stdout = child.take_stdout();
        let stderr = child.take_stderr();

        let reason = if self.options.raw {
            self.raw_loop(ctx, stdout, stderr, deadline).await
        } else {
            self.line_loop(ctx, stdout, stderr, deadline).await
        };

        {
            let mut state = self.state.lock();
            if *state == SessionState::Running {
                *state = SessionState::Stopping;
            }
        }

        let exit_code = child.stop(STOP_GRACE).await;
        self.finalize(ctx, reason, exit_code);
    }

    async fn line_loop(
        &self,
        ctx: &Arc<AppState>,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        deadline: Option<tokio::time::Instant>,
    ) -> EndReason {
        let Some(stdout) = stdout else {
            return EndReason::Error;
        };
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = stderr.map(|s| BufReader::new(s).lines());
        let mut err_open = err_lines.is_some();

        loop {
            tokio::select! {
                res = out_lines.next_line() => match res {
                    Ok(Some(text)) => {
                        if let Some(reason) = self.handle_line(ctx, text, false) {
                            return reason;
                        }
                    }
                    Ok(None) => return EndReason::Completed,
                    Err(e) => {
                        tracing::warn!(port = %self.port, err = %e, "monitor read error");
                        return EndReason::Error;
                    }
                },
                res = async {
                    match err_lines.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => std::future::pending().await,
                    }
                }, if err_open => match res {
                    Ok(Some(text)) => {
                        if let Some(reason) = self.handle_line(ctx, text, true) {
                            return reason;
                        }
                    }
                    Ok(None) | Err(_) => err_open = false,
                },
                _ = self.stop_requested.cancelled() => return self.pending_stop_reason(),
                _ = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending().await,
                    }
                }, if deadline.is_some() => return EndReason::TimeLimit,
            }
        }
    }

    async fn raw_loop(
        &self,
        ctx: &Arc<AppState>,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        deadline: Option<tokio::time::Instant>,
    ) -> EndReason {
        let Some(mut stdout) = stdout else {
            return EndReason::Error;
        };
        let mut err_lines = stderr.map(|s| BufReader::new(s).lines());
        let mut err_open = err_lines.is_some();
        let mut buf = [0u8; RAW_CHUNK];

        loop {
            tokio::select! {
                res = stdout.read(&mut buf) => match res {
                    Ok(0) => return EndReason::Completed,
                    Ok(n) => {
                        let encoded = base64::engine::general_purpose::STANDARD.encode(&buf[..n]);
                        self.emit_line(ctx, encoded, false, true);
                        if self.line_limit_reached() {
                            return EndReason::LineLimit;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(port = %self.port, err = %e, "monitor read error");
                        return EndReason::Error;
                    }
                },
                res = async {
                    match err_lines.as_mut() {
                        Some(lines) => lines.next_line().await,
                        None => std::future::pending().await,
                    }
                }, if err_open => match res {
                    Ok(Some(text)) => {
                        self.emit_line(ctx, strip_ansi(&text), true, false);
                    }
                    Ok(None) | Err(_) => err_open = false,
                },
                _ = self.stop_requested.cancelled() => return self.pending_stop_reason(),
                _ = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending().await,
                    }
                }, if deadline.is_some() => return EndReason::TimeLimit,
            }
        }
    }

    /// Frame, emit, and test stop conditions for one line. Returns the end
    /// reason when a stop condition fired.
    fn handle_line(&self, ctx: &Arc<AppState>, text: String, stderr: bool) -> Option<EndReason> {
        let text = strip_ansi(&text);
        self.emit_line(ctx, text.clone(), stderr, false);

        if let Some(ref re) = self.stop_regex {
            if re.is_match(&text) {
                return Some(EndReason::PatternMatch);
            }
        }
        if self.line_limit_reached() {
            return Some(EndReason::LineLimit);
        }
        None
    }

    fn line_limit_reached(&self) -> bool {
        match self.options.max_lines {
            Some(max) if max > 0 => self.line_count.load(Ordering::Relaxed) >= max,
            _ => false,
        }
    }

    /// Publish one framed line through the whole pipeline: broadcaster, ring
    /// buffer, captures, health, install-log — in that order, inline.
    fn emit_line(&self, ctx: &Arc<AppState>, text: String, stderr: bool, raw: bool) {
        let line_number = self.line_count.fetch_add(1, Ordering::Relaxed) + 1;
        let line = SerialLine {
            port: self.port.clone(),
            line: text,
            line_number,
            timestamp: epoch_ms(),
            baud: self.baud(),
            raw,
            stream: stderr.then(|| "stderr".to_owned()),
        };

        if !raw {
            *self.last_line.lock() = Some(line.line.clone());
        }
        let class = if !raw && self.options.detect_reboot() {
            detect_signal(&line.line)
        } else {
            None
        };
        if class.is_some() {
            self.reboot_detected.store(true, Ordering::Relaxed);
        }

        ctx.broadcaster.publish(SerialEvent::Serial(line.clone()));
        ctx.buffers.append(line.clone());
        ctx.captures.on_line(&line);
        ctx.health.on_line(&line, class);

        if !raw {
            if let Some(entry) = install_log::parse_line(&line.line) {
                let nickname = ctx.workspace.nickname(&self.port);
                match ctx.install_log.submit(&self.port, nickname, entry.clone()) {
                    Ok(SubmitOutcome::Appended { key }) => {
                        ctx.broadcaster.publish(SerialEvent::InstallLog { key, entry });
                    }
                    Ok(SubmitOutcome::Duplicate) => {
                        tracing::debug!(port = %self.port, device = %entry.device_id, "duplicate install log suppressed");
                    }
                    Err(e) => {
                        tracing::warn!(port = %self.port, err = %e, "install log append failed");
                    }
                }
            }
        }
    }

    fn pending_stop_reason(&self) -> EndReason {
        (*self.stop_reason.lock()).unwrap_or(EndReason::Manual)
    }

    /// Transition to `terminated` exactly once: record the summary, publish
    /// `serial_end`, resolve all waiters.
    fn finalize(&self, ctx: &Arc<AppState>, reason: EndReason, exit_code: i32) {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Terminated {
                return;
            }
            *state = SessionState::Terminated;
        }

        let summary = SerialEnd {
            port: self.port.clone(),
            reason,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            reboot_detected: self.reboot_detected.load(Ordering::Relaxed),
            last_line: self.last_line.lock().clone(),
            exit_code,
        };
        *self.summary.lock() = Some(summary.clone());
        tracing::info!(
            port = %self.port,
            reason = summary.reason.as_str(),
            lines = self.line_count.load(Ordering::Relaxed),
            exit_code,
            "monitor session terminated"
        );
        ctx.broadcaster.publish(SerialEvent::SerialEnd(summary));
        self.done.cancel();
    }
}

/// Build the serial reader command: the configured override via `sh -c`, or
/// the build tool's monitor mode.
fn monitor_command(
    ctx: &Arc<AppState>,
    port: &str,
    baud: u32,
) -> (std::path::PathBuf, Vec<String>) {
    match ctx.config.monitor_command {
        Some(ref template) => {
            (std::path::PathBuf::from("sh"), vec!["-c".to_owned(), template.clone()])
        }
        None => (
            ctx.config.build_tool(),
            vec![
                "monitor".to_owned(),
                "-p".to_owned(),
                port.to_owned(),
                "--config".to_owned(),
                format!("baudrate={baud}"),
            ],
        ),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
