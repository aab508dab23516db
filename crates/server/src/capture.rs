// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named, deadline-bounded waits for a regex over a port's live stream.
//!
//! A capture resolves exactly once — matched, timeout, cancelled, or
//! line-cap — by removing its descriptor from the active set and consuming
//! its oneshot sender. Later lines for the port no longer see it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::event::{epoch_ms, SerialLine};

/// Lines accumulated for context when no explicit cap is set.
const DEFAULT_ACCUMULATE: usize = 100;

/// How a capture resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureReason {
    Matched,
    Timeout,
    Cancelled,
    LineCap,
}

/// Parameters for starting a capture. The pattern is compiled by the caller
/// so invalid input is rejected before anything is registered.
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    pub port: String,
    pub pattern: Regex,
    pub timeout: Duration,
    pub max_lines: u64,
}

/// Final state of a resolved capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub capture_id: String,
    pub port: String,
    pub pattern: String,
    pub reason: CaptureReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_line: Option<SerialLine>,
    pub lines: Vec<SerialLine>,
    pub elapsed_ms: u64,
}

/// Read-only view of an active capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDescriptor {
    pub capture_id: String,
    pub port: String,
    pub pattern: String,
    pub timeout_ms: u64,
    pub max_lines: u64,
    pub started_at: u64,
    pub lines_seen: u64,
}

struct ActiveCapture {
    port: String,
    pattern: Regex,
    started: Instant,
    started_at: u64,
    timeout: Duration,
    max_lines: u64,
    lines_seen: u64,
    collected: Vec<SerialLine>,
    resolver: oneshot::Sender<CaptureResult>,
}

/// Registry of in-flight captures.
pub struct CaptureEngine {
    active: Mutex<HashMap<String, ActiveCapture>>,
}

impl CaptureEngine {
    pub fn new() -> Self {
        Self { active: Mutex::new(HashMap::new()) }
    }

    /// Register a capture and arm its deadline. Returns the capture id and a
    /// receiver that resolves exactly once.
    pub fn start(self: &Arc<Self>, spec: CaptureSpec) -> (String, oneshot::Receiver<CaptureResult>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        let capture = ActiveCapture {
            port: spec.port,
            pattern: spec.pattern,
            started: Instant::now(),
            started_at: epoch_ms(),
            timeout: spec.timeout,
            max_lines: spec.max_lines,
            lines_seen: 0,
            collected: Vec::new(),
            resolver: tx,
        };
        self.active.lock().insert(id.clone(), capture);

        let engine = Arc::clone(self);
        let deadline_id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(spec.timeout).await;
            engine.resolve(&deadline_id, CaptureReason::Timeout, None);
        });

        (id, rx)
    }

    /// Evaluate a freshly emitted line against every active capture for its
    /// port. Called inline on the publish path.
    pub fn on_line(&self, line: &SerialLine) {
        let mut resolutions: Vec<(String, CaptureReason, Option<SerialLine>)> = Vec::new();
        {
            let mut active = self.active.lock();
            for (id, capture) in active.iter_mut() {
                if capture.port != line.port {
                    continue;
                }
                capture.lines_seen += 1;
                if capture.pattern.is_match(&line.line) {
                    resolutions.push((id.clone(), CaptureReason::Matched, Some(line.clone())));
                    continue;
                }
                let cap = if capture.max_lines > 0 {
                    capture.max_lines as usize
                } else {
                    DEFAULT_ACCUMULATE
                };
                if capture.collected.len() < cap {
                    capture.collected.push(line.clone());
                }
                if capture.max_lines > 0 && capture.collected.len() as u64 >= capture.max_lines {
                    resolutions.push((id.clone(), CaptureReason::LineCap, None));
                }
            }
        }
        for (id, reason, matched) in resolutions {
            self.resolve(&id, reason, matched);
        }
    }

    /// Cancel an active capture. Returns whether it was still active.
    pub fn cancel(&self, id: &str) -> bool {
        self.resolve(id, CaptureReason::Cancelled, None)
    }

    /// Active captures, optionally filtered by port.
    pub fn active(&self, port: Option<&str>) -> Vec<CaptureDescriptor> {
        let active = self.active.lock();
        let mut list: Vec<CaptureDescriptor> = active
            .iter()
            .filter(|(_, c)| port.is_none_or(|p| c.port == p))
            .map(|(id, c)| CaptureDescriptor {
                capture_id: id.clone(),
                port: c.port.clone(),
                pattern: c.pattern.as_str().to_owned(),
                timeout_ms: c.timeout.as_millis() as u64,
                max_lines: c.max_lines,
                started_at: c.started_at,
                lines_seen: c.lines_seen,
            })
            .collect();
        list.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        list
    }

    /// Remove a capture from the active set and resolve its future. Returns
    /// false when the capture already resolved.
    fn resolve(&self, id: &str, reason: CaptureReason, matched: Option<SerialLine>) -> bool {
        let Some(capture) = self.active.lock().remove(id) else {
            return false;
        };
        let mut lines = capture.collected;
        if let Some(ref line) = matched {
            lines.push(line.clone());
        }
        let result = CaptureResult {
            capture_id: id.to_owned(),
            port: capture.port,
            pattern: capture.pattern.as_str().to_owned(),
            reason,
            matched_line: matched,
            lines,
            elapsed_ms: capture.started.elapsed().as_millis() as u64,
        };
        let _ = capture.resolver.send(result);
        true
    }
}

impl Default for CaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
