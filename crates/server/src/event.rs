// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::install_log::InstallLogEntry;

/// Events fanned out to SSE subscribers, tagged with the event type.
///
/// One JSON object per `data:` frame; the `type` tag discriminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerialEvent {
    /// A framed output line from a monitored port.
    Serial(SerialLine),
    /// A monitor session closed.
    SerialEnd(SerialEnd),
    /// A registration record was detected on a port.
    InstallLog { key: String, entry: InstallLogEntry },
}

impl SerialEvent {
    /// Port the event originated from.
    pub fn port(&self) -> Option<&str> {
        match self {
            Self::Serial(line) => Some(&line.port),
            Self::SerialEnd(end) => Some(&end.port),
            Self::InstallLog { .. } => None,
        }
    }
}

/// One framed line (or raw chunk) read from a device's serial output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialLine {
    pub port: String,
    /// Rendered line content; base64-encoded when `raw` is set.
    pub line: String,
    /// Strictly increasing per session, starting at 1.
    pub line_number: u64,
    /// Wall-clock epoch milliseconds at emission.
    pub timestamp: u64,
    /// Baud rate in effect when the line was read.
    pub baud: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub raw: bool,
    /// `"stderr"` when the line came from the child's stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
}

/// Termination summary published exactly once per monitor session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialEnd {
    pub port: String,
    pub reason: EndReason,
    pub elapsed_seconds: f64,
    pub reboot_detected: bool,
    pub last_line: Option<String>,
    pub exit_code: i32,
}

/// Why a monitor session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Manual,
    TimeLimit,
    PatternMatch,
    LineLimit,
    Error,
    Completed,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::TimeLimit => "time_limit",
            Self::PatternMatch => "pattern_match",
            Self::LineLimit => "line_limit",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
