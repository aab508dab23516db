// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor sessions: one child subprocess per serial port, framed into
//! serial events with crash detection and stop-condition enforcement.

pub mod baud;
pub mod manager;
pub mod session;

pub use manager::MonitorManager;
pub use session::MonitorSession;

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::health::SignalClass;

/// Width of each half of the DTR/RTS boot-reset pulse.
const RESET_PULSE: Duration = Duration::from_millis(50);

/// Requested behaviour of a monitor session.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorOptions {
    pub port: String,
    pub baud: u32,
    #[serde(default)]
    pub auto_baud: bool,
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub max_seconds: Option<u64>,
    #[serde(default)]
    pub max_lines: Option<u64>,
    #[serde(default)]
    pub stop_on: Option<String>,
    #[serde(default)]
    pub detect_reboot: Option<bool>,
}

impl MonitorOptions {
    pub fn detect_reboot(&self) -> bool {
        self.detect_reboot.unwrap_or(true)
    }
}

/// Lifecycle of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Running,
    Stopping,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
        }
    }
}

/// Default crash/reboot signal vocabulary for ESP32-class firmware.
const SIGNAL_PATTERNS: &[(&str, SignalClass)] = &[
    (r"rst:0x[0-9a-f]+", SignalClass::Reboot),
    (r"Brownout detector", SignalClass::Crash),
    (r"Backtrace:", SignalClass::Crash),
    (r"Guru Meditation Error", SignalClass::Crash),
    (r"CPU halted", SignalClass::Crash),
    (r"panic", SignalClass::Crash),
    (r"assert failed", SignalClass::Crash),
    (r"(Load|Store|InstrFetch)Prohibited", SignalClass::Crash),
    (r"IllegalInstruction", SignalClass::Crash),
];

fn signal_set() -> &'static [(Regex, SignalClass)] {
    static SET: OnceLock<Vec<(Regex, SignalClass)>> = OnceLock::new();
    SET.get_or_init(|| {
        SIGNAL_PATTERNS
            .iter()
            .filter_map(|(pattern, class)| Regex::new(pattern).ok().map(|re| (re, *class)))
            .collect()
    })
}

/// Classify a line against the crash/reboot signal set.
pub fn detect_signal(line: &str) -> Option<SignalClass> {
    signal_set().iter().find(|(re, _)| re.is_match(line)).map(|(_, class)| *class)
}

/// Strip ANSI escape sequences and stray carriage returns from a framed line.
pub fn strip_ansi(line: &str) -> String {
    static ESCAPES: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match ESCAPES
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-_]").ok())
    {
        Some(re) => re.replace_all(line, ""),
        None => std::borrow::Cow::Borrowed(line),
    };
    stripped.trim_end_matches('\r').to_owned()
}

/// Toggle DTR/RTS to run the target's boot-reset sequence: both low for the
/// pulse width, then both high. Failures are non-fatal for callers.
pub async fn pulse_reset(port: &str, pulse: Option<Duration>) -> anyhow::Result<()> {
    use tokio_serial::SerialPort;

    let pulse = pulse.unwrap_or(RESET_PULSE);
    let builder = tokio_serial::new(port, 115_200).timeout(Duration::from_secs(1));
    let mut serial = tokio_serial::SerialStream::open(&builder)?;

    serial.write_data_terminal_ready(false)?;
    serial.write_request_to_send(false)?;
    tokio::time::sleep(pulse).await;

    serial.write_data_terminal_ready(true)?;
    serial.write_request_to_send(true)?;
    tokio::time::sleep(pulse).await;

    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
