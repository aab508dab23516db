// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Passive per-port health aggregation off the publish path.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;

use crate::event::{epoch_ms, SerialLine};

/// Window for the rolling crashes-per-minute rate.
const RATE_WINDOW_MS: u64 = 60_000;

/// Classification of a crash/reboot signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalClass {
    Crash,
    Reboot,
}

/// Read-only health report for one port.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortHealth {
    pub port: String,
    pub lines: u64,
    pub stderr_lines: u64,
    pub crash_lines: u64,
    pub reboot_lines: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_crash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reboot: Option<String>,
    pub first_seen: u64,
    pub last_seen: u64,
    pub crashes_per_minute: f64,
}

/// Fleet-wide aggregate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetHealth {
    pub ports: Vec<PortHealth>,
    pub total_lines: u64,
    pub total_crash_lines: u64,
    pub total_reboot_lines: u64,
}

#[derive(Debug, Default)]
struct PortStats {
    lines: u64,
    stderr_lines: u64,
    crash_lines: u64,
    reboot_lines: u64,
    last_crash: Option<String>,
    last_reboot: Option<String>,
    first_seen: u64,
    last_seen: u64,
    crash_times: VecDeque<u64>,
}

/// Aggregates crash/reboot/rate statistics per port. Updated inline by the
/// session line handler; never blocks a publisher.
pub struct HealthMonitor {
    ports: Mutex<HashMap<String, PortStats>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self { ports: Mutex::new(HashMap::new()) }
    }

    /// Record one observed line and its optional crash/reboot classification.
    pub fn on_line(&self, line: &SerialLine, class: Option<SignalClass>) {
        let now = epoch_ms();
        let mut ports = self.ports.lock();
        let stats = ports.entry(line.port.clone()).or_default();
        if stats.first_seen == 0 {
            stats.first_seen = now;
        }
        stats.last_seen = now;
        stats.lines += 1;
        if line.stream.as_deref() == Some("stderr") {
            stats.stderr_lines += 1;
        }
        match class {
            Some(SignalClass::Crash) => {
                stats.crash_lines += 1;
                stats.last_crash = Some(line.line.clone());
                stats.crash_times.push_back(now);
            }
            Some(SignalClass::Reboot) => {
                stats.reboot_lines += 1;
                stats.last_reboot = Some(line.line.clone());
            }
            None => {}
        }
        while let Some(&front) = stats.crash_times.front() {
            if now.saturating_sub(front) > RATE_WINDOW_MS {
                stats.crash_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Health report for one port, if it has ever been seen.
    pub fn report(&self, port: &str) -> Option<PortHealth> {
        let now = epoch_ms();
        let ports = self.ports.lock();
        ports.get(port).map(|stats| to_report(port, stats, now))
    }

    /// Reports for every observed port plus fleet totals.
    pub fn fleet(&self) -> FleetHealth {
        let now = epoch_ms();
        let ports = self.ports.lock();
        let mut reports: Vec<PortHealth> =
            ports.iter().map(|(port, stats)| to_report(port, stats, now)).collect();
        reports.sort_by(|a, b| a.port.cmp(&b.port));
        FleetHealth {
            total_lines: reports.iter().map(|r| r.lines).sum(),
            total_crash_lines: reports.iter().map(|r| r.crash_lines).sum(),
            total_reboot_lines: reports.iter().map(|r| r.reboot_lines).sum(),
            ports: reports,
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn to_report(port: &str, stats: &PortStats, now: u64) -> PortHealth {
    let recent =
        stats.crash_times.iter().filter(|&&t| now.saturating_sub(t) <= RATE_WINDOW_MS).count();
    PortHealth {
        port: port.to_owned(),
        lines: stats.lines,
        stderr_lines: stats.stderr_lines,
        crash_lines: stats.crash_lines,
        reboot_lines: stats.reboot_lines,
        last_crash: stats.last_crash.clone(),
        last_reboot: stats.last_reboot.clone(),
        first_seen: stats.first_seen,
        last_seen: stats.last_seen,
        crashes_per_minute: recent as f64,
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
