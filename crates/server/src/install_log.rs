// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extraction and persistence of device registration records.
//!
//! The firmware announces a registration on its serial output as the
//! `INSTALL_LOG` prefix followed by a bracketed list of `"key:value"`
//! tokens. Entries are appended as JSONL; a submission whose device id was
//! logged within the dedup window is acknowledged as a duplicate and not
//! appended again.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::event::epoch_ms;

/// Marker the firmware prints ahead of the bracketed token list.
pub const INSTALL_LOG_PREFIX: &str = "INSTALL_LOG";

/// One WiFi credential pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiCredential {
    pub ssid: String,
    pub pass: String,
}

/// Parsed registration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallLogEntry {
    pub device_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_main: Option<WifiCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_alt: Option<WifiCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_dev: Option<WifiCredential>,
    #[serde(default)]
    pub note: String,
}

/// Line as persisted in the append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedInstallLog {
    pub timestamp: u64,
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub entry: InstallLogEntry,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Appended { key: String },
    Duplicate,
}

/// Scan a framed line for a registration record.
///
/// Tolerates format drift: the bracketed list is parsed as a JSON string
/// array when possible, falling back to comma-splitting with quote
/// trimming. Returns `None` unless a device id is present.
pub fn parse_line(line: &str) -> Option<InstallLogEntry> {
    let rest = &line[line.find(INSTALL_LOG_PREFIX)? + INSTALL_LOG_PREFIX.len()..];
    let open = rest.find('[')?;
    let close = rest.rfind(']')?;
    if close <= open {
        return None;
    }
    let bracketed = &rest[open..=close];

    let tokens: Vec<String> = match serde_json::from_str::<Vec<String>>(bracketed) {
        Ok(tokens) => tokens,
        Err(_) => bracketed[1..bracketed.len() - 1]
            .split(',')
            .map(|t| t.trim().trim_matches('"').to_owned())
            .filter(|t| !t.is_empty())
            .collect(),
    };

    let mut entry = InstallLogEntry::default();
    for token in &tokens {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "device" | "device_id" => entry.device_id = value.to_owned(),
            "status" => entry.status = value.to_owned(),
            "customer" | "customer_id" => entry.customer_id = value.to_owned(),
            "wifi_main" => entry.wifi_main = parse_wifi(value),
            "wifi_alt" => entry.wifi_alt = parse_wifi(value),
            "wifi_dev" => entry.wifi_dev = parse_wifi(value),
            "note" => entry.note = value.to_owned(),
            _ => {}
        }
    }

    if entry.device_id.is_empty() {
        return None;
    }
    Some(entry)
}

fn parse_wifi(value: &str) -> Option<WifiCredential> {
    let (ssid, pass) = value.split_once('|')?;
    Some(WifiCredential { ssid: ssid.trim().to_owned(), pass: pass.trim().to_owned() })
}

/// Append-only registration log with windowed device-id dedup.
pub struct InstallLogIngester {
    path: PathBuf,
    window: usize,
    recent: Mutex<VecDeque<String>>,
}

impl InstallLogIngester {
    /// Open the ingester, seeding the dedup window from the tail of the
    /// existing log file.
    pub fn new(path: PathBuf, window: usize) -> Self {
        let recent = load_recent_ids(&path, window);
        Self { path, window: window.max(1), recent: Mutex::new(recent) }
    }

    /// Submit an entry: dedup against the window, then append and record.
    pub fn submit(
        &self,
        port: &str,
        nickname: Option<String>,
        entry: InstallLogEntry,
    ) -> std::io::Result<SubmitOutcome> {
        if entry.device_id.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "entry has no device id",
            ));
        }

        // Reserve the window slot under the lock so concurrent submissions
        // of the same device cannot both append.
        {
            let mut recent = self.recent.lock();
            if recent.iter().any(|id| id == &entry.device_id) {
                return Ok(SubmitOutcome::Duplicate);
            }
            recent.push_back(entry.device_id.clone());
            while recent.len() > self.window {
                recent.pop_front();
            }
        }

        let timestamp = epoch_ms();
        let key = format!("{timestamp}-{}", entry.device_id);
        let record =
            PersistedInstallLog { timestamp, port: port.to_owned(), nickname, entry };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        Ok(SubmitOutcome::Appended { key })
    }

    /// The most recent `limit` persisted entries, oldest first.
    pub fn recent_entries(&self, limit: usize) -> Vec<PersistedInstallLog> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let entries: Vec<PersistedInstallLog> = contents
            .lines()
            .filter_map(|line| serde_json::from_str::<PersistedInstallLog>(line).ok())
            .collect();
        let skip = entries.len().saturating_sub(limit);
        entries.into_iter().skip(skip).collect()
    }
}

fn load_recent_ids(path: &Path, window: usize) -> VecDeque<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return VecDeque::new();
    };
    let ids: Vec<String> = contents
        .lines()
        .filter_map(|line| serde_json::from_str::<PersistedInstallLog>(line).ok())
        .map(|record| record.entry.device_id)
        .collect();
    let skip = ids.len().saturating_sub(window);
    ids.into_iter().skip(skip).collect()
}

#[cfg(test)]
#[path = "install_log_tests.rs"]
mod tests;
