// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serial port discovery via the external board-list tool.
//!
//! The tool's JSON output has drifted across releases; both the modern
//! `detected_ports` schema and the legacy flat `ports` schema are accepted,
//! and anything unparsable degrades to an empty list with the raw outputs
//! preserved for diagnosis.

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::runner::{run_tool, ToolOptions};
use crate::state::AppState;

const BOARD_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// One discovered serial endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    pub address: String,
    pub protocol: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    /// Candidate firmware target reported by the board-list tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fqbn: Option<String>,
    pub is_target: bool,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Result of one enumeration pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortScan {
    pub ports: Vec<PortRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stderr: Option<String>,
}

/// Known USB-serial adapter names seen on ESP32 dev boards.
fn usb_adapter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        match Regex::new(r"(?i)(usbserial|usbmodem|ttyUSB|ttyACM|SLAB_USBtoUART|wchusbserial|cu\.usb)")
        {
            Ok(re) => re,
            Err(_) => unreachable!("static pattern compiles"),
        }
    })
}

/// Enumerate ports, classify target-class devices, and overlay nicknames.
pub async fn scan(ctx: &Arc<AppState>) -> PortScan {
    let tool = ctx.config.build_tool();
    let args =
        ["board".to_owned(), "list".to_owned(), "--format".to_owned(), "json".to_owned()];
    let output = match run_tool(
        &tool,
        &args,
        ToolOptions { timeout: Some(BOARD_LIST_TIMEOUT), ..Default::default() },
    )
    .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(tool = %tool.display(), err = %e, "board list tool failed to spawn");
            return PortScan {
                ports: Vec::new(),
                raw_stdout: None,
                raw_stderr: Some(format!("spawn failed: {e}")),
            };
        }
    };

    let Some(mut ports) = parse_board_list(&output.stdout) else {
        return PortScan {
            ports: Vec::new(),
            raw_stdout: Some(output.stdout),
            raw_stderr: Some(output.stderr),
        };
    };

    let target_prefix = target_core_prefix(&ctx.workspace.default_fqbn());
    for port in &mut ports {
        port.is_target = port
            .fqbn
            .as_deref()
            .map(|fqbn| fqbn.starts_with(&target_prefix))
            .unwrap_or_else(|| usb_adapter_pattern().is_match(&port.address));
        port.reachable = Path::new(&port.address).exists();
        port.nickname = ctx.workspace.nickname(&port.address);
    }
    ports.sort_by(|a, b| a.address.cmp(&b.address));

    PortScan { ports, raw_stdout: None, raw_stderr: None }
}

/// `esp32:esp32:esp32` → `esp32:esp32` (vendor:architecture).
fn target_core_prefix(fqbn: &str) -> String {
    let mut parts = fqbn.splitn(3, ':');
    match (parts.next(), parts.next()) {
        (Some(vendor), Some(arch)) => format!("{vendor}:{arch}"),
        _ => fqbn.to_owned(),
    }
}

/// Parse the board-list JSON, accepting both known schemas.
fn parse_board_list(stdout: &str) -> Option<Vec<PortRecord>> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;

    // Modern schema: {"detected_ports": [{"port": {...}, "matching_boards": [...]}]}
    if let Some(detected) = value.get("detected_ports").and_then(|v| v.as_array()) {
        return Some(detected.iter().filter_map(parse_detected_port).collect());
    }

    // Legacy flat schema: {"ports": [{"address": ..., "boards": [...]}]}
    if let Some(ports) = value.get("ports").and_then(|v| v.as_array()) {
        return Some(ports.iter().filter_map(parse_legacy_port).collect());
    }

    // An empty object is still a valid "no ports" answer.
    value.as_object().map(|_| Vec::new())
}

fn parse_detected_port(value: &serde_json::Value) -> Option<PortRecord> {
    let port = value.get("port")?;
    let address = port.get("address")?.as_str()?.to_owned();
    let fqbn = value
        .get("matching_boards")
        .and_then(|v| v.as_array())
        .and_then(|boards| boards.first())
        .and_then(|board| board.get("fqbn"))
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    Some(PortRecord {
        protocol: str_field(port, "protocol").unwrap_or_else(|| "serial".to_owned()),
        label: str_field(port, "label").unwrap_or_else(|| address.clone()),
        product: port
            .get("properties")
            .and_then(|p| p.get("product"))
            .and_then(|v| v.as_str())
            .map(str::to_owned),
        vendor_id: port
            .get("properties")
            .and_then(|p| p.get("vid"))
            .and_then(|v| v.as_str())
            .map(str::to_owned),
        fqbn,
        is_target: false,
        reachable: false,
        nickname: None,
        address,
    })
}

fn parse_legacy_port(value: &serde_json::Value) -> Option<PortRecord> {
    let address = value.get("address")?.as_str()?.to_owned();
    let fqbn = value
        .get("boards")
        .and_then(|v| v.as_array())
        .and_then(|boards| boards.first())
        .and_then(|board| board.get("fqbn"))
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    Some(PortRecord {
        protocol: str_field(value, "protocol").unwrap_or_else(|| "serial".to_owned()),
        label: str_field(value, "label").unwrap_or_else(|| address.clone()),
        product: str_field(value, "product"),
        vendor_id: str_field(value, "vid"),
        fqbn,
        is_target: false,
        reachable: false,
        nickname: None,
        address,
    })
}

fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
