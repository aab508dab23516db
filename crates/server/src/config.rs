// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

/// ESP32 fleet development and telemetry orchestrator.
#[derive(Debug, Clone, Parser)]
#[command(name = "espfleet", version, about)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[arg(long, env = "ESPFLEET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "ESPFLEET_PORT", default_value_t = 8990)]
    pub port: u16,

    /// Value for `Access-Control-Allow-Origin`.
    #[arg(long, env = "ESPFLEET_ALLOW_ORIGIN", default_value = "*")]
    pub allow_origin: String,

    /// Default firmware target (FQBN) used when a request omits one.
    #[arg(long, env = "ESPFLEET_FQBN", default_value = "esp32:esp32:esp32")]
    pub default_fqbn: String,

    /// Path to the arduino-cli binary. Falls back to the vendored copy
    /// under the data directory, then to PATH lookup.
    #[arg(long, env = "ESPFLEET_ARDUINO_CLI")]
    pub arduino_cli: Option<PathBuf>,

    /// Path to the helper Python runtime (esptool, mkspiffs glue).
    #[arg(long, env = "ESPFLEET_PYTHON")]
    pub python: Option<PathBuf>,

    /// Data directory for the workspace config, install log, and builds.
    #[arg(long, env = "ESPFLEET_DATA_DIR", default_value = "./espfleet-data")]
    pub data_dir: PathBuf,

    /// Override for the serial reader subprocess, run via `sh -c` with
    /// `ESPFLEET_PORT` and `ESPFLEET_BAUD` in its environment. When set,
    /// port reachability checks and line-control pulses are skipped.
    #[arg(long, env = "ESPFLEET_MONITOR_COMMAND", hide = true)]
    pub monitor_command: Option<String>,

    /// Broadcaster replay buffer capacity (events).
    #[arg(long, env = "ESPFLEET_REPLAY_CAPACITY", default_value_t = 500)]
    pub replay_capacity: usize,

    /// Per-port ring buffer capacity (lines).
    #[arg(long, env = "ESPFLEET_BUFFER_CAPACITY", default_value_t = 1000)]
    pub buffer_capacity: usize,

    /// Install-log dedup window (entries).
    #[arg(long, env = "ESPFLEET_DEDUP_WINDOW", default_value_t = 50)]
    pub dedup_window: usize,

    /// SSE keep-alive interval in seconds.
    #[arg(long, env = "ESPFLEET_KEEP_ALIVE_SECS", default_value_t = 15)]
    pub keep_alive_secs: u64,

    /// Skip TLS verification for outbound device HTTP calls.
    /// Loopback device addresses are always exempt from verification.
    #[arg(long, env = "ESPFLEET_INSECURE_DEVICE_TLS")]
    pub insecure_device_tls: bool,

    /// Log format (json or text).
    #[arg(long, env = "ESPFLEET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "ESPFLEET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if self.replay_capacity == 0 || self.buffer_capacity == 0 {
            anyhow::bail!("replay and buffer capacities must be positive");
        }
        Ok(())
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    /// Resolve the compile/upload CLI: configured path, vendored binary,
    /// then PATH lookup.
    pub fn build_tool(&self) -> PathBuf {
        if let Some(ref path) = self.arduino_cli {
            return path.clone();
        }
        let vendored = self.data_dir.join("bin").join("arduino-cli");
        if vendored.exists() {
            return vendored;
        }
        PathBuf::from("arduino-cli")
    }

    /// Resolve the helper runtime used for esptool invocations.
    pub fn runtime(&self) -> PathBuf {
        if let Some(ref path) = self.python {
            return path.clone();
        }
        PathBuf::from("python3")
    }

    pub fn workspace_config_path(&self) -> PathBuf {
        self.data_dir.join("workspace.json")
    }

    pub fn install_log_path(&self) -> PathBuf {
        self.data_dir.join("install-log.jsonl")
    }

    pub fn default_workspace_root(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
