// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state passed to all handlers via the axum `State`
//! extractor and into session tasks by `Arc`.
//!
//! All singletons live here explicitly — components never reach for
//! globals, and tests inject a fresh context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::broadcaster::Broadcaster;
use crate::buffer::BufferManager;
use crate::capture::CaptureEngine;
use crate::config::ServerConfig;
use crate::health::HealthMonitor;
use crate::install_log::InstallLogIngester;
use crate::monitor::MonitorManager;
use crate::workspace::{WorkspaceConfig, WorkspaceService};

/// Timeout for outbound device HTTP calls.
const DEVICE_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AppState {
    pub config: ServerConfig,
    pub started_at: Instant,
    pub workspace: WorkspaceService,
    pub broadcaster: Broadcaster,
    pub buffers: BufferManager,
    pub captures: Arc<CaptureEngine>,
    pub monitors: MonitorManager,
    pub health: HealthMonitor,
    pub install_log: InstallLogIngester,
    pub shutdown: CancellationToken,
    device_client: reqwest::Client,
    device_client_insecure: reqwest::Client,
}

impl AppState {
    /// Build the context: create the data directory, load (or seed) the
    /// workspace config, and wire up every singleton.
    pub fn new(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let defaults =
            WorkspaceConfig::defaults(config.default_workspace_root(), &config.default_fqbn);
        let workspace = WorkspaceService::load_or_default(config.workspace_config_path(), defaults)?;
        let install_log = InstallLogIngester::new(config.install_log_path(), config.dedup_window);

        let device_client = reqwest::Client::builder()
            .timeout(DEVICE_HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let device_client_insecure = reqwest::Client::builder()
            .timeout(DEVICE_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let broadcaster = Broadcaster::new(config.replay_capacity);
        let buffers = BufferManager::new(config.buffer_capacity);

        Ok(Self {
            config,
            started_at: Instant::now(),
            workspace,
            broadcaster,
            buffers,
            captures: Arc::new(CaptureEngine::new()),
            monitors: MonitorManager::new(),
            health: HealthMonitor::new(),
            install_log,
            shutdown,
            device_client,
            device_client_insecure,
        })
    }

    /// HTTP client for a device address. Verification is skipped when the
    /// insecure flag is set or the address is loopback.
    pub fn device_client(&self, device: &str) -> &reqwest::Client {
        if self.config.insecure_device_tls || is_loopback(device) {
            &self.device_client_insecure
        } else {
            &self.device_client
        }
    }
}

/// Whether a device address (optionally scheme- and port-qualified) points
/// at the local host.
fn is_loopback(device: &str) -> bool {
    let host = device
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split(['/', ':'])
        .next()
        .unwrap_or(device);
    host == "localhost" || host == "127.0.0.1" || host == "::1"
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
