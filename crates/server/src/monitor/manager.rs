// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry and lifecycle controller for monitor sessions.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ApiError;
use crate::event::{EndReason, SerialEnd};
use crate::state::AppState;

use super::session::MonitorSession;
use super::MonitorOptions;

#[derive(Default)]
struct Registry {
    by_token: HashMap<String, Arc<MonitorSession>>,
    by_port: HashMap<String, String>,
}

/// Owns the token→session and port→token maps. One session per port.
pub struct MonitorManager {
    inner: Mutex<Registry>,
}

impl MonitorManager {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Registry::default()) }
    }

    /// Start a session: validate, reserve the port, run the pre-stream
    /// phase, then hand the read loop to its own task. The task removes the
    /// registry entry when the session terminates.
    pub async fn start(
        &self,
        ctx: &Arc<AppState>,
        options: MonitorOptions,
    ) -> Result<Arc<MonitorSession>, (ApiError, String)> {
        if ctx.config.monitor_command.is_none() && !Path::new(&options.port).exists() {
            return Err((
                ApiError::PortUnreachable,
                format!("port {} does not exist", options.port),
            ));
        }

        let session = MonitorSession::new(options)?;

        {
            let mut reg = self.inner.lock();
            if reg.by_port.contains_key(&session.port) {
                return Err((
                    ApiError::PortBusy,
                    format!("port {} already has a monitor session", session.port),
                ));
            }
            reg.by_port.insert(session.port.clone(), session.token.clone());
            reg.by_token.insert(session.token.clone(), Arc::clone(&session));
        }

        match session.prepare(ctx).await {
            Ok(child) => {
                let task_session = Arc::clone(&session);
                let task_ctx = Arc::clone(ctx);
                tokio::spawn(async move {
                    task_session.run(&task_ctx, child).await;
                    task_ctx.monitors.remove(&task_session.token);
                });
                tracing::info!(port = %session.port, token = %session.token, baud = session.baud(), "monitor session started");
                Ok(session)
            }
            Err(e) => {
                self.remove(&session.token);
                Err(e)
            }
        }
    }

    /// Look up by token, falling back to port.
    pub fn get(&self, token: Option<&str>, port: Option<&str>) -> Option<Arc<MonitorSession>> {
        let reg = self.inner.lock();
        if let Some(token) = token {
            return reg.by_token.get(token).cloned();
        }
        let port = port?;
        let token = reg.by_port.get(port)?;
        reg.by_token.get(token).cloned()
    }

    pub fn get_by_port(&self, port: &str) -> Option<Arc<MonitorSession>> {
        self.get(None, Some(port))
    }

    /// Active sessions, sorted by port.
    pub fn list(&self) -> Vec<Arc<MonitorSession>> {
        let reg = self.inner.lock();
        let mut sessions: Vec<Arc<MonitorSession>> = reg.by_token.values().cloned().collect();
        sessions.sort_by(|a, b| a.port.cmp(&b.port));
        sessions
    }

    /// Remove a finished session from both maps.
    pub fn remove(&self, token: &str) {
        let mut reg = self.inner.lock();
        if let Some(session) = reg.by_token.remove(token) {
            reg.by_port.remove(&session.port);
        }
    }

    /// Stop one session and wait for its summary.
    pub async fn stop(
        &self,
        token: Option<&str>,
        port: Option<&str>,
    ) -> Option<SerialEnd> {
        let session = self.get(token, port)?;
        session.request_stop(EndReason::Manual);
        Some(session.wait().await)
    }

    /// Stop a port's session (if any) and wait until it has fully released
    /// the port. Used before uploads and resets.
    pub async fn stop_port_and_wait(&self, port: &str) -> Option<SerialEnd> {
        self.stop(None, Some(port)).await
    }

    /// Stop every session and collect the summaries.
    pub async fn stop_all(&self) -> Vec<SerialEnd> {
        let sessions = self.list();
        let mut summaries = Vec::with_capacity(sessions.len());
        for session in &sessions {
            session.request_stop(EndReason::Manual);
        }
        for session in sessions {
            summaries.push(session.wait().await);
        }
        summaries
    }
}

impl Default for MonitorManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
