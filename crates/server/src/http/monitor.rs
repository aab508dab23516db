// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor session HTTP handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::event::SerialEnd;
use crate::monitor::session::SessionInfo;
use crate::monitor::MonitorOptions;
use crate::state::AppState;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorStartRequest {
    pub port: String,
    pub baud: Option<u32>,
    #[serde(default)]
    pub auto_baud: bool,
    #[serde(default)]
    pub raw: bool,
    pub max_seconds: Option<u64>,
    pub max_lines: Option<u64>,
    pub stop_on: Option<String>,
    pub detect_reboot: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStartResponse {
    pub ok: bool,
    pub token: String,
    pub port: String,
    pub baud: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorStopRequest {
    pub token: Option<String>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStopResponse {
    pub ok: bool,
    pub summary: SerialEnd,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStopAllResponse {
    pub ok: bool,
    pub stopped: usize,
    pub summaries: Vec<SerialEnd>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorListResponse {
    pub ok: bool,
    pub sessions: Vec<SessionInfo>,
}

// -- Handlers -----------------------------------------------------------------

/// `POST /api/monitor/start` — start a session; responds after the probe
/// and spawn so failures surface to the caller.
pub async fn start(
    State(s): State<Arc<AppState>>,
    Json(req): Json<MonitorStartRequest>,
) -> impl IntoResponse {
    if req.port.is_empty() {
        return ApiError::InvalidInput.to_response("port is required").into_response();
    }
    let options = MonitorOptions {
        port: req.port,
        baud: req.baud.unwrap_or_else(|| s.workspace.default_baud()),
        auto_baud: req.auto_baud,
        raw: req.raw,
        max_seconds: req.max_seconds,
        max_lines: req.max_lines,
        stop_on: req.stop_on,
        detect_reboot: req.detect_reboot,
    };
    match s.monitors.start(&s, options).await {
        Ok(session) => Json(MonitorStartResponse {
            ok: true,
            token: session.token.clone(),
            port: session.port.clone(),
            baud: session.baud(),
        })
        .into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/monitor/stop` — stop by token or port; returns the summary.
pub async fn stop(
    State(s): State<Arc<AppState>>,
    Json(req): Json<MonitorStopRequest>,
) -> impl IntoResponse {
    if req.token.is_none() && req.port.is_none() {
        return ApiError::InvalidInput.to_response("token or port is required").into_response();
    }
    match s.monitors.stop(req.token.as_deref(), req.port.as_deref()).await {
        Some(summary) => Json(MonitorStopResponse { ok: true, summary }).into_response(),
        None => ApiError::SessionNotFound.to_response("no matching session").into_response(),
    }
}

/// `POST /api/monitor/stop-all` — stop every session.
pub async fn stop_all(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let summaries = s.monitors.stop_all().await;
    Json(MonitorStopAllResponse { ok: true, stopped: summaries.len(), summaries })
}

/// `GET /api/monitors` — list active sessions.
pub async fn list(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = s.monitors.list().iter().map(|session| session.info()).collect();
    Json(MonitorListResponse { ok: true, sessions })
}
