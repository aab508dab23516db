// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Install-log HTTP handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::event::SerialEvent;
use crate::install_log::{InstallLogEntry, PersistedInstallLog, SubmitOutcome};
use crate::state::AppState;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstallLogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallLogsResponse {
    pub ok: bool,
    pub entries: Vec<PersistedInstallLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendInstallLogRequest {
    pub port: String,
    pub entry: InstallLogEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppendInstallLogResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/install-logs` — recent persisted entries.
pub async fn list(
    State(s): State<Arc<AppState>>,
    Query(q): Query<InstallLogsQuery>,
) -> impl IntoResponse {
    let entries = s.install_log.recent_entries(q.limit.unwrap_or(50));
    Json(InstallLogsResponse { ok: true, entries })
}

/// `POST /api/install-logs` — append an entry; dedup applies.
pub async fn append(
    State(s): State<Arc<AppState>>,
    Json(req): Json<AppendInstallLogRequest>,
) -> impl IntoResponse {
    if req.entry.device_id.is_empty() {
        return ApiError::InvalidInput.to_response("entry.deviceId is required").into_response();
    }
    let nickname = s.workspace.nickname(&req.port);
    match s.install_log.submit(&req.port, nickname, req.entry.clone()) {
        Ok(SubmitOutcome::Appended { key }) => {
            s.broadcaster
                .publish(SerialEvent::InstallLog { key: key.clone(), entry: req.entry });
            Json(AppendInstallLogResponse { ok: true, key: Some(key), duplicate: None })
                .into_response()
        }
        Ok(SubmitOutcome::Duplicate) => {
            Json(AppendInstallLogResponse { ok: true, key: None, duplicate: Some(true) })
                .into_response()
        }
        Err(e) => ApiError::Internal
            .to_response(format!("failed to append install log: {e}"))
            .into_response(),
    }
}
