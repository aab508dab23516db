// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port enumeration HTTP handler.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::ports::PortRecord;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortsResponse {
    pub ok: bool,
    pub ports: Vec<PortRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_stderr: Option<String>,
}

/// `GET /api/ports` — enumerate ports with nicknames overlaid.
pub async fn list(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let scan = crate::ports::scan(&s).await;
    Json(PortsResponse {
        ok: true,
        ports: scan.ports,
        raw_stdout: scan.raw_stdout,
        raw_stderr: scan.raw_stderr,
    })
}
