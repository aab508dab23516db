// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port nickname HTTP handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct NicknamesResponse {
    pub ok: bool,
    pub nicknames: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetNicknameRequest {
    pub port: String,
    /// Empty string clears the nickname.
    #[serde(default)]
    pub nickname: String,
}

/// `GET /api/port-nicknames` — current nickname map.
pub async fn nicknames(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(NicknamesResponse { ok: true, nicknames: s.workspace.nicknames() })
}

/// `POST /api/port-nicknames` — set or clear a nickname; returns the
/// updated map.
pub async fn set_nickname(
    State(s): State<Arc<AppState>>,
    Json(req): Json<SetNicknameRequest>,
) -> impl IntoResponse {
    if req.port.is_empty() {
        return ApiError::InvalidInput.to_response("port is required").into_response();
    }
    match s.workspace.set_nickname(&req.port, &req.nickname) {
        Ok(map) => Json(NicknamesResponse { ok: true, nicknames: map }).into_response(),
        Err(e) => ApiError::Internal
            .to_response(format!("failed to save workspace config: {e}"))
            .into_response(),
    }
}
