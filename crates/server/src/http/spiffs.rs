// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SPIFFS proxy HTTP handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceQuery {
    pub device_ip: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    pub device_ip: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub device_ip: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatRequest {
    pub device_ip: String,
    #[serde(default)]
    pub confirm: bool,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/spiffs/list` — list a directory on the device.
pub async fn list(
    State(s): State<Arc<AppState>>,
    Query(q): Query<DeviceQuery>,
) -> impl IntoResponse {
    let dir = q.path.as_deref().unwrap_or("/");
    match crate::spiffs::list(&s, &q.device_ip, dir).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `GET /api/spiffs/read` — read one file from the device.
pub async fn read(
    State(s): State<Arc<AppState>>,
    Query(q): Query<DeviceQuery>,
) -> impl IntoResponse {
    let Some(ref path) = q.path else {
        return ApiError::InvalidInput.to_response("path is required").into_response();
    };
    match crate::spiffs::read(&s, &q.device_ip, path).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/spiffs/write` — create or overwrite one file.
pub async fn write(
    State(s): State<Arc<AppState>>,
    Json(req): Json<WriteRequest>,
) -> impl IntoResponse {
    if req.path.is_empty() {
        return ApiError::InvalidInput.to_response("path is required").into_response();
    }
    match crate::spiffs::write(&s, &req.device_ip, &req.path, &req.content).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `DELETE /api/spiffs/delete` (also accepts POST) — delete one file.
pub async fn delete_file(
    State(s): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    match crate::spiffs::delete(&s, &req.device_ip, &req.path).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `GET /api/spiffs/info` — filesystem usage info.
pub async fn info(
    State(s): State<Arc<AppState>>,
    Query(q): Query<DeviceQuery>,
) -> impl IntoResponse {
    match crate::spiffs::info(&s, &q.device_ip).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/spiffs/format` — format the device filesystem; requires
/// explicit confirmation.
pub async fn format(
    State(s): State<Arc<AppState>>,
    Json(req): Json<FormatRequest>,
) -> impl IntoResponse {
    if !req.confirm {
        return ApiError::InvalidInput
            .to_response("confirm must be true to format the device filesystem")
            .into_response();
    }
    match crate::spiffs::format(&s, &req.device_ip).await {
        Ok(value) => Json(value).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}
