// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet operation HTTP handlers: compile, upload, flash-all, reset.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::fleet::ResetMethod;
use crate::state::AppState;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CompileRequest {
    pub sketch_path: String,
    pub fqbn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub port: String,
    pub build_path: String,
    pub fqbn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlashAllRequest {
    pub sketch_path: String,
    pub fqbn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetRequest {
    pub port: String,
    #[serde(default)]
    pub method: ResetMethod,
    pub delay_ms: Option<u64>,
}

// -- Handlers -----------------------------------------------------------------

/// `POST /api/compile` — compile one sketch.
pub async fn compile(
    State(s): State<Arc<AppState>>,
    Json(req): Json<CompileRequest>,
) -> impl IntoResponse {
    if req.sketch_path.is_empty() {
        return ApiError::InvalidInput.to_response("sketch_path is required").into_response();
    }
    match crate::fleet::compile(&s, &req.sketch_path, req.fqbn).await {
        Ok(report) => Json(report).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/upload` — upload a build to one port.
pub async fn upload(
    State(s): State<Arc<AppState>>,
    Json(req): Json<UploadRequest>,
) -> impl IntoResponse {
    if req.port.is_empty() || req.build_path.is_empty() {
        return ApiError::InvalidInput
            .to_response("port and build_path are required")
            .into_response();
    }
    match crate::fleet::upload(&s, &req.port, &req.build_path, req.fqbn).await {
        Ok(report) => Json(report).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/flash-all` — compile once, then sequentially upload to every
/// target-class port.
pub async fn flash_all(
    State(s): State<Arc<AppState>>,
    Json(req): Json<FlashAllRequest>,
) -> impl IntoResponse {
    if req.sketch_path.is_empty() {
        return ApiError::InvalidInput.to_response("sketch_path is required").into_response();
    }
    match crate::fleet::flash_all(&s, &req.sketch_path, req.fqbn).await {
        Ok(report) => Json(report).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}

/// `POST /api/reset-device` — line-control or vendor-tool reset.
pub async fn reset_device(
    State(s): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> impl IntoResponse {
    if req.port.is_empty() {
        return ApiError::InvalidInput.to_response("port is required").into_response();
    }
    match crate::fleet::reset_device(&s, &req.port, req.method, req.delay_ms).await {
        Ok(report) => Json(report).into_response(),
        Err((err, message)) => err.to_response(message).into_response(),
    }
}
