// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capture HTTP handlers: non-blocking start, blocking wait, cancel, list.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::capture::{CaptureDescriptor, CaptureReason, CaptureResult, CaptureSpec};
use crate::error::ApiError;
use crate::state::AppState;

/// Deadline applied when a request omits `timeout_ms`.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureStartRequest {
    pub port: String,
    pub pattern: String,
    pub timeout_ms: Option<u64>,
    pub max_lines: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStartResponse {
    pub ok: bool,
    pub capture_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureWaitResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: CaptureResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureCancelRequest {
    #[serde(alias = "captureId")]
    pub capture_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureCancelResponse {
    pub ok: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CapturesQuery {
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturesResponse {
    pub ok: bool,
    pub captures: Vec<CaptureDescriptor>,
}

fn build_spec(req: &CaptureStartRequest) -> Result<CaptureSpec, (ApiError, String)> {
    if req.port.is_empty() {
        return Err((ApiError::InvalidInput, "port is required".to_owned()));
    }
    let pattern = regex::Regex::new(&req.pattern).map_err(|e| {
        (ApiError::PatternInvalid, format!("invalid capture pattern {:?}: {e}", req.pattern))
    })?;
    Ok(CaptureSpec {
        port: req.port.clone(),
        pattern,
        timeout: Duration::from_millis(req.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS).max(1)),
        max_lines: req.max_lines.unwrap_or(0),
    })
}

// -- Handlers -----------------------------------------------------------------

/// `POST /api/capture/start` — register a capture and return immediately.
pub async fn start(
    State(s): State<Arc<AppState>>,
    Json(req): Json<CaptureStartRequest>,
) -> impl IntoResponse {
    let spec = match build_spec(&req) {
        Ok(spec) => spec,
        Err((err, message)) => return err.to_response(message).into_response(),
    };
    let (capture_id, _rx) = s.captures.start(spec);
    Json(CaptureStartResponse { ok: true, capture_id }).into_response()
}

/// `POST /api/capture/wait` — register a capture and block until it
/// resolves. Timeouts resolve the request with `ok:false`, not an error.
pub async fn wait(
    State(s): State<Arc<AppState>>,
    Json(req): Json<CaptureStartRequest>,
) -> impl IntoResponse {
    let spec = match build_spec(&req) {
        Ok(spec) => spec,
        Err((err, message)) => return err.to_response(message).into_response(),
    };
    let (_, rx) = s.captures.start(spec);
    match rx.await {
        Ok(result) => Json(CaptureWaitResponse {
            ok: result.reason == CaptureReason::Matched,
            result,
        })
        .into_response(),
        Err(_) => ApiError::Internal.to_response("capture dropped without resolving").into_response(),
    }
}

/// `POST /api/capture/cancel` — cancel an active capture.
pub async fn cancel(
    State(s): State<Arc<AppState>>,
    Json(req): Json<CaptureCancelRequest>,
) -> impl IntoResponse {
    if s.captures.cancel(&req.capture_id) {
        Json(CaptureCancelResponse { ok: true, cancelled: true }).into_response()
    } else {
        ApiError::CaptureNotFound
            .to_response(format!("no active capture {}", req.capture_id))
            .into_response()
    }
}

/// `GET /api/captures` — active captures, optionally for one port.
pub async fn list(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CapturesQuery>,
) -> impl IntoResponse {
    Json(CapturesResponse { ok: true, captures: s.captures.active(q.port.as_deref()) })
}
