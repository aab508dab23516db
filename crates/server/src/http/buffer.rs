// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ring buffer HTTP handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferStats, BufferedLine, SinceResult};
use crate::error::ApiError;
use crate::state::AppState;

// -- Types --------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BufferQuery {
    pub port: String,
    pub count: Option<usize>,
    pub since: Option<u64>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferLinesResponse {
    pub ok: bool,
    pub lines: Vec<BufferedLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferSinceResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: SinceResult,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BufferStatsQuery {
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferStatsResponse {
    pub ok: bool,
    pub stats: Vec<BufferStats>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BufferClearRequest {
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferClearResponse {
    pub ok: bool,
    pub cleared: usize,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/buffer` — read a port's ring: recent window by default,
/// `since` for incremental catchup, `search` for a regex filter.
pub async fn read(
    State(s): State<Arc<AppState>>,
    Query(q): Query<BufferQuery>,
) -> impl IntoResponse {
    if q.port.is_empty() {
        return ApiError::InvalidInput.to_response("port is required").into_response();
    }

    if let Some(since) = q.since {
        let result = s.buffers.since(&q.port, since);
        return Json(BufferSinceResponse { ok: true, result }).into_response();
    }

    if let Some(ref pattern) = q.search {
        let re = match regex::Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                return ApiError::PatternInvalid
                    .to_response(format!("invalid search pattern {pattern:?}: {e}"))
                    .into_response()
            }
        };
        let lines = s.buffers.search(&q.port, &re, q.limit.unwrap_or(100));
        return Json(BufferLinesResponse { ok: true, lines }).into_response();
    }

    let lines = s.buffers.recent(&q.port, q.count.unwrap_or(100));
    Json(BufferLinesResponse { ok: true, lines }).into_response()
}

/// `GET /api/buffer-stats` — stats for one port or all.
pub async fn stats(
    State(s): State<Arc<AppState>>,
    Query(q): Query<BufferStatsQuery>,
) -> impl IntoResponse {
    match q.port {
        Some(ref port) => match s.buffers.stats(port) {
            Some(stats) => Json(BufferStatsResponse { ok: true, stats: vec![stats] }).into_response(),
            None => ApiError::PortUnreachable
                .to_response(format!("no buffer for port {port}"))
                .into_response(),
        },
        None => Json(BufferStatsResponse { ok: true, stats: s.buffers.stats_all() }).into_response(),
    }
}

/// `POST /api/buffer/clear` — clear one port's ring or all of them.
pub async fn clear(
    State(s): State<Arc<AppState>>,
    Json(req): Json<BufferClearRequest>,
) -> impl IntoResponse {
    let cleared = match req.port {
        Some(ref port) => usize::from(s.buffers.clear(port)),
        None => s.buffers.clear_all(),
    };
    Json(BufferClearResponse { ok: true, cleared })
}
