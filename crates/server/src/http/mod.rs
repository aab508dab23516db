// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + SSE transport: request/response types, axum handlers, router.

pub mod buffer;
pub mod capture;
pub mod events;
pub mod fleet;
pub mod health;
pub mod install_log;
pub mod monitor;
pub mod ports;
pub mod spiffs;
pub mod workspace;

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Embedded console page.
const CONSOLE_HTML: &str = include_str!("../../../../web/console.html");

/// Build the axum `Router` with all fleet routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Console + event stream
        .route("/", get(console))
        .route("/events", get(events::stream))
        // Service
        .route("/api/health", get(service_health))
        .route("/api/server/restart", post(restart))
        // Ports
        .route("/api/ports", get(ports::list))
        .route("/api/port-nicknames", get(workspace::nicknames).post(workspace::set_nickname))
        // Monitor sessions
        .route("/api/monitor/start", post(monitor::start))
        .route("/api/monitor/stop", post(monitor::stop))
        .route("/api/monitor/stop-all", post(monitor::stop_all))
        .route("/api/monitors", get(monitor::list))
        // Ring buffers
        .route("/api/buffer", get(buffer::read))
        .route("/api/buffer-stats", get(buffer::stats))
        .route("/api/buffer/clear", post(buffer::clear))
        // Captures
        .route("/api/capture/start", post(capture::start))
        .route("/api/capture/wait", post(capture::wait))
        .route("/api/capture/cancel", post(capture::cancel))
        .route("/api/captures", get(capture::list))
        // Install logs
        .route("/api/install-logs", get(install_log::list).post(install_log::append))
        // Device health
        .route("/api/device-health", get(health::report))
        // Fleet operations
        .route("/api/compile", post(fleet::compile))
        .route("/api/upload", post(fleet::upload))
        .route("/api/flash-all", post(fleet::flash_all))
        .route("/api/reset-device", post(fleet::reset_device))
        // SPIFFS proxy
        .route("/api/spiffs/list", get(spiffs::list))
        .route("/api/spiffs/read", get(spiffs::read))
        .route("/api/spiffs/write", post(spiffs::write))
        .route("/api/spiffs/delete", delete(spiffs::delete_file).post(spiffs::delete_file))
        .route("/api/spiffs/info", get(spiffs::info))
        .route("/api/spiffs/format", post(spiffs::format))
        // Middleware
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.allow_origin == "*" {
        return CorsLayer::permissive();
    }
    match config.allow_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => CorsLayer::permissive(),
    }
}

/// `GET /` — console page.
pub async fn console() -> impl IntoResponse {
    Html(CONSOLE_HTML)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub ok: bool,
    pub status: String,
    pub uptime_secs: u64,
    pub sessions: usize,
    pub captures: usize,
    pub subscribers: usize,
}

/// `GET /api/health` — service health summary.
pub async fn service_health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ServiceHealth {
        ok: true,
        status: "running".to_owned(),
        uptime_secs: s.started_at.elapsed().as_secs(),
        sessions: s.monitors.list().len(),
        captures: s.captures.active(None).len(),
        subscribers: s.broadcaster.subscriber_count(),
    })
}

/// `POST /api/server/restart` — signal the external supervisor by shutting
/// down gracefully.
pub async fn restart(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    s.shutdown.cancel();
    Json(serde_json::json!({ "ok": true, "restarting": true }))
}
