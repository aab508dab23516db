// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! espfleet: ESP32 fleet development and telemetry orchestrator.
//!
//! A host-side service that discovers USB-connected devices, compiles and
//! flashes firmware in controlled sequences, streams their serial output to
//! browser clients over SSE, detects crashes and registration events, and
//! exposes everything through a JSON HTTP surface.

pub mod broadcaster;
pub mod buffer;
pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod fleet;
pub mod health;
pub mod http;
pub mod install_log;
pub mod monitor;
pub mod ports;
pub mod runner;
pub mod spiffs;
pub mod state;
pub mod workspace;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::http::build_router;
use crate::state::AppState;

/// Run the fleet server until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(config, shutdown.clone())?);

    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("espfleet listening on {addr}");

    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    let summaries = state.monitors.stop_all().await;
    if !summaries.is_empty() {
        tracing::info!(sessions = summaries.len(), "drained monitor sessions on shutdown");
    }

    Ok(())
}

/// Cancel the shutdown token on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let term = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                }
                Err(_) => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term => {}
        }
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}
