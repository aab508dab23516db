// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device health HTTP handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::health::{FleetHealth, PortHealth};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HealthQuery {
    pub port: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortHealthResponse {
    pub ok: bool,
    pub health: PortHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetHealthResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub fleet: FleetHealth,
}

/// `GET /api/device-health` — one port's report, or the fleet summary.
pub async fn report(
    State(s): State<Arc<AppState>>,
    Query(q): Query<HealthQuery>,
) -> impl IntoResponse {
    match q.port {
        Some(ref port) => match s.health.report(port) {
            Some(health) => Json(PortHealthResponse { ok: true, health }).into_response(),
            None => ApiError::PortUnreachable
                .to_response(format!("no health data for port {port}"))
                .into_response(),
        },
        None => Json(FleetHealthResponse { ok: true, fleet: s.health.fleet() }).into_response(),
    }
}
