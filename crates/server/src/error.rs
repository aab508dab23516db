// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kinds for the fleet API.
///
/// External-tool failures (non-zero exits, tool timeouts) are not errors —
/// they are outcomes surfaced with full stdout/stderr in the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    InvalidInput,
    PortBusy,
    PortUnreachable,
    SessionNotFound,
    CaptureNotFound,
    SpawnFailed,
    PatternInvalid,
    DeviceUnreachable,
    Internal,
}

impl ApiError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::PortBusy => 409,
            Self::PortUnreachable => 404,
            Self::SessionNotFound => 404,
            Self::CaptureNotFound => 404,
            Self::SpawnFailed => 500,
            Self::PatternInvalid => 400,
            Self::DeviceUnreachable => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::PortBusy => "PORT_BUSY",
            Self::PortUnreachable => "PORT_UNREACHABLE",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::CaptureNotFound => "CAPTURE_NOT_FOUND",
            Self::SpawnFailed => "SPAWN_FAILED",
            Self::PatternInvalid => "PATTERN_INVALID",
            Self::DeviceUnreachable => "DEVICE_UNREACHABLE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_response(&self, message: impl Into<String>) -> (StatusCode, Json<ErrorEnvelope>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorEnvelope { ok: false, error: message.into() }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform failure envelope: `{ok: false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
