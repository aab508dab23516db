// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn status_codes_match_taxonomy() {
    assert_eq!(ApiError::InvalidInput.http_status(), 400);
    assert_eq!(ApiError::PatternInvalid.http_status(), 400);
    assert_eq!(ApiError::PortBusy.http_status(), 409);
    assert_eq!(ApiError::PortUnreachable.http_status(), 404);
    assert_eq!(ApiError::SessionNotFound.http_status(), 404);
    assert_eq!(ApiError::SpawnFailed.http_status(), 500);
    assert_eq!(ApiError::DeviceUnreachable.http_status(), 502);
    assert_eq!(ApiError::Internal.http_status(), 500);
}

#[test]
fn response_envelope_discriminates_failure() {
    let (status, Json(body)) = ApiError::PortBusy.to_response("port in use");
    assert_eq!(status.as_u16(), 409);
    assert!(!body.ok);
    assert_eq!(body.error, "port in use");
}

#[test]
fn display_is_stable() {
    assert_eq!(ApiError::PatternInvalid.to_string(), "PATTERN_INVALID");
}
