// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn reset_method_deserializes_and_defaults() {
    #[derive(serde::Deserialize)]
    struct Body {
        #[serde(default)]
        method: ResetMethod,
    }
    let parsed: Body = match serde_json::from_str(r#"{"method":"esptool"}"#) {
        Ok(body) => body,
        Err(e) => unreachable!("deserialize: {e}"),
    };
    assert_eq!(parsed.method, ResetMethod::Esptool);

    let parsed: Body = match serde_json::from_str("{}") {
        Ok(body) => body,
        Err(e) => unreachable!("deserialize: {e}"),
    };
    assert_eq!(parsed.method, ResetMethod::Pulse);
    assert_eq!(parsed.method.as_str(), "pulse");
}

#[test]
fn diag_is_last_nonempty_stderr_line() {
    assert_eq!(truncate_diag("first\nsecond\n\n"), "second");
    assert_eq!(truncate_diag(""), "tool failed with no diagnostics");
    assert_eq!(truncate_diag("   \n \n"), "tool failed with no diagnostics");
}

#[test]
fn diag_is_capped() {
    let long = "x".repeat(500);
    assert_eq!(truncate_diag(&long).len(), 200);
}

#[test]
fn flash_result_serializes_camel_case() {
    let result = FlashResult {
        port: "/dev/a".to_owned(),
        ok: false,
        duration_ms: 1234,
        error: Some("upload failed".to_owned()),
    };
    let json = serde_json::to_value(&result).unwrap_or_default();
    assert_eq!(json["durationMs"], 1234);
    assert_eq!(json["error"], "upload failed");
}
