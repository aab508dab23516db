// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session tests that need no running child; the full pipeline is covered
//! by the integration tests.

use super::*;
use crate::monitor::MonitorOptions;

fn options(port: &str) -> MonitorOptions {
    MonitorOptions {
        port: port.to_owned(),
        baud: 115_200,
        auto_baud: false,
        raw: false,
        max_seconds: None,
        max_lines: None,
        stop_on: None,
        detect_reboot: None,
    }
}

#[test]
fn new_session_is_pending_with_fresh_token() {
    let Ok(a) = MonitorSession::new(options("/dev/a")) else {
        unreachable!("session builds");
    };
    let Ok(b) = MonitorSession::new(options("/dev/a")) else {
        unreachable!("session builds");
    };
    assert_eq!(a.state(), crate::monitor::SessionState::Pending);
    assert_ne!(a.token, b.token);
    assert_eq!(a.baud(), 115_200);
}

#[test]
fn invalid_stop_pattern_rejected_up_front() {
    let mut opts = options("/dev/a");
    opts.stop_on = Some("[unclosed".to_owned());
    let Err((err, message)) = MonitorSession::new(opts) else {
        unreachable!("invalid pattern must be rejected");
    };
    assert_eq!(err, ApiError::PatternInvalid);
    assert!(message.contains("[unclosed"));
}

#[test]
fn info_reflects_initial_state() {
    let Ok(session) = MonitorSession::new(options("/dev/ttyUSB3")) else {
        unreachable!("session builds");
    };
    let info = session.info();
    assert_eq!(info.port, "/dev/ttyUSB3");
    assert_eq!(info.state, "pending");
    assert_eq!(info.line_count, 0);
    assert!(info.last_line.is_none());
    assert!(!info.reboot_detected);
}

#[tokio::test]
async fn stop_reason_is_first_writer_wins() {
    let Ok(session) = MonitorSession::new(options("/dev/a")) else {
        unreachable!("session builds");
    };
    session.request_stop(EndReason::TimeLimit);
    session.request_stop(EndReason::Manual);
    assert_eq!(session.pending_stop_reason(), EndReason::TimeLimit);
}
