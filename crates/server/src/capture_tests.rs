// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::SerialLine;

fn engine() -> Arc<CaptureEngine> {
    Arc::new(CaptureEngine::new())
}

fn spec(port: &str, pattern: &str, timeout: Duration, max_lines: u64) -> CaptureSpec {
    let Ok(pattern) = Regex::new(pattern) else {
        unreachable!("pattern compiles");
    };
    CaptureSpec { port: port.to_owned(), pattern, timeout, max_lines }
}

fn line(port: &str, text: &str) -> SerialLine {
    SerialLine {
        port: port.to_owned(),
        line: text.to_owned(),
        line_number: 1,
        timestamp: 0,
        baud: 115_200,
        raw: false,
        stream: None,
    }
}

#[tokio::test]
async fn match_resolves_with_matching_line() {
    let engine = engine();
    let (_, rx) = engine.start(spec("/dev/a", "READY", Duration::from_secs(5), 0));

    engine.on_line(&line("/dev/a", "boot"));
    engine.on_line(&line("/dev/a", "READY steady"));

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Matched);
    assert_eq!(result.matched_line.map(|l| l.line).as_deref(), Some("READY steady"));
    // Accumulated context includes the prior line and the match.
    assert_eq!(result.lines.len(), 2);
    assert!(engine.active(None).is_empty());
}

#[tokio::test]
async fn lines_for_other_ports_are_ignored() {
    let engine = engine();
    let (_, rx) = engine.start(spec("/dev/a", "READY", Duration::from_millis(200), 0));
    engine.on_line(&line("/dev/b", "READY"));

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Timeout);
}

#[tokio::test]
async fn timeout_resolves_once_and_removes() {
    let engine = engine();
    let started = Instant::now();
    let (_, rx) = engine.start(spec("/dev/a", "never", Duration::from_millis(250), 0));

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(started.elapsed() < Duration::from_millis(1500));
    assert!(engine.active(None).is_empty());

    // A late matching line is ignored; the capture is gone.
    engine.on_line(&line("/dev/a", "never say never"));
}

#[tokio::test]
async fn line_cap_resolves_without_match() {
    let engine = engine();
    let (_, rx) = engine.start(spec("/dev/a", "READY", Duration::from_secs(5), 3));
    for n in 0..3 {
        engine.on_line(&line("/dev/a", &format!("noise {n}")));
    }

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::LineCap);
    assert_eq!(result.lines.len(), 3);
    assert!(result.matched_line.is_none());
}

#[tokio::test]
async fn cancel_resolves_as_cancelled() {
    let engine = engine();
    let (id, rx) = engine.start(spec("/dev/a", "READY", Duration::from_secs(5), 0));
    assert!(engine.cancel(&id));
    assert!(!engine.cancel(&id));

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Cancelled);
}

#[tokio::test]
async fn match_wins_over_later_timeout() {
    let engine = engine();
    let (_, rx) = engine.start(spec("/dev/a", "hit", Duration::from_millis(200), 0));
    engine.on_line(&line("/dev/a", "hit"));

    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Matched);
    // The deadline task fires later against a resolved capture; nothing to
    // observe beyond it not panicking.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn active_lists_descriptors_per_port() {
    let engine = engine();
    let (id_a, _rx_a) = engine.start(spec("/dev/a", "x", Duration::from_secs(5), 0));
    let (_id_b, _rx_b) = engine.start(spec("/dev/b", "y", Duration::from_secs(5), 7));

    assert_eq!(engine.active(None).len(), 2);
    let only_a = engine.active(Some("/dev/a"));
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].capture_id, id_a);
    assert_eq!(engine.active(Some("/dev/b"))[0].max_lines, 7);
}

#[tokio::test]
async fn serialized_reason_is_kebab_case() {
    let json = serde_json::to_value(CaptureReason::LineCap).unwrap_or_default();
    assert_eq!(json, "line-cap");
}
