// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end monitor scenarios driven through mock serial subprocesses.

mod support;

use std::time::{Duration, Instant};

use espfleet::capture::{CaptureReason, CaptureSpec};
use espfleet::event::{EndReason, SerialEvent};
use espfleet::monitor::{MonitorOptions, SessionState};

use support::{collect_until_end, end_summary, line_texts, test_context};

const PORT: &str = "/dev/mock0";

fn options() -> MonitorOptions {
    MonitorOptions {
        port: PORT.to_owned(),
        baud: 115_200,
        auto_baud: false,
        raw: false,
        max_seconds: None,
        max_lines: None,
        stop_on: None,
        detect_reboot: None,
    }
}

async fn wait_until_unregistered(ctx: &support::TestContext) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if ctx.state.monitors.get_by_port(PORT).is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ctx.state.monitors.get_by_port(PORT).is_none(), "session never unregistered");
}

#[tokio::test]
async fn crash_detection_marks_reboot_and_completes() {
    let ctx =
        test_context(&["--monitor-command", "printf 'A\\nB\\nGuru Meditation Error\\n'"]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let Ok(session) = ctx.state.monitors.start(&ctx.state, options()).await else {
        unreachable!("session starts");
    };
    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;

    assert_eq!(line_texts(&events, PORT), vec!["A", "B", "Guru Meditation Error"]);
    let Some(end) = end_summary(&events, PORT) else {
        unreachable!("serial_end expected");
    };
    assert_eq!(end.reason, EndReason::Completed);
    assert!(end.reboot_detected);
    assert_eq!(end.exit_code, 0);
    assert_eq!(end.last_line.as_deref(), Some("Guru Meditation Error"));
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn stop_on_pattern_ends_session_and_unregisters() {
    let ctx = test_context(&[
        "--monitor-command",
        "printf 'boot\\ninit\\nREADY\\nX\\nY\\n'; sleep 5",
    ]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let mut opts = options();
    opts.stop_on = Some("READY".to_owned());
    let Ok(_session) = ctx.state.monitors.start(&ctx.state, opts).await else {
        unreachable!("session starts");
    };

    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;
    assert_eq!(line_texts(&events, PORT), vec!["boot", "init", "READY"]);
    let Some(end) = end_summary(&events, PORT) else {
        unreachable!("serial_end expected");
    };
    assert_eq!(end.reason, EndReason::PatternMatch);

    // A terminated session publishes no further serial events.
    let quiet = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(
        !matches!(quiet, Ok(Ok(SerialEvent::Serial(ref line))) if line.port == PORT),
        "no serial events after serial_end"
    );

    wait_until_unregistered(&ctx).await;
}

#[tokio::test]
async fn line_numbers_are_dense_from_one() {
    let ctx = test_context(&["--monitor-command", "printf '1\\n2\\n3\\n4\\n5\\n'"]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let Ok(_session) = ctx.state.monitors.start(&ctx.state, options()).await else {
        unreachable!("session starts");
    };
    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;

    let numbers: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            SerialEvent::Serial(line) if line.port == PORT => Some(line.line_number),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    // The ring buffer saw the same dense ordering.
    let since = ctx.state.buffers.since(PORT, 0);
    assert!(!since.truncated);
    assert_eq!(since.lines.len(), 5);
    assert_eq!(since.next_sequence, 5);
}

#[tokio::test]
async fn auto_baud_on_silent_port_falls_back_with_diagnostic() {
    let ctx = test_context(&["--monitor-command", "printf 'hi\\n'"]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let mut opts = options();
    opts.auto_baud = true;
    opts.baud = 57_600;
    let Ok(session) = ctx.state.monitors.start(&ctx.state, opts).await else {
        unreachable!("session starts");
    };
    // The probe cannot open the mock port, so the requested rate survives.
    assert_eq!(session.baud(), 57_600);

    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;
    let lines = line_texts(&events, PORT);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("auto-baud"), "diagnostic first: {lines:?}");
    assert!(lines[0].contains("falling back"));
    assert_eq!(lines[1], "hi");
}

#[tokio::test]
async fn max_lines_stops_with_line_limit() {
    let ctx = test_context(&[
        "--monitor-command",
        "i=0; while [ $i -lt 100 ]; do echo line-$i; i=$((i+1)); done; sleep 5",
    ]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let mut opts = options();
    opts.max_lines = Some(3);
    let Ok(_session) = ctx.state.monitors.start(&ctx.state, opts).await else {
        unreachable!("session starts");
    };

    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;
    assert_eq!(line_texts(&events, PORT).len(), 3);
    let Some(end) = end_summary(&events, PORT) else {
        unreachable!("serial_end expected");
    };
    assert_eq!(end.reason, EndReason::LineLimit);
}

#[tokio::test]
async fn max_seconds_stops_with_time_limit() {
    let ctx = test_context(&["--monitor-command", "sleep 30"]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let mut opts = options();
    opts.max_seconds = Some(1);
    let Ok(_session) = ctx.state.monitors.start(&ctx.state, opts).await else {
        unreachable!("session starts");
    };

    let started = Instant::now();
    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(10)).await;
    let Some(end) = end_summary(&events, PORT) else {
        unreachable!("serial_end expected");
    };
    assert_eq!(end.reason, EndReason::TimeLimit);
    assert!(end.elapsed_seconds >= 1.0);
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn stop_is_idempotent_and_returns_same_summary() {
    let ctx = test_context(&["--monitor-command", "sleep 30"]);
    let Ok(session) = ctx.state.monitors.start(&ctx.state, options()).await else {
        unreachable!("session starts");
    };

    let Some(first) = ctx.state.monitors.stop(Some(&session.token), None).await else {
        unreachable!("first stop returns a summary");
    };
    // The session is already terminated; stopping again resolves with the
    // same summary.
    session.request_stop(EndReason::Manual);
    let second = session.wait().await;

    assert_eq!(first.reason, EndReason::Manual);
    assert_eq!(second.reason, first.reason);
    assert_eq!(second.exit_code, first.exit_code);
    assert_eq!(second.elapsed_seconds, first.elapsed_seconds);
}

#[tokio::test]
async fn capture_resolves_quickly_on_live_heartbeat() {
    let ctx = test_context(&[
        "--monitor-command",
        "i=0; while [ $i -lt 30 ]; do echo heartbeat; i=$((i+1)); sleep 0.1; done",
    ]);
    let Ok(_session) = ctx.state.monitors.start(&ctx.state, options()).await else {
        unreachable!("session starts");
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let Ok(pattern) = regex::Regex::new("heartbeat") else {
        unreachable!("pattern compiles");
    };
    let spec = CaptureSpec {
        port: PORT.to_owned(),
        pattern,
        timeout: Duration::from_millis(1000),
        max_lines: 0,
    };
    let started = Instant::now();
    let (_, rx) = ctx.state.captures.start(spec);
    let Ok(result) = rx.await else {
        unreachable!("capture resolves");
    };
    assert_eq!(result.reason, CaptureReason::Matched);
    assert!(started.elapsed() < Duration::from_millis(500), "match took {:?}", started.elapsed());

    let _ = ctx.state.monitors.stop_all().await;
}

#[tokio::test]
async fn install_log_lines_are_ingested_and_deduped() {
    let ctx = test_context(&[
        "--monitor-command",
        "printf 'INSTALL_LOG [device:ESP-9, status:registered, customer:c4]\\nINSTALL_LOG [device:ESP-9, status:registered, customer:c4]\\n'",
    ]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let Ok(_session) = ctx.state.monitors.start(&ctx.state, options()).await else {
        unreachable!("session starts");
    };
    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;

    let install_events: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, SerialEvent::InstallLog { .. }))
        .collect();
    assert_eq!(install_events.len(), 1, "duplicate must not publish a second event");

    let entries = ctx.state.install_log.recent_entries(10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry.device_id, "ESP-9");
    assert_eq!(entries[0].port, PORT);
}

#[tokio::test]
async fn raw_mode_emits_base64_chunks() {
    use base64::Engine;

    let ctx = test_context(&["--monitor-command", "printf 'hello-raw'"]);
    let (_, mut rx) = ctx.state.broadcaster.subscribe();

    let mut opts = options();
    opts.raw = true;
    let Ok(_session) = ctx.state.monitors.start(&ctx.state, opts).await else {
        unreachable!("session starts");
    };
    let events = collect_until_end(&mut rx, PORT, Duration::from_secs(5)).await;

    let mut decoded = Vec::new();
    for event in &events {
        if let SerialEvent::Serial(line) = event {
            assert!(line.raw, "raw mode lines carry the raw flag");
            let Ok(chunk) = base64::engine::general_purpose::STANDARD.decode(&line.line) else {
                unreachable!("raw chunk decodes");
            };
            decoded.extend_from_slice(&chunk);
        }
    }
    assert_eq!(decoded, b"hello-raw");

    let Some(end) = end_summary(&events, PORT) else {
        unreachable!("serial_end expected");
    };
    assert_eq!(end.reason, EndReason::Completed);
}

#[tokio::test]
async fn flash_all_compiles_once_and_uploads_sequentially() {
    use std::os::unix::fs::PermissionsExt;

    let tools = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => unreachable!("tempdir: {e}"),
    };
    let log_path = tools.path().join("tool-log.txt");
    let script_path = tools.path().join("mock-cli.sh");

    let board_json = r#"{"detected_ports":[
      {"port":{"address":"/tmp/fleetA","protocol":"serial","label":"A"},
       "matching_boards":[{"name":"ESP32","fqbn":"esp32:esp32:esp32"}]},
      {"port":{"address":"/tmp/fleetB","protocol":"serial","label":"B"},
       "matching_boards":[{"name":"ESP32","fqbn":"esp32:esp32:esp32"}]}]}"#;
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  board) cat <<'EOF'\n{board_json}\nEOF\n  ;;\n  compile) echo \"compile $(date +%s%N)\" >> {log}\n  ;;\n  upload) echo \"upload $3 $(date +%s%N)\" >> {log}\n  ;;\nesac\n",
        log = log_path.to_string_lossy(),
    );
    assert!(std::fs::write(&script_path, script).is_ok());
    let perms = std::fs::Permissions::from_mode(0o755);
    assert!(std::fs::set_permissions(&script_path, perms).is_ok());

    let script_arg = script_path.to_string_lossy().into_owned();
    let ctx = test_context(&["--arduino-cli", script_arg.as_str()]);

    let report = match espfleet::fleet::flash_all(&ctx.state, "Blink", None).await {
        Ok(report) => report,
        Err((err, message)) => unreachable!("flash-all failed: {err} {message}"),
    };

    assert!(report.ok, "aggregate ok");
    assert!(report.compile.ok);
    assert_eq!(report.total, 2);
    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.results[0].port, "/tmp/fleetA");
    assert_eq!(report.results[1].port, "/tmp/fleetB");

    let log = std::fs::read_to_string(&log_path).unwrap_or_default();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3, "one compile, two uploads: {lines:?}");
    assert!(lines[0].starts_with("compile"));
    assert!(lines[1].starts_with("upload /tmp/fleetA"));
    assert!(lines[2].starts_with("upload /tmp/fleetB"));

    // Sequential uploads leave at least the settle delay between them.
    let stamp = |line: &str| -> u128 {
        line.rsplit(' ').next().and_then(|s| s.parse::<u128>().ok()).unwrap_or_default()
    };
    let gap_ns = stamp(lines[2]).saturating_sub(stamp(lines[1]));
    assert!(gap_ns >= 1_900_000_000, "inter-upload gap was {gap_ns}ns");
}
