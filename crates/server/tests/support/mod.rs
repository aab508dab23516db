// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for integration tests: fresh contexts with a tempdir-backed
//! data directory and optional mock serial subprocesses.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use espfleet::config::ServerConfig;
use espfleet::event::SerialEvent;
use espfleet::state::AppState;

pub struct TestContext {
    pub state: Arc<AppState>,
    // Keeps the data directory alive for the test's duration.
    pub dir: tempfile::TempDir,
}

/// Build a fresh context. `extra_args` are appended to the CLI argv, e.g.
/// `["--monitor-command", "printf 'hi\n'"]`.
pub fn test_context(extra_args: &[&str]) -> TestContext {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => unreachable!("tempdir: {e}"),
    };
    let mut argv: Vec<String> = vec![
        "espfleet".to_owned(),
        "--data-dir".to_owned(),
        dir.path().to_string_lossy().into_owned(),
    ];
    argv.extend(extra_args.iter().map(|s| (*s).to_owned()));

    let config = match ServerConfig::try_parse_from(argv) {
        Ok(config) => config,
        Err(e) => unreachable!("config parse: {e}"),
    };
    let state = match AppState::new(config, CancellationToken::new()) {
        Ok(state) => Arc::new(state),
        Err(e) => unreachable!("state build: {e}"),
    };
    TestContext { state, dir }
}

/// Drain broadcaster events until a `serial_end` for `port` arrives (that
/// event included) or the deadline passes.
pub async fn collect_until_end(
    rx: &mut tokio::sync::broadcast::Receiver<SerialEvent>,
    port: &str,
    deadline: Duration,
) -> Vec<SerialEvent> {
    let mut events = Vec::new();
    let end_at = tokio::time::Instant::now() + deadline;
    loop {
        let remaining = end_at.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => {
                let is_end = matches!(&event, SerialEvent::SerialEnd(end) if end.port == port);
                events.push(event);
                if is_end {
                    break;
                }
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }
    events
}

/// Serial line texts for `port`, in arrival order.
pub fn line_texts(events: &[SerialEvent], port: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SerialEvent::Serial(line) if line.port == port => Some(line.line.clone()),
            _ => None,
        })
        .collect()
}

/// The `serial_end` summary for `port`, if present.
pub fn end_summary(events: &[SerialEvent], port: &str) -> Option<espfleet::event::SerialEnd> {
    events.iter().find_map(|event| match event {
        SerialEvent::SerialEnd(end) if end.port == port => Some(end.clone()),
        _ => None,
    })
}
