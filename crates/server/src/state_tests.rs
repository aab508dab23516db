// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

use crate::config::ServerConfig;

#[test]
fn loopback_detection() {
    assert!(is_loopback("127.0.0.1"));
    assert!(is_loopback("localhost"));
    assert!(is_loopback("localhost:8080"));
    assert!(is_loopback("http://127.0.0.1/info"));
    assert!(!is_loopback("192.168.1.40"));
    assert!(!is_loopback("device.local"));
}

#[tokio::test]
async fn new_state_seeds_workspace_on_disk() {
    let Ok(dir) = tempfile::tempdir() else {
        unreachable!("tempdir");
    };
    let data_dir = dir.path().to_string_lossy().into_owned();
    let argv = vec!["espfleet".to_owned(), "--data-dir".to_owned(), data_dir];
    let Ok(config) = ServerConfig::try_parse_from(argv) else {
        unreachable!("config parses");
    };
    let Ok(state) = AppState::new(config, CancellationToken::new()) else {
        unreachable!("state builds");
    };
    assert!(dir.path().join("workspace.json").exists());
    assert_eq!(state.workspace.default_baud(), 115_200);
    assert!(state.monitors.list().is_empty());
    assert_eq!(state.broadcaster.subscriber_count(), 0);
}
