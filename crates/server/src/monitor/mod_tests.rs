// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn crash_signals_classify() {
    assert_eq!(detect_signal("Guru Meditation Error: Core 1 panic'ed"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("Backtrace: 0x4008: 0x3ffb"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("Brownout detector was triggered"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("CPU halted"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("assert failed: do_thing core.c:42"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("LoadProhibited. Exception was unhandled"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("StoreProhibited"), Some(SignalClass::Crash));
    assert_eq!(detect_signal("IllegalInstruction"), Some(SignalClass::Crash));
}

#[test]
fn reboot_signals_classify() {
    assert_eq!(detect_signal("rst:0x1 (POWERON_RESET),boot:0x13"), Some(SignalClass::Reboot));
    assert_eq!(detect_signal("rst:0xc (SW_CPU_RESET)"), Some(SignalClass::Reboot));
}

#[test]
fn ordinary_lines_are_not_signals() {
    assert_eq!(detect_signal("wifi connected, ip: 192.168.1.7"), None);
    assert_eq!(detect_signal("heartbeat 42"), None);
    // Uppercase RST prefix is not the boot-reason marker.
    assert_eq!(detect_signal("RST:0X1"), None);
}

#[test]
fn strip_ansi_removes_color_codes() {
    assert_eq!(strip_ansi("\x1b[0;32mI (123) wifi:\x1b[0m connected"), "I (123) wifi: connected");
    assert_eq!(strip_ansi("plain line"), "plain line");
    assert_eq!(strip_ansi("trailing\r"), "trailing");
    assert_eq!(strip_ansi("\x1b[2J\x1b[Hcleared"), "cleared");
}

#[test]
fn default_detect_reboot_is_on() {
    let options = MonitorOptions {
        port: "/dev/ttyUSB0".to_owned(),
        baud: 115_200,
        auto_baud: false,
        raw: false,
        max_seconds: None,
        max_lines: None,
        stop_on: None,
        detect_reboot: None,
    };
    assert!(options.detect_reboot());
}

#[test]
fn session_state_strings() {
    assert_eq!(SessionState::Pending.as_str(), "pending");
    assert_eq!(SessionState::Running.as_str(), "running");
    assert_eq!(SessionState::Stopping.as_str(), "stopping");
    assert_eq!(SessionState::Terminated.as_str(), "terminated");
}
