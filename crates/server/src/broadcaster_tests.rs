// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

use crate::event::{SerialEvent, SerialLine};

fn line(n: u64) -> SerialEvent {
    SerialEvent::Serial(SerialLine {
        port: "/dev/ttyUSB0".to_owned(),
        line: format!("line {n}"),
        line_number: n,
        timestamp: n,
        baud: 115_200,
        raw: false,
        stream: None,
    })
}

fn line_number(event: &SerialEvent) -> u64 {
    match event {
        SerialEvent::Serial(l) => l.line_number,
        _ => 0,
    }
}

#[test]
fn replay_buffer_is_bounded_fifo() {
    let hub = Broadcaster::new(3);
    for n in 1..=5 {
        hub.publish(line(n));
    }
    let replay = hub.replay_buffer();
    assert_eq!(replay.len(), 3);
    assert_eq!(replay.iter().map(line_number).collect::<Vec<_>>(), vec![3, 4, 5]);
}

#[tokio::test]
async fn subscriber_sees_replay_then_live() {
    let hub = Broadcaster::new(10);
    hub.publish(line(1));
    hub.publish(line(2));

    let (replay, mut rx) = hub.subscribe();
    assert_eq!(replay.iter().map(line_number).collect::<Vec<_>>(), vec![1, 2]);

    hub.publish(line(3));
    let Ok(live) = rx.recv().await else {
        unreachable!("live event expected");
    };
    assert_eq!(line_number(&live), 3);
}

#[tokio::test]
async fn no_gap_no_duplicate_across_subscribe() {
    let hub = Arc::new(Broadcaster::new(100));

    // Publish from another task while subscribing repeatedly; each observed
    // sequence must be the replay prefix followed contiguously by live.
    let publisher = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            for n in 1..=50 {
                hub.publish(line(n));
                tokio::task::yield_now().await;
            }
        })
    };

    let (replay, mut rx) = hub.subscribe();
    let mut seen: Vec<u64> = replay.iter().map(line_number).collect();
    while seen.len() < 50 {
        match rx.recv().await {
            Ok(event) => seen.push(line_number(&event)),
            Err(_) => break,
        }
    }
    let _ = publisher.await;

    assert_eq!(seen, (1..=50).collect::<Vec<_>>());
}

#[test]
fn subscriber_count_tracks_receivers() {
    let hub = Broadcaster::new(10);
    assert_eq!(hub.subscriber_count(), 0);
    let (_, rx) = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 1);
    drop(rx);
    assert_eq!(hub.subscriber_count(), 0);
}
