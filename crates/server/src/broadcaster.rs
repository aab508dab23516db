// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out hub for serial events with a bounded replay buffer.
//!
//! Publish is non-blocking toward slow subscribers: each subscriber rides a
//! broadcast receiver whose lagging policy drops its oldest undelivered
//! events first. The replay buffer and the subscription handshake share one
//! lock so a new subscriber sees the replay snapshot followed by every later
//! event, with no gap and no duplicate.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::event::SerialEvent;

/// Capacity of the per-subscriber delivery queue before lag kicks in.
const SUBSCRIBER_QUEUE: usize = 1024;

pub struct Broadcaster {
    event_tx: broadcast::Sender<SerialEvent>,
    replay: Mutex<VecDeque<SerialEvent>>,
    replay_capacity: usize,
}

impl Broadcaster {
    pub fn new(replay_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(SUBSCRIBER_QUEUE);
        Self { event_tx, replay: Mutex::new(VecDeque::new()), replay_capacity }
    }

    /// Publish an event to the replay buffer and all live subscribers.
    pub fn publish(&self, event: SerialEvent) {
        let mut replay = self.replay.lock();
        if replay.len() >= self.replay_capacity {
            replay.pop_front();
        }
        replay.push_back(event.clone());
        // Send while holding the replay lock so subscribe() cannot interleave
        // between snapshot and receiver creation.
        let _ = self.event_tx.send(event);
    }

    /// Subscribe: returns the replay snapshot and a live receiver. Dropping
    /// the receiver unsubscribes.
    pub fn subscribe(&self) -> (Vec<SerialEvent>, broadcast::Receiver<SerialEvent>) {
        let replay = self.replay.lock();
        let rx = self.event_tx.subscribe();
        (replay.iter().cloned().collect(), rx)
    }

    /// Current replay buffer contents, oldest first.
    pub fn replay_buffer(&self) -> Vec<SerialEvent> {
        self.replay.lock().iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
