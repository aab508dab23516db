// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-port bounded line rings with dense, strictly increasing sequence
//! numbers.
//!
//! Sequence numbers start at 1 per port and are never reused. Eviction is
//! FIFO; `since` queries signal truncation when the requested position has
//! already been evicted.

use std::collections::HashMap;
use std::collections::VecDeque;

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;

use crate::event::SerialLine;

/// One retained line with its per-port sequence number.
#[derive(Debug, Clone, Serialize)]
pub struct BufferedLine {
    pub seq: u64,
    #[serde(flatten)]
    pub line: SerialLine,
}

/// Read-only statistics for one port's ring.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    pub port: String,
    pub lines: usize,
    pub bytes: u64,
    pub first_seq: u64,
    pub last_seq: u64,
    pub dropped_oldest: u64,
}

/// Result of a `since` query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinceResult {
    pub lines: Vec<BufferedLine>,
    pub truncated: bool,
    pub next_sequence: u64,
}

#[derive(Debug)]
struct PortRing {
    entries: VecDeque<BufferedLine>,
    /// Sequence number the next appended line will receive.
    next_seq: u64,
    dropped: u64,
    bytes: u64,
}

impl PortRing {
    fn new() -> Self {
        Self { entries: VecDeque::new(), next_seq: 1, dropped: 0, bytes: 0 }
    }

    fn first_seq(&self) -> u64 {
        self.entries.front().map(|e| e.seq).unwrap_or(self.next_seq)
    }

    fn last_seq(&self) -> u64 {
        self.entries.back().map(|e| e.seq).unwrap_or(self.next_seq.saturating_sub(1))
    }
}

/// Owner of all per-port rings.
pub struct BufferManager {
    capacity: usize,
    buffers: Mutex<HashMap<String, PortRing>>,
}

impl BufferManager {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), buffers: Mutex::new(HashMap::new()) }
    }

    /// Append a line, evicting the oldest entry when full. Returns the
    /// assigned sequence number.
    pub fn append(&self, line: SerialLine) -> u64 {
        let mut buffers = self.buffers.lock();
        let ring = buffers.entry(line.port.clone()).or_insert_with(PortRing::new);
        let seq = ring.next_seq;
        ring.next_seq += 1;
        ring.bytes += line.line.len() as u64;
        ring.entries.push_back(BufferedLine { seq, line });
        if ring.entries.len() > self.capacity {
            if let Some(evicted) = ring.entries.pop_front() {
                ring.bytes = ring.bytes.saturating_sub(evicted.line.line.len() as u64);
                ring.dropped += 1;
            }
        }
        seq
    }

    /// The most recent `count` lines for a port, oldest first.
    pub fn recent(&self, port: &str, count: usize) -> Vec<BufferedLine> {
        let buffers = self.buffers.lock();
        match buffers.get(port) {
            Some(ring) => {
                let skip = ring.entries.len().saturating_sub(count);
                ring.entries.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Everything with a sequence number greater than `since`.
    ///
    /// `truncated` is set when entries between `since` and the oldest
    /// retained line have been evicted.
    pub fn since(&self, port: &str, since: u64) -> SinceResult {
        let buffers = self.buffers.lock();
        match buffers.get(port) {
            Some(ring) => {
                let lines: Vec<BufferedLine> =
                    ring.entries.iter().filter(|e| e.seq > since).cloned().collect();
                let truncated = since.saturating_add(1) < ring.first_seq();
                let next_sequence =
                    lines.last().map(|e| e.seq).unwrap_or_else(|| ring.last_seq());
                SinceResult { lines, truncated, next_sequence }
            }
            None => SinceResult { lines: Vec::new(), truncated: false, next_sequence: since },
        }
    }

    /// Up to `limit` most recent lines matching `pattern`, oldest first.
    pub fn search(&self, port: &str, pattern: &Regex, limit: usize) -> Vec<BufferedLine> {
        let buffers = self.buffers.lock();
        match buffers.get(port) {
            Some(ring) => {
                let mut matches: Vec<BufferedLine> = ring
                    .entries
                    .iter()
                    .rev()
                    .filter(|e| pattern.is_match(&e.line.line))
                    .take(limit)
                    .cloned()
                    .collect();
                matches.reverse();
                matches
            }
            None => Vec::new(),
        }
    }

    pub fn stats(&self, port: &str) -> Option<BufferStats> {
        let buffers = self.buffers.lock();
        buffers.get(port).map(|ring| BufferStats {
            port: port.to_owned(),
            lines: ring.entries.len(),
            bytes: ring.bytes,
            first_seq: ring.first_seq(),
            last_seq: ring.last_seq(),
            dropped_oldest: ring.dropped,
        })
    }

    /// Stats for every known port, sorted by port address.
    pub fn stats_all(&self) -> Vec<BufferStats> {
        let buffers = self.buffers.lock();
        let mut stats: Vec<BufferStats> = buffers
            .iter()
            .map(|(port, ring)| BufferStats {
                port: port.clone(),
                lines: ring.entries.len(),
                bytes: ring.bytes,
                first_seq: ring.first_seq(),
                last_seq: ring.last_seq(),
                dropped_oldest: ring.dropped,
            })
            .collect();
        stats.sort_by(|a, b| a.port.cmp(&b.port));
        stats
    }

    /// Empty one port's ring. The sequence counter survives so numbers are
    /// never reused. Returns whether the port was known.
    pub fn clear(&self, port: &str) -> bool {
        let mut buffers = self.buffers.lock();
        match buffers.get_mut(port) {
            Some(ring) => {
                ring.dropped += ring.entries.len() as u64;
                ring.entries.clear();
                ring.bytes = 0;
                true
            }
            None => false,
        }
    }

    /// Empty every ring. Returns how many ports were cleared.
    pub fn clear_all(&self) -> usize {
        let mut buffers = self.buffers.lock();
        let count = buffers.len();
        for ring in buffers.values_mut() {
            ring.dropped += ring.entries.len() as u64;
            ring.entries.clear();
            ring.bytes = 0;
        }
        count
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
