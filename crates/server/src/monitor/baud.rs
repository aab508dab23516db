// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-baud detection by sampling the port at candidate rates and scoring
//! how much the bytes look like text.

use std::time::Duration;

use tokio::io::AsyncReadExt;

/// How long each candidate rate is sampled.
const PROBE_WINDOW: Duration = Duration::from_millis(1800);

/// Sample cap per candidate.
const SAMPLE_CAP: usize = 4096;

/// Early-stop threshold: a candidate this confident ends the probe.
const CONFIDENT: f64 = 0.80;

/// Below this, the probe falls back to the requested rate.
const MINIMUM: f64 = 0.30;

/// Standard rates tried after the requested one.
const STANDARD_RATES: [u32; 4] = [115_200, 74_880, 57_600, 9_600];

/// Vocabulary that marks a sample as ESP32-flavoured output.
const KEYWORDS: [&str; 9] =
    ["rst:0x", "wifi", "rssi", "http", "webhook", "esp32", "guru", "connecting", "ip:"];

/// Outcome of a probe pass.
#[derive(Debug, Clone, Copy)]
pub struct BaudProbe {
    pub selected: u32,
    pub score: f64,
    /// Set when no candidate cleared the minimum and the requested rate was
    /// used instead.
    pub fallback: bool,
}

/// Candidate rates in probe order: requested first, then the standard set,
/// de-duplicated.
pub fn candidate_rates(requested: u32) -> Vec<u32> {
    let mut rates = vec![requested];
    for rate in STANDARD_RATES {
        if !rates.contains(&rate) {
            rates.push(rate);
        }
    }
    rates
}

/// Confidence in `[0, 1]` that `sample` is text at the probed rate.
///
/// Weighted sum: printable ratio 0.60, newline density 0.25, keyword
/// bonus 0.15.
pub fn score_sample(sample: &[u8]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }

    let printable = sample
        .iter()
        .filter(|&&b| (0x20..0x7f).contains(&b) || b == b'\t' || b == b'\r' || b == b'\n')
        .count();
    let printable_ratio = printable as f64 / sample.len() as f64;

    let newlines = sample.iter().filter(|&&b| b == b'\n').count();
    let newline_density = (newlines.min(10)) as f64 / 10.0;

    let text = String::from_utf8_lossy(sample).to_lowercase();
    let keyword_bonus = if KEYWORDS.iter().any(|k| text.contains(k)) { 1.0 } else { 0.0 };

    0.60 * printable_ratio + 0.25 * newline_density + 0.15 * keyword_bonus
}

/// Probe the port, returning the selected rate and its score.
pub async fn probe(port: &str, requested: u32) -> BaudProbe {
    let mut best: Option<(u32, f64)> = None;

    for rate in candidate_rates(requested) {
        let sample = read_sample(port, rate).await;
        let score = score_sample(&sample);
        tracing::debug!(port, rate, score, bytes = sample.len(), "baud probe sample");
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((rate, score));
        }
        if score >= CONFIDENT {
            break;
        }
    }

    match best {
        Some((rate, score)) if score >= MINIMUM => {
            BaudProbe { selected: rate, score, fallback: false }
        }
        Some((_, score)) => BaudProbe { selected: requested, score, fallback: true },
        None => BaudProbe { selected: requested, score: 0.0, fallback: true },
    }
}

/// Read up to the sample cap from the port at `rate` for the probe window.
async fn read_sample(port: &str, rate: u32) -> Vec<u8> {
    let builder = tokio_serial::new(port, rate).timeout(Duration::from_millis(200));
    let mut serial = match tokio_serial::SerialStream::open(&builder) {
        Ok(serial) => serial,
        Err(e) => {
            tracing::debug!(port, rate, err = %e, "probe open failed");
            return Vec::new();
        }
    };

    let mut sample = Vec::new();
    let mut buf = [0u8; 512];
    let deadline = tokio::time::Instant::now() + PROBE_WINDOW;

    while sample.len() < SAMPLE_CAP {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, serial.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => sample.extend_from_slice(&buf[..n]),
            Ok(Err(_)) => break,
            Err(_) => break,
        }
    }

    sample
}

#[cfg(test)]
#[path = "baud_tests.rs"]
mod tests;
