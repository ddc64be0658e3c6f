//! Bandwidth Rate Calculation
//!
//! Converts the cumulative per-consumer byte counters reported by go2rtc
//! into Mbps samples from the delta between consecutive polls.

use std::collections::HashMap;

/// Derives Mbps samples from cumulative byte counters
///
/// Keyed by (client IP, stream name). Baselines live for the process
/// lifetime and are never evicted.
#[derive(Debug, Default)]
pub struct BitrateTracker {
    last_bytes: HashMap<(String, String), u64>,
}

impl BitrateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a byte-counter observation and return the Mbps rate since the
    /// previous one, rounded to 2 decimals.
    ///
    /// The first observation of a key only seeds the baseline and returns
    /// `0.0`. A counter reset (current below baseline) produces a negative
    /// rate, which is passed through unclamped so the published value shows
    /// that the counter restarted rather than a made-up zero.
    pub fn sample(&mut self, ip: &str, stream: &str, bytes_sent: u64, interval_secs: u64) -> f64 {
        let key = (ip.to_string(), stream.to_string());

        match self.last_bytes.insert(key, bytes_sent) {
            None => 0.0,
            Some(previous) => {
                let delta = bytes_sent as f64 - previous as f64;
                let mbps = (delta * 8.0) / (interval_secs as f64 * 1_000_000.0);
                (mbps * 100.0).round() / 100.0
            }
        }
    }

    /// Number of tracked (client, stream) keys
    pub fn len(&self) -> usize {
        self.last_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_bytes.is_empty()
    }
}
