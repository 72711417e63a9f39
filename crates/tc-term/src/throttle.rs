//! Limiteur de débit d'écriture vers le terminal.

use std::time::{Duration, Instant};

/// Tracks bytes written since the first frame and computes how long the
/// presenter must sleep to stay under a configured MB/s budget. Slow
/// terminals (serial consoles, ssh links) otherwise buffer seconds of
/// frames and drift out of sync.
pub struct WriteThrottle {
    bytes_per_sec: f64,
    started: Option<Instant>,
    written: u64,
}

impl WriteThrottle {
    /// Budget in megabytes per second. Zero or negative disables the
    /// throttle.
    #[must_use]
    pub fn new(max_write_mbps: f64) -> Self {
        Self {
            bytes_per_sec: max_write_mbps * 1_000_000.0,
            started: None,
            written: 0,
        }
    }

    /// Record `n` written bytes; returns how long to sleep, if at all.
    pub fn record(&mut self, n: usize) -> Option<Duration> {
        if self.bytes_per_sec <= 0.0 {
            return None;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        self.written += n as u64;
        required_delay(self.written, started.elapsed(), self.bytes_per_sec)
    }
}

/// Pure budget arithmetic: with `written` bytes after `elapsed`, how
/// much longer must the writer wait to respect `bytes_per_sec`?
#[must_use]
pub fn required_delay(written: u64, elapsed: Duration, bytes_per_sec: f64) -> Option<Duration> {
    let min_elapsed = written as f64 / bytes_per_sec;
    let actual = elapsed.as_secs_f64();
    if min_elapsed > actual {
        Some(Duration::from_secs_f64(min_elapsed - actual))
    } else {
        None
    }
}
