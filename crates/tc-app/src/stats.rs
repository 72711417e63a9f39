//! Compteur FPS par fenêtre glissante et ligne de statut.

use std::collections::VecDeque;
use std::time::Instant;

/// Sliding-window FPS counter. Zero allocation after init.
pub struct FpsCounter {
    timestamps: VecDeque<Instant>,
    window: usize,
    fps: f64,
}

impl FpsCounter {
    /// Counter averaging over the last `window` frames.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(window + 1),
            window: window.max(2),
            fps: 0.0,
        }
    }

    /// Call once per presented frame.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.timestamps.push_back(now);
        if self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }
        if self.timestamps.len() >= 2 {
            if let Some(&first) = self.timestamps.front() {
                let secs = now.duration_since(first).as_secs_f64();
                if secs > 0.0 {
                    self.fps = (self.timestamps.len() - 1) as f64 / secs;
                }
            }
        }
    }

    /// FPS averaged over the window, 0.0 before two ticks.
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Status line shown in the overlay and under export.
#[must_use]
pub fn format_stats_line(fps: f64, rendered: u64, dropped: u64, paused: bool) -> String {
    let mut line = format!("FPS: {fps:.1} Rendered: {rendered} Dropped: {dropped}");
    if paused {
        line.push_str(" [Paused]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero() {
        let counter = FpsCounter::new(60);
        assert!(counter.fps().abs() < f64::EPSILON);
    }

    #[test]
    fn counter_reports_positive_rate_after_ticks() {
        let mut counter = FpsCounter::new(8);
        for _ in 0..8 {
            counter.tick();
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(counter.fps() > 0.0);
    }

    #[test]
    fn stats_line_formats() {
        assert_eq!(
            format_stats_line(29.97, 120, 3, false),
            "FPS: 30.0 Rendered: 120 Dropped: 3"
        );
        assert_eq!(
            format_stats_line(0.0, 0, 0, true),
            "FPS: 0.0 Rendered: 0 Dropped: 0 [Paused]"
        );
    }
}
