//! Time management utilities

use std::time::{Duration, Instant};

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Snapshot produced when a statistics window closes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsWindow {
    /// Frames per second over the window
    pub frames_per_second: f64,
    /// Average host recording time per frame, in milliseconds
    pub average_cpu_ms: f64,
}

/// Accumulates host-side frame timings and reports them every `interval` frames
#[derive(Debug)]
pub struct FrameStats {
    interval: u32,
    frames: u32,
    cpu_time: Duration,
    window_start: Instant,
}

impl FrameStats {
    /// Create statistics that close a window every `interval` frames
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            cpu_time: Duration::ZERO,
            window_start: Instant::now(),
        }
    }

    /// Record one frame's host time; returns a snapshot when the window closes
    pub fn record(&mut self, cpu_time: Duration) -> Option<StatsWindow> {
        self.frames += 1;
        self.cpu_time += cpu_time;

        if self.frames < self.interval {
            return None;
        }

        let wall = self.window_start.elapsed().as_secs_f64();
        let frames = f64::from(self.frames);
        let window = StatsWindow {
            frames_per_second: if wall > 0.0 { frames / wall } else { 0.0 },
            average_cpu_ms: self.cpu_time.as_secs_f64() * 1000.0 / frames,
        };

        self.frames = 0;
        self.cpu_time = Duration::ZERO;
        self.window_start = Instant::now();
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stats_window_closes_on_interval() {
        let mut stats = FrameStats::new(3);
        assert!(stats.record(Duration::from_millis(2)).is_none());
        assert!(stats.record(Duration::from_millis(4)).is_none());

        let window = stats.record(Duration::from_millis(6)).unwrap();
        assert_relative_eq!(window.average_cpu_ms, 4.0, epsilon = 1e-9);

        // window restarts
        assert!(stats.record(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = Timer::new();
        timer.update();
        timer.update();
        assert_eq!(timer.frame_count(), 2);
        assert!(timer.total_time() >= timer.delta_time());
    }
}
