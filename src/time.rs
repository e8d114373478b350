//! Frame timing for the simulation.
//!
//! The host passes a timestamp into every frame instead of the clock reading
//! `Instant::now()` itself, so tests can drive time deterministically.
//!
//! # Example
//!
//! ```ignore
//! use inkflow::time::FrameClock;
//!
//! let mut clock = FrameClock::new(Duration::from_millis(33));
//! clock.start(Instant::now());
//!
//! // In the frame callback:
//! let dt = clock.tick(Instant::now());
//! println!("Elapsed: {:.2}s, dt {:.4}s, fps {:.1}", clock.elapsed(), dt, clock.fps());
//! ```

use std::time::{Duration, Instant};

/// Clamped frame-delta tracking.
///
/// A long gap between frames (tab switch, debugger, window drag) never turns
/// into one huge time step: every delta is capped at `max_delta`.
#[derive(Debug)]
pub struct FrameClock {
    /// When the last frame occurred.
    last_frame: Option<Instant>,
    /// Upper bound for a single step.
    max_delta: Duration,
    /// Sum of clamped deltas in seconds.
    elapsed_secs: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation.
    fps_update_time: Option<Instant>,
    /// How often to update FPS calculation.
    fps_update_interval: Duration,
}

impl FrameClock {
    pub fn new(max_delta: Duration) -> Self {
        Self {
            last_frame: None,
            max_delta,
            elapsed_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: None,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Begin timing from `now`. Restarting resets every counter.
    pub fn start(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.elapsed_secs = 0.0;
        self.frame_count = 0;
        self.fps = 0.0;
        self.fps_frame_count = 0;
        self.fps_update_time = Some(now);
    }

    /// Advance to `now` and return the clamped delta in seconds.
    ///
    /// The first tick after [`start`](Self::start) (or on a clock that was
    /// never started) measures from `now` and yields zero. Timestamps that go
    /// backwards also yield zero.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let last = *self.last_frame.get_or_insert(now);

        let raw = now.saturating_duration_since(last);
        let delta = raw.min(self.max_delta).as_secs_f32();
        self.last_frame = Some(now);
        self.elapsed_secs += delta;
        self.frame_count += 1;

        let fps_since = *self.fps_update_time.get_or_insert(now);
        let fps_elapsed = now.saturating_duration_since(fps_since);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = Some(now);
        }

        delta
    }

    /// Forget the last frame so the next tick yields zero.
    pub fn stop(&mut self) {
        self.last_frame = None;
        self.fps_update_time = None;
    }

    /// Sum of clamped deltas since start, in seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.last_frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_clock_new() {
        let clock = FrameClock::new(ms(33));
        assert_eq!(clock.frame(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_first_tick_is_zero() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(ms(33));
        clock.start(t0);
        assert_eq!(clock.tick(t0), 0.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_tick_measures_delta() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(ms(33));
        clock.start(t0);
        let dt = clock.tick(t0 + ms(16));
        assert!((dt - 0.016).abs() < 1e-6);
        assert!((clock.elapsed() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_long_gap_is_clamped() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(ms(33));
        clock.start(t0);
        let dt = clock.tick(t0 + Duration::from_secs(5));
        assert!((dt - 0.033).abs() < 1e-6);
    }

    #[test]
    fn test_stop_forgets_last_frame() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(ms(33));
        clock.start(t0);
        clock.tick(t0 + ms(10));
        clock.stop();
        assert!(!clock.is_running());
        assert_eq!(clock.tick(t0 + ms(500)), 0.0);
    }

    #[test]
    fn test_fps_updates_periodically() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(ms(33));
        clock.start(t0);
        for i in 1..=60u64 {
            clock.tick(t0 + ms(i * 10));
        }
        assert!((clock.fps() - 100.0).abs() < 1.0);
    }
}
