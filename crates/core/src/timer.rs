//! High-resolution timer for frame timing.
//!
//! [`Timer`] tracks total running time and the delta between ticks. It can be
//! stopped and restarted; time spent stopped is excluded from the total and
//! the delta reported while stopped is zero.

use std::time::{Duration, Instant};

/// Timing information for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds of running (unpaused) time since the timer started.
    pub total: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
}

impl FrameTime {
    /// Creates a frame time from explicit values.
    #[inline]
    pub fn new(total: f32, delta: f32) -> Self {
        Self { total, delta }
    }
}

/// High-resolution frame timer.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    paused: Duration,
    stopped_at: Option<Instant>,
    delta: Duration,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            paused: Duration::ZERO,
            stopped_at: None,
            delta: Duration::ZERO,
        }
    }

    /// Running time since the timer was created, excluding stopped periods.
    pub fn elapsed(&self) -> Duration {
        let end = self.stopped_at.unwrap_or_else(Instant::now);
        end.duration_since(self.start).saturating_sub(self.paused)
    }

    /// Running time in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Advances the timer by one frame and returns the frame's timing.
    ///
    /// While stopped, the delta is zero and the total does not advance.
    pub fn tick(&mut self) -> FrameTime {
        if self.stopped_at.is_some() {
            self.delta = Duration::ZERO;
        } else {
            let now = Instant::now();
            self.delta = now - self.last_tick;
            self.last_tick = now;
        }
        FrameTime::new(self.elapsed_secs(), self.delta.as_secs_f32())
    }

    /// Delta of the most recent tick in seconds.
    #[inline]
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Stops the timer. Has no effect if already stopped.
    pub fn stop(&mut self) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
    }

    /// Restarts a stopped timer. Has no effect if running.
    pub fn start(&mut self) {
        if let Some(stopped_at) = self.stopped_at.take() {
            let now = Instant::now();
            self.paused += now - stopped_at;
            self.last_tick = now;
        }
    }

    /// Returns true while the timer is stopped.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reports_nonnegative_delta() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let time = timer.tick();
        assert!(time.delta > 0.0);
        assert!(time.total >= time.delta);
    }

    #[test]
    fn test_stopped_timer_has_zero_delta() {
        let mut timer = Timer::new();
        timer.stop();
        std::thread::sleep(Duration::from_millis(2));
        let time = timer.tick();
        assert_eq!(time.delta, 0.0);
        assert!(timer.is_stopped());

        let total_while_stopped = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(timer.elapsed(), total_while_stopped);
    }

    #[test]
    fn test_start_excludes_stopped_period() {
        let mut timer = Timer::new();
        timer.stop();
        std::thread::sleep(Duration::from_millis(20));
        timer.start();
        assert!(!timer.is_stopped());
        assert!(timer.elapsed() < Duration::from_millis(20));
    }
}
