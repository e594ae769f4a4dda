//! Clock sources used to stamp playback spans.
//!
//! The emitter never asks the audio device where it is; playback position is
//! reconstructed from timestamps taken off a [`Clock`].

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Monotonic, non-decreasing elapsed time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], counting from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Host-driven clock, for engines with their own frame time and for tests.
///
/// Clones share the same time value.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward. Negative or non-finite deltas are ignored so the
    /// clock stays monotonic.
    pub fn advance(&self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            log::warn!("ManualClock: ignoring invalid advance of {}s", seconds);
            return;
        }
        *self.now.lock() += seconds;
    }

    /// Jump to an absolute time, never backwards.
    pub fn set(&self, seconds: f64) {
        let mut now = self.now.lock();
        if seconds.is_finite() && seconds >= *now {
            *now = seconds;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_monotonic() {
        let clock = ManualClock::new(1.0);
        let shared = clock.clone();

        clock.advance(0.5);
        assert_eq!(shared.now(), 1.5);

        clock.advance(-2.0);
        clock.set(0.25);
        assert_eq!(shared.now(), 1.5);

        shared.set(4.0);
        assert_eq!(clock.now(), 4.0);
    }

    #[test]
    fn test_system_clock_does_not_go_backwards() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
