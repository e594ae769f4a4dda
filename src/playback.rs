//! Playback state and time bookkeeping.
//!
//! This module holds the pure part of an emitter's state machine:
//! - [`PlayState`]: Stopped, Playing or Paused
//! - [`PlaybackWindow`]: the `(offset, duration)` handed to an output voice
//! - [`PlaybackTimeline`]: start/end offsets, pause snapshot and span timestamps
//! - [`RepeatCounter`]: bounded repeats across natural ends
//!
//! Nothing here talks to an output graph. [`PetalSonicEmitter`](crate::PetalSonicEmitter)
//! drives these types and issues the side effects.

/// Represents the current playback state of an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    /// Not playing, holding the position of the last pause
    Paused,
    Stopped,
}

/// Region of a clip submitted to an output voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackWindow {
    /// Seconds into the clip
    pub offset: f64,
    /// Seconds of clip time to play (None = to the clip end)
    pub duration: Option<f64>,
}

/// Offsets and timestamps from which playback position is reconstructed.
///
/// Position is never read back from the audio device: a span records the
/// clock time it began at, and position is the clock delta added to the
/// offset the span began from.
#[derive(Debug, Clone, Default)]
pub struct PlaybackTimeline {
    start_time: f64,
    end_time: Option<f64>,
    paused_time: Option<f64>,
    absolute_start_time: f64,
    is_playing: bool,
}

impl PlaybackTimeline {
    pub fn new(start_time: f64, end_time: Option<f64>) -> Self {
        Self {
            start_time,
            end_time,
            ..Default::default()
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: f64) {
        self.start_time = start_time;
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// Stored as given. A window that ends before it starts is rejected by
    /// [`play_window`](Self::play_window), not here.
    pub fn set_end_time(&mut self, end_time: Option<f64>) {
        self.end_time = end_time;
    }

    pub fn paused_time(&self) -> Option<f64> {
        self.paused_time
    }

    pub fn absolute_start_time(&self) -> f64 {
        self.absolute_start_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn state(&self) -> PlayState {
        if self.is_playing {
            PlayState::Playing
        } else if self.paused_time.is_some() {
            PlayState::Paused
        } else {
            PlayState::Stopped
        }
    }

    /// Window for a fresh span from `start_time`, or `None` when the request
    /// is invalid for a clip of `clip_duration` seconds.
    pub fn play_window(&self, clip_duration: f64) -> Option<PlaybackWindow> {
        if !clip_duration.is_finite() || clip_duration <= 0.0 {
            return None;
        }
        if !(self.start_time >= 0.0 && self.start_time <= clip_duration) {
            return None;
        }
        let duration = self.end_time.map(|end| end - self.start_time);
        if duration.is_some_and(|d| !(d >= 0.0)) {
            return None;
        }
        Some(PlaybackWindow {
            offset: self.start_time,
            duration,
        })
    }

    /// Window continuing from the pause snapshot, or `None` when nothing is
    /// paused.
    ///
    /// A pause past `end_time` leaves a negative remainder; that is only
    /// playable when `looping`, where the voice ignores the duration.
    pub fn resume_window(&self, looping: bool) -> Option<PlaybackWindow> {
        if self.is_playing {
            return None;
        }
        let paused_time = self.paused_time?;
        let duration = self.end_time.map(|end| end - paused_time);
        if !looping && duration.is_some_and(|d| d < 0.0) {
            return None;
        }
        Some(PlaybackWindow {
            offset: paused_time,
            duration,
        })
    }

    /// Mark a span as started at clock time `now`.
    pub fn begin_span(&mut self, now: f64) {
        self.absolute_start_time = now;
        self.is_playing = true;
    }

    /// Forget any pause snapshot, ahead of a fresh span from `start_time`.
    pub fn clear_pause(&mut self) {
        self.paused_time = None;
    }

    /// Snapshot the position at `now` and leave the Playing state.
    pub fn pause(&mut self, now: f64) -> f64 {
        let position = self.position(now);
        self.paused_time = Some(position);
        self.is_playing = false;
        position
    }

    /// The span ran out on its own. Offsets are left for the caller to settle.
    pub fn end_span(&mut self) {
        self.is_playing = false;
    }

    /// Leave Playing or Paused for Stopped.
    pub fn stop(&mut self) {
        self.paused_time = None;
        self.is_playing = false;
    }

    /// Current offset into the clip, reconstructed from the clock.
    pub fn position(&self, now: f64) -> f64 {
        if !self.is_playing {
            return 0.0;
        }
        let origin = self.paused_time.unwrap_or(self.start_time);
        now - self.absolute_start_time + origin
    }
}

/// Outcome of a natural end, as decided by [`RepeatCounter::on_natural_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatOutcome {
    /// Start another span; `remaining` spans are left including that one
    Restart { remaining: u32 },
    Complete,
}

/// Bounded repeat accounting.
///
/// `remaining` stays within `[1, repeat_times]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatCounter {
    repeat_times: u32,
    remaining: u32,
}

impl RepeatCounter {
    pub fn new(repeat_times: u32) -> Self {
        let repeat_times = repeat_times.max(1);
        Self {
            repeat_times,
            remaining: repeat_times,
        }
    }

    pub fn repeat_times(&self) -> u32 {
        self.repeat_times
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Assign a new count. Also restarts the accounting for the current cycle.
    pub fn set_repeat_times(&mut self, repeat_times: u32) {
        *self = Self::new(repeat_times);
    }

    pub fn reset(&mut self) {
        self.remaining = self.repeat_times;
    }

    pub fn on_natural_end(&mut self) -> RepeatOutcome {
        if self.remaining <= 1 {
            self.reset();
            RepeatOutcome::Complete
        } else {
            self.remaining -= 1;
            RepeatOutcome::Restart {
                remaining: self.remaining,
            }
        }
    }
}

impl Default for RepeatCounter {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_window_validation() {
        let mut timeline = PlaybackTimeline::new(2.0, Some(8.0));
        assert_eq!(
            timeline.play_window(10.0),
            Some(PlaybackWindow {
                offset: 2.0,
                duration: Some(6.0)
            })
        );
        assert_eq!(timeline.play_window(0.0), None);
        assert_eq!(timeline.play_window(f64::NAN), None);
        assert_eq!(timeline.play_window(1.0), None);

        timeline.set_end_time(Some(1.0));
        assert_eq!(timeline.play_window(10.0), None);

        timeline.set_end_time(Some(2.0));
        assert_eq!(
            timeline.play_window(10.0).map(|w| w.duration),
            Some(Some(0.0))
        );

        timeline.set_start_time(-0.5);
        timeline.set_end_time(None);
        assert_eq!(timeline.play_window(10.0), None);

        timeline.set_start_time(10.0);
        assert_eq!(
            timeline.play_window(10.0),
            Some(PlaybackWindow {
                offset: 10.0,
                duration: None
            })
        );
    }

    #[test]
    fn test_position_across_pause() {
        let mut timeline = PlaybackTimeline::new(2.0, Some(8.0));
        assert_eq!(timeline.position(100.0), 0.0);

        timeline.begin_span(100.0);
        assert_eq!(timeline.position(103.0), 5.0);

        assert_eq!(timeline.pause(104.0), 6.0);
        assert_eq!(timeline.state(), PlayState::Paused);
        assert_eq!(timeline.position(110.0), 0.0);

        let window = timeline.resume_window(false).unwrap();
        assert_eq!(window.offset, 6.0);
        assert_eq!(window.duration, Some(2.0));

        timeline.begin_span(120.0);
        assert_eq!(timeline.position(120.0), 6.0);
        assert_eq!(timeline.position(121.5), 7.5);

        timeline.stop();
        assert_eq!(timeline.state(), PlayState::Stopped);
        assert_eq!(timeline.paused_time(), None);
        assert_eq!(timeline.resume_window(false), None);
    }

    #[test]
    fn test_resume_past_end_only_when_looping() {
        let mut timeline = PlaybackTimeline::new(0.0, Some(2.0));
        timeline.begin_span(0.0);
        timeline.pause(3.0);

        assert_eq!(timeline.resume_window(false), None);
        let window = timeline.resume_window(true).unwrap();
        assert_eq!(window.offset, 3.0);
    }

    #[test]
    fn test_repeat_counter() {
        let mut counter = RepeatCounter::new(3);
        assert_eq!(
            counter.on_natural_end(),
            RepeatOutcome::Restart { remaining: 2 }
        );
        assert_eq!(
            counter.on_natural_end(),
            RepeatOutcome::Restart { remaining: 1 }
        );
        assert_eq!(counter.on_natural_end(), RepeatOutcome::Complete);
        assert_eq!(counter.remaining(), 3);

        counter.on_natural_end();
        counter.set_repeat_times(0);
        assert_eq!(counter.repeat_times(), 1);
        assert_eq!(counter.remaining(), 1);
        assert_eq!(counter.on_natural_end(), RepeatOutcome::Complete);
    }
}
