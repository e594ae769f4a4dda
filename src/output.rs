//! Contract between an emitter and the audio output graph.
//!
//! An [`OutputGraph`] is one emitter's channel strip into a shared audio
//! context: it creates voices for a clip and owns the strip gain. Each voice
//! plays one window of the clip and reports its natural end through the
//! callback it was given.

use crate::audio_data::PetalSonicAudioData;

/// Fired once when a started voice consumes its window.
///
/// May run on the audio thread; it must not block.
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait OutputGraph: Send {
    /// Create a stopped voice reading from `clip`.
    fn create_source(&mut self, clip: &PetalSonicAudioData) -> Box<dyn OutputVoice>;

    /// Schedule the strip gain to change at `at_time` on the output's clock.
    fn set_volume(&mut self, volume: f32, at_time: f64);

    /// Current time on the output's clock, in seconds.
    fn current_time(&self) -> f64;
}

/// A single playing window of a clip.
pub trait OutputVoice: Send {
    /// Loop the region `[loop_start, loop_end)` (clip end when `loop_end` is
    /// `None`). While looping the voice never ends on its own and the
    /// duration given to [`start`](Self::start) is ignored.
    fn set_loop(&mut self, enabled: bool, loop_start: f64, loop_end: Option<f64>);

    fn set_playback_rate(&mut self, rate: f32);

    /// Replace the end callback. `None` unregisters it.
    fn set_end_callback(&mut self, callback: Option<EndCallback>);

    /// Begin playing at `offset` seconds into the clip, for `duration` seconds
    /// of clip time or to the clip end.
    fn start(&mut self, offset: f64, duration: Option<f64>);

    fn stop(&mut self);

    /// Detach from the graph. The voice is unusable afterwards.
    fn disconnect(&mut self);
}
