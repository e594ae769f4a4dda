// Mixer module - software output graph and spatial sink
// Voices read their clip window at a playback rate and are summed into the
// output block; each emitter gets a channel strip holding its gain and pose.

use crate::audio_data::PetalSonicAudioData;
use crate::config::PetalSonicMixerDesc;
use crate::error::Result;
use crate::math::{Pose, Vec3};
use crate::output::{EndCallback, OutputGraph, OutputVoice};
use crate::spatial::{DirectionSetting, DistanceSetting, SpatialSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Window or clip remainders below this many seconds count as consumed.
const WINDOW_EPSILON: f64 = 1e-9;

/// Shared mixing context. Clones refer to the same mixer.
///
/// The render side ([`mix`](Self::mix)) only ever `try_lock`s, so a control
/// call holding the lock costs one silent block rather than a stall.
#[derive(Clone)]
pub struct SoftwareMixer {
    shared: Arc<Mutex<MixerState>>,
}

struct MixerState {
    sample_rate: u32,
    channels: u16,
    frames_rendered: u64,
    listener: Pose,
    strips: HashMap<u64, ChannelStrip>,
    voices: HashMap<u64, Voice>,
    next_id: u64,
}

impl MixerState {
    fn time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone, Copy)]
enum StripUpdate {
    Gain(f32),
    Position(Vec3),
    Orientation(Vec3),
}

struct ChannelStrip {
    gain: f32,
    position: Vec3,
    forward: Vec3,
    distance: DistanceSetting,
    direction: DirectionSetting,
    pending: Vec<(f64, StripUpdate)>,
}

impl Default for ChannelStrip {
    fn default() -> Self {
        Self {
            gain: 1.0,
            position: Vec3::ZERO,
            forward: -Vec3::Z,
            distance: DistanceSetting::default(),
            direction: DirectionSetting::default(),
            pending: Vec::new(),
        }
    }
}

impl ChannelStrip {
    fn schedule(&mut self, at_time: f64, update: StripUpdate) {
        self.pending.push((at_time, update));
    }

    /// Apply every update scheduled at or before `now`, in scheduling order.
    fn apply_due(&mut self, now: f64) {
        if self.pending.is_empty() {
            return;
        }
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(at_time, _)| *at_time <= now);
        self.pending = later;

        for (_, update) in due {
            match update {
                StripUpdate::Gain(gain) => self.gain = gain,
                StripUpdate::Position(position) => self.position = position,
                StripUpdate::Orientation(forward) => self.forward = forward,
            }
        }
    }

    /// Left/right gains for this strip heard from `listener`.
    fn output_gains(&self, listener: &Pose, channels: u16) -> (f32, f32) {
        let to_listener = listener.position - self.position;
        let attenuation = self.distance.gain(to_listener.length())
            * self.direction.gain(self.forward, to_listener);
        let gain = self.gain * attenuation;

        if channels < 2 {
            return (gain, 0.0);
        }

        // equal-power pan on the listener's left/right axis
        let side = (-to_listener)
            .try_normalize()
            .map(|direction| direction.dot(listener.right()))
            .unwrap_or(0.0);
        let angle = (side + 1.0) * std::f32::consts::FRAC_PI_4;
        (gain * angle.cos(), gain * angle.sin())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceState {
    Idle,
    Playing,
    Done,
}

struct Voice {
    strip: u64,
    clip: PetalSonicAudioData,
    state: VoiceState,
    cursor: f64,
    rate: f32,
    looping: bool,
    loop_start: f64,
    loop_end: Option<f64>,
    remaining: Option<f64>,
    on_end: Option<EndCallback>,
}

impl Voice {
    fn new(strip: u64, clip: PetalSonicAudioData) -> Self {
        Self {
            strip,
            clip,
            state: VoiceState::Idle,
            cursor: 0.0,
            rate: 1.0,
            looping: false,
            loop_start: 0.0,
            loop_end: None,
            remaining: None,
            on_end: None,
        }
    }

    fn loop_bounds(&self) -> (f64, f64) {
        let clip_end = self.clip.duration_secs();
        let start = self.loop_start.clamp(0.0, clip_end);
        let end = match self.loop_end {
            Some(end) if end > start && end <= clip_end => end,
            _ => clip_end,
        };
        (start, end)
    }

    fn set_loop(&mut self, enabled: bool, loop_start: f64, loop_end: Option<f64>) {
        if self.looping && !enabled && self.state == VoiceState::Playing {
            // finish the current lap and stop at the loop end
            self.remaining = loop_end.map(|end| (end - self.cursor).max(0.0));
        }
        self.looping = enabled;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
    }

    fn is_exhausted(&self) -> bool {
        if self.looping {
            return false;
        }
        self.remaining.is_some_and(|r| r <= WINDOW_EPSILON)
            || self.cursor >= self.clip.duration_secs() - WINDOW_EPSILON
    }

    /// Step the cursor by `step` seconds of clip time. Returns true once the
    /// window is consumed.
    fn advance(&mut self, step: f64) -> bool {
        self.cursor += step;

        if self.looping {
            let (start, end) = self.loop_bounds();
            if self.cursor >= end {
                let span = end - start;
                self.cursor = if span > 0.0 {
                    start + (self.cursor - end) % span
                } else {
                    start
                };
            }
            return false;
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= step;
        }
        self.is_exhausted()
    }
}

impl SoftwareMixer {
    pub fn new(desc: PetalSonicMixerDesc) -> Result<Self> {
        desc.validate()?;
        log::info!(
            "Software mixer created ({} Hz, {} channels)",
            desc.sample_rate,
            desc.channels
        );
        Ok(Self {
            shared: Arc::new(Mutex::new(MixerState {
                sample_rate: desc.sample_rate,
                channels: desc.channels,
                frames_rendered: 0,
                listener: Pose::identity(),
                strips: HashMap::new(),
                voices: HashMap::new(),
                next_id: 0,
            })),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.lock().sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.shared.lock().channels
    }

    /// Seconds of audio rendered so far. Scheduled updates are applied
    /// against this clock.
    pub fn current_time(&self) -> f64 {
        self.shared.lock().time()
    }

    pub fn set_listener_pose(&self, pose: Pose) {
        self.shared.lock().listener = pose;
    }

    pub fn listener_pose(&self) -> Pose {
        self.shared.lock().listener
    }

    /// Open a channel strip for one emitter.
    ///
    /// The strip, and every voice on it, is released when the returned
    /// [`MixerOutput`] is dropped.
    pub fn create_strip(&self) -> (MixerOutput, MixerSpatialSink) {
        let mut state = self.shared.lock();
        let strip = state.next_id();
        state.strips.insert(strip, ChannelStrip::default());
        log::debug!("Mixer: opened strip {}", strip);

        (
            MixerOutput {
                shared: self.shared.clone(),
                strip,
            },
            MixerSpatialSink {
                shared: self.shared.clone(),
                strip,
            },
        )
    }

    pub fn strip_count(&self) -> usize {
        self.shared.lock().strips.len()
    }

    /// Voices currently playing.
    pub fn active_voices(&self) -> usize {
        self.shared
            .lock()
            .voices
            .values()
            .filter(|voice| voice.state == VoiceState::Playing)
            .count()
    }

    /// Render one interleaved block into `buffer`, overwriting it.
    ///
    /// Returns the number of frames written. End callbacks of voices that
    /// finish inside the block run after the mixer lock is released.
    pub fn mix(&self, buffer: &mut [f32]) -> usize {
        buffer.fill(0.0);

        let Some(mut guard) = self.shared.try_lock() else {
            log::warn!("Failed to acquire mixer lock, rendering silence");
            return 0;
        };

        let state = &mut *guard;
        let channels = state.channels as usize;
        let frames = buffer.len() / channels;
        let now = state.time();
        let step_scale = 1.0 / state.sample_rate as f64;

        for strip in state.strips.values_mut() {
            strip.apply_due(now);
        }

        let mut finished = Vec::new();
        for (id, voice) in state.voices.iter_mut() {
            if voice.state != VoiceState::Playing {
                continue;
            }
            let Some(strip) = state.strips.get(&voice.strip) else {
                voice.state = VoiceState::Done;
                continue;
            };
            if voice.is_exhausted() {
                finished.push(*id);
                continue;
            }

            let (left, right) = strip.output_gains(&state.listener, state.channels);
            let step = voice.rate as f64 * step_scale;

            for frame in buffer.chunks_exact_mut(channels).take(frames) {
                let sample = voice.clip.mono_at(voice.cursor);
                frame[0] += sample * left;
                if channels > 1 {
                    frame[1] += sample * right;
                }
                if voice.advance(step) {
                    finished.push(*id);
                    break;
                }
            }
        }

        let mut callbacks = Vec::new();
        for id in finished {
            if let Some(mut voice) = state.voices.remove(&id) {
                log::debug!("Mixer: voice {} reached end of window", id);
                voice.state = VoiceState::Done;
                callbacks.extend(voice.on_end.take());
            }
        }
        state.frames_rendered += frames as u64;
        drop(guard);

        for callback in callbacks {
            callback();
        }

        frames
    }
}

/// One emitter's channel strip, used as its [`OutputGraph`].
pub struct MixerOutput {
    shared: Arc<Mutex<MixerState>>,
    strip: u64,
}

impl OutputGraph for MixerOutput {
    fn create_source(&mut self, clip: &PetalSonicAudioData) -> Box<dyn OutputVoice> {
        let mut state = self.shared.lock();
        let id = state.next_id();
        state.voices.insert(id, Voice::new(self.strip, clip.clone()));
        Box::new(MixerVoice {
            shared: self.shared.clone(),
            id,
        })
    }

    fn set_volume(&mut self, volume: f32, at_time: f64) {
        if let Some(strip) = self.shared.lock().strips.get_mut(&self.strip) {
            strip.schedule(at_time, StripUpdate::Gain(volume));
        }
    }

    fn current_time(&self) -> f64 {
        self.shared.lock().time()
    }
}

impl Drop for MixerOutput {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.strips.remove(&self.strip);
        let strip = self.strip;
        state.voices.retain(|_, voice| voice.strip != strip);
        log::debug!("Mixer: closed strip {}", strip);
    }
}

/// A voice on a [`MixerOutput`] strip. Stopping does not report an end.
pub struct MixerVoice {
    shared: Arc<Mutex<MixerState>>,
    id: u64,
}

impl MixerVoice {
    fn with_voice(&self, f: impl FnOnce(&mut Voice)) {
        if let Some(voice) = self.shared.lock().voices.get_mut(&self.id) {
            f(voice);
        }
    }
}

impl OutputVoice for MixerVoice {
    fn set_loop(&mut self, enabled: bool, loop_start: f64, loop_end: Option<f64>) {
        self.with_voice(|voice| voice.set_loop(enabled, loop_start, loop_end));
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.with_voice(|voice| voice.rate = rate);
    }

    fn set_end_callback(&mut self, callback: Option<EndCallback>) {
        self.with_voice(|voice| voice.on_end = callback);
    }

    fn start(&mut self, offset: f64, duration: Option<f64>) {
        self.with_voice(|voice| {
            voice.cursor = offset.max(0.0);
            voice.remaining = duration;
            voice.state = VoiceState::Playing;
        });
    }

    fn stop(&mut self) {
        self.with_voice(|voice| voice.state = VoiceState::Done);
    }

    fn disconnect(&mut self) {
        self.shared.lock().voices.remove(&self.id);
    }
}

/// Spatial side of a [`MixerOutput`] strip.
pub struct MixerSpatialSink {
    shared: Arc<Mutex<MixerState>>,
    strip: u64,
}

impl MixerSpatialSink {
    fn with_strip(&self, f: impl FnOnce(&mut ChannelStrip)) {
        if let Some(strip) = self.shared.lock().strips.get_mut(&self.strip) {
            f(strip);
        }
    }
}

impl SpatialSink for MixerSpatialSink {
    fn current_time(&self) -> f64 {
        self.shared.lock().time()
    }

    fn set_position(&mut self, position: Vec3, at_time: f64) {
        self.with_strip(|strip| strip.schedule(at_time, StripUpdate::Position(position)));
    }

    fn set_orientation(&mut self, forward: Vec3, at_time: f64) {
        self.with_strip(|strip| strip.schedule(at_time, StripUpdate::Orientation(forward)));
    }

    fn set_distance_model(&mut self, setting: &DistanceSetting) {
        let setting = *setting;
        self.with_strip(|strip| strip.distance = setting);
    }

    fn set_cone(&mut self, setting: &DirectionSetting) {
        let setting = *setting;
        self.with_strip(|strip| strip.direction = setting);
    }
}
