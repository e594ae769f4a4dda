//! Positional audio emitter.
//!
//! [`PetalSonicEmitter`] owns the playback state of one sound attached to a
//! moving object. It validates requests, drives an [`OutputGraph`], keeps a
//! [`SpatialSink`] in step with the object's pose and turns asynchronous
//! end-of-playback notifications into repeats or completion.
//!
//! # Threading
//!
//! All public calls come from one owner thread. Output voices report their
//! natural end from wherever the audio graph runs, and pose providers notify on
//! the thread that moved the object. Both are forwarded as [`EmitterMessage`]s
//! over a channel and applied in [`PetalSonicEmitter::update`], so no other
//! thread ever touches emitter state.
//!
//! Every voice gets a generation number baked into its end callback. Pausing or
//! stopping unregisters the callback, and a notification that was already in
//! flight is dropped because its generation no longer matches.

use crate::audio_data::PetalSonicAudioData;
use crate::clock::Clock;
use crate::config::PetalSonicEmitterDesc;
use crate::error::Result;
use crate::events::PetalSonicEvent;
use crate::output::{OutputGraph, OutputVoice};
use crate::playback::{PlayState, PlaybackTimeline, PlaybackWindow, RepeatCounter, RepeatOutcome};
use crate::scene::{PoseProvider, SubscriptionId, TransformChange};
use crate::spatial::{DirectionSetting, DistanceSetting, SpatialSink};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static NEXT_EMITTER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique emitter handle, used in events and logs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmitterId(u64);

impl EmitterId {
    fn next() -> Self {
        Self(NEXT_EMITTER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for EmitterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EmitterId({})", self.0)
    }
}

/// Notifications queued for the owner thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitterMessage {
    /// The voice started with this generation consumed its window
    Ended { generation: u64 },
    PoseChanged(TransformChange),
}

/// Called on natural completion of a play cycle. Not called for `stop()` or
/// `pause()`.
pub type CompletionCallback = Box<dyn FnMut(EmitterId) + Send + 'static>;

pub struct PetalSonicEmitter {
    id: EmitterId,
    clip: Option<PetalSonicAudioData>,
    timeline: PlaybackTimeline,
    repeats: RepeatCounter,
    loop_enabled: bool,
    volume: f32,
    mute: bool,
    playback_rate: f32,
    distance: DistanceSetting,
    direction: DirectionSetting,

    output: Box<dyn OutputGraph>,
    voice: Option<Box<dyn OutputVoice>>,
    generation: u64,
    spatial: Box<dyn SpatialSink>,
    pose: Box<dyn PoseProvider>,
    subscription: Option<SubscriptionId>,
    /// Set while a `PoseChanged` is queued and not yet applied
    pose_pending: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,

    message_sender: Sender<EmitterMessage>,
    message_receiver: Receiver<EmitterMessage>,
    events: Vec<PetalSonicEvent>,
    on_complete: Option<CompletionCallback>,
}

impl PetalSonicEmitter {
    /// Attach an emitter to `pose`.
    ///
    /// Subscribes to pose changes and pushes the initial pose and the distance
    /// and cone settings to `spatial` right away.
    pub fn new(
        desc: PetalSonicEmitterDesc,
        output: Box<dyn OutputGraph>,
        spatial: Box<dyn SpatialSink>,
        pose: Box<dyn PoseProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        desc.validate()?;

        let (message_sender, message_receiver) = crossbeam_channel::unbounded();
        let mut emitter = Self {
            id: EmitterId::next(),
            clip: None,
            timeline: PlaybackTimeline::new(desc.start_time, desc.end_time),
            repeats: RepeatCounter::new(desc.repeat_times),
            loop_enabled: desc.loop_enabled,
            volume: desc.volume,
            mute: false,
            playback_rate: desc.playback_rate,
            distance: desc.distance.normalized(),
            direction: desc.direction.normalized(),
            output,
            voice: None,
            generation: 0,
            spatial,
            pose,
            subscription: None,
            pose_pending: Arc::new(AtomicBool::new(false)),
            clock,
            message_sender,
            message_receiver,
            events: Vec::new(),
            on_complete: None,
        };

        emitter.set_mute(desc.mute);
        emitter.spatial.set_distance_model(&emitter.distance);
        emitter.spatial.set_cone(&emitter.direction);
        emitter.subscribe_pose();
        emitter.sync_pose();

        log::debug!("{} attached", emitter.id);
        Ok(emitter)
    }

    pub fn id(&self) -> EmitterId {
        self.id
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// Start a play cycle from `start_time`.
    ///
    /// Only acts from Stopped: while playing or paused, use `stop()` or
    /// `resume()`. Also does nothing without a clip, or when the configured
    /// window does not fit the clip.
    pub fn play(&mut self) {
        let state = self.timeline.state();
        if state != PlayState::Stopped {
            log::debug!("{} play ignored: {:?}", self.id, state);
            return;
        }
        self.start_window();
    }

    /// Snapshot the position and release the voice. No-op unless playing.
    pub fn pause(&mut self) {
        if !self.timeline.is_playing() {
            log::debug!("{} pause ignored: not playing", self.id);
            return;
        }

        let position = self.timeline.pause(self.clock.now());
        self.teardown_voice();

        log::debug!("{} paused at {:.3}s", self.id, position);
        self.events.push(PetalSonicEvent::Paused {
            emitter_id: self.id,
            position,
        });
    }

    /// Continue from the pause position. No-op unless paused.
    pub fn resume(&mut self) {
        let Some(clip) = self.clip.clone() else {
            log::debug!("{} resume ignored: no clip bound", self.id);
            return;
        };
        let Some(window) = self.timeline.resume_window(self.loop_enabled) else {
            log::debug!("{} resume ignored: nothing to resume", self.id);
            return;
        };

        self.start_span(&clip, window);

        log::debug!("{} resumed at {:.3}s", self.id, window.offset);
        self.events.push(PetalSonicEvent::Resumed {
            emitter_id: self.id,
            position: window.offset,
        });
    }

    /// Stop playback and restart repeat accounting. Idempotent.
    pub fn stop(&mut self) {
        let was_active = self.voice.is_some() || self.timeline.state() != PlayState::Stopped;

        self.teardown_voice();
        self.repeats.reset();
        self.timeline.stop();

        if was_active {
            log::debug!("{} stopped", self.id);
            self.events.push(PetalSonicEvent::Stopped {
                emitter_id: self.id,
            });
        }
    }

    /// Apply queued end-of-playback and pose notifications.
    ///
    /// Call once per frame from the owner thread.
    pub fn update(&mut self) {
        while let Ok(message) = self.message_receiver.try_recv() {
            match message {
                EmitterMessage::Ended { generation } => self.handle_natural_end(generation),
                EmitterMessage::PoseChanged(change) => {
                    self.pose_pending.store(false, Ordering::Release);
                    self.on_transform_changed(change);
                }
            }
        }
    }

    /// Push the current pose for a change the host delivers itself.
    pub fn on_transform_changed(&mut self, change: TransformChange) {
        log::trace!("{} transform changed: {:?}", self.id, change);
        self.sync_pose();
    }

    /// Forward world position and forward vector to the spatial sink, stamped
    /// with the sink's clock.
    pub fn sync_pose(&mut self) {
        let position = self.pose.position();
        let forward = self.pose.forward();
        let at_time = self.spatial.current_time();
        self.spatial.set_position(position, at_time);
        self.spatial.set_orientation(forward, at_time);
    }

    /// Current offset into the clip in seconds, 0 when not playing.
    pub fn position(&self) -> f64 {
        self.timeline.position(self.clock.now())
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.is_playing()
    }

    pub fn play_state(&self) -> PlayState {
        self.timeline.state()
    }

    /// Take all events queued since the last call.
    pub fn poll_events(&mut self) -> Vec<PetalSonicEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_on_complete<F>(&mut self, callback: F)
    where
        F: FnMut(EmitterId) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn clear_on_complete(&mut self) {
        self.on_complete = None;
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    pub fn clip(&self) -> Option<&PetalSonicAudioData> {
        self.clip.as_ref()
    }

    /// Bind a clip. A playing or paused emitter is stopped first.
    pub fn set_clip(&mut self, clip: Option<PetalSonicAudioData>) {
        if self.timeline.state() != PlayState::Stopped {
            log::warn!("{} clip replaced while active, stopping", self.id);
            self.stop();
        }
        self.clip = clip;
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    /// Also applied to the live voice.
    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        if let Some(voice) = self.voice.as_mut() {
            voice.set_loop(
                enabled,
                self.timeline.start_time(),
                self.timeline.end_time(),
            );
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Clamped to `>= 0`; non-finite values are ignored. Scheduled on the live
    /// output at its current time while playing, otherwise applied at the next
    /// start.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            log::warn!("{} ignoring non-finite volume {}", self.id, volume);
            return;
        }
        self.volume = volume.max(0.0);
        if self.timeline.is_playing() {
            let at_time = self.output.current_time();
            self.output.set_volume(self.volume, at_time);
        }
    }

    pub fn mute(&self) -> bool {
        self.mute
    }

    /// Muting writes 0 into `volume`. Unmuting leaves `volume` alone, so the
    /// level from before the mute is not restored.
    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
        if mute {
            self.set_volume(0.0);
        }
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    /// Rejects non-finite and non-positive rates. Applied to the live voice.
    pub fn set_playback_rate(&mut self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            log::warn!("{} ignoring playback rate {}", self.id, rate);
            return;
        }
        self.playback_rate = rate;
        if let Some(voice) = self.voice.as_mut() {
            voice.set_playback_rate(rate);
        }
    }

    pub fn repeat_times(&self) -> u32 {
        self.repeats.repeat_times()
    }

    /// Spans left in the current play cycle.
    pub fn remaining_repeats(&self) -> u32 {
        self.repeats.remaining()
    }

    /// Clamped to `>= 1`. Resets the remaining count, also mid-playback.
    pub fn set_repeat_times(&mut self, repeat_times: u32) {
        if repeat_times == 0 {
            log::warn!("{} repeat_times 0 clamped to 1", self.id);
        }
        self.repeats.set_repeat_times(repeat_times);
    }

    pub fn start_time(&self) -> f64 {
        self.timeline.start_time()
    }

    /// Takes effect at the next `play()`.
    pub fn set_start_time(&mut self, start_time: f64) {
        self.timeline.set_start_time(start_time);
    }

    pub fn end_time(&self) -> Option<f64> {
        self.timeline.end_time()
    }

    /// Takes effect at the next `play()` or `resume()`. Not checked against
    /// `start_time` until then.
    pub fn set_end_time(&mut self, end_time: Option<f64>) {
        self.timeline.set_end_time(end_time);
    }

    pub fn distance_setting(&self) -> DistanceSetting {
        self.distance
    }

    /// Pushed to the spatial sink immediately, in any state.
    pub fn set_distance_setting(&mut self, setting: DistanceSetting) {
        self.distance = setting.normalized();
        self.spatial.set_distance_model(&self.distance);
    }

    pub fn direction_setting(&self) -> DirectionSetting {
        self.direction
    }

    /// Pushed to the spatial sink immediately, in any state.
    pub fn set_direction_setting(&mut self, setting: DirectionSetting) {
        self.direction = setting.normalized();
        self.spatial.set_cone(&self.direction);
    }

    /// Move the emitter onto another pose provider.
    pub fn set_pose_provider(&mut self, pose: Box<dyn PoseProvider>) {
        self.unsubscribe_pose();
        self.pose = pose;
        self.subscribe_pose();
        self.sync_pose();
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Begin a span over the configured window. Returns false when the
    /// request is rejected.
    fn start_window(&mut self) -> bool {
        let Some(clip) = self.clip.clone() else {
            log::debug!("{} play ignored: no clip bound", self.id);
            return false;
        };
        let Some(window) = self.timeline.play_window(clip.duration_secs()) else {
            log::debug!(
                "{} play ignored: window [{}, {:?}] invalid for a {:.3}s clip",
                self.id,
                self.timeline.start_time(),
                self.timeline.end_time(),
                clip.duration_secs()
            );
            return false;
        };

        self.timeline.clear_pause();
        self.start_span(&clip, window);

        log::debug!(
            "{} playing from {:.3}s (duration {:?}, loop {}, {} spans left)",
            self.id,
            window.offset,
            window.duration,
            self.loop_enabled,
            self.repeats.remaining()
        );
        self.events.push(PetalSonicEvent::Started {
            emitter_id: self.id,
            offset: window.offset,
        });
        true
    }

    fn start_span(&mut self, clip: &PetalSonicAudioData, window: PlaybackWindow) {
        self.teardown_voice();

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        let mut voice = self.output.create_source(clip);
        voice.set_loop(
            self.loop_enabled,
            self.timeline.start_time(),
            self.timeline.end_time(),
        );
        voice.set_playback_rate(self.playback_rate);
        let at_time = self.output.current_time();
        self.output.set_volume(self.volume, at_time);

        let sender = self.message_sender.clone();
        voice.set_end_callback(Some(Box::new(move || {
            // receiver is gone once the emitter is dropped
            let _ = sender.send(EmitterMessage::Ended { generation });
        })));
        voice.start(window.offset, window.duration);

        self.voice = Some(voice);
        self.timeline.begin_span(self.clock.now());
    }

    fn teardown_voice(&mut self) {
        if let Some(mut voice) = self.voice.take() {
            // unregister first: stopping may itself report an end
            voice.set_end_callback(None);
            voice.stop();
            voice.disconnect();
        }
    }

    fn handle_natural_end(&mut self, generation: u64) {
        if !self.timeline.is_playing() || generation != self.generation {
            log::debug!(
                "{} ignoring stale end notification (generation {}, current {})",
                self.id,
                generation,
                self.generation
            );
            return;
        }

        self.timeline.end_span();
        self.teardown_voice();

        match self.repeats.on_natural_end() {
            RepeatOutcome::Complete => {
                self.timeline.stop();
                log::debug!("{} completed", self.id);
                self.events.push(PetalSonicEvent::Completed {
                    emitter_id: self.id,
                });
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(self.id);
                }
            }
            RepeatOutcome::Restart { remaining } => {
                log::debug!("{} span ended, {} left", self.id, remaining);
                self.events.push(PetalSonicEvent::Repeated {
                    emitter_id: self.id,
                    remaining,
                });
                // a resumed span leaves its pause snapshot behind, so the
                // restart bypasses the Stopped-only check of play()
                if !self.start_window() {
                    log::warn!("{} could not restart, ending cycle", self.id);
                    self.repeats.reset();
                    self.timeline.stop();
                }
            }
        }
    }

    fn subscribe_pose(&mut self) {
        let sender = self.message_sender.clone();
        let pending = self.pose_pending.clone();
        let id = self.pose.subscribe(Box::new(move |change| {
            // one queued sync re-reads the whole pose
            if !pending.swap(true, Ordering::AcqRel) {
                let _ = sender.send(EmitterMessage::PoseChanged(change));
            }
        }));
        self.subscription = Some(id);
    }

    fn unsubscribe_pose(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.pose.unsubscribe(id);
        }
    }
}

impl Drop for PetalSonicEmitter {
    fn drop(&mut self) {
        self.teardown_voice();
        self.unsubscribe_pose();
        log::debug!("{} detached", self.id);
    }
}
