//! # PetalSonic Emitter
//!
//! Positional audio playback for objects in a 3D scene.
//!
//! A [`PetalSonicEmitter`] plays one clip at the position of a scene object.
//! It owns the play/pause/resume/stop state machine, a start/end window with
//! optional looping and a bounded repeat count, volume, mute and playback
//! rate, and a playback position derived from a clock. Every pose change of
//! the object is forwarded to a spatialization sink.
//!
//! ## Quick Start
//!
//! ```no_run
//! use petalsonic_emitter::*;
//! use std::sync::Arc;
//!
//! // Open the output device and its software mixer
//! let mut engine = PetalSonicEngine::new(PetalSonicMixerDesc::default())?;
//! engine.start()?;
//! let mixer = engine.mixer();
//!
//! // The object the sound is attached to
//! let node = SceneNode::new(Pose::from_position(Vec3::new(2.0, 0.0, -3.0)));
//!
//! let (output, spatial) = mixer.create_strip();
//! let mut emitter = PetalSonicEmitter::new(
//!     PetalSonicEmitterDesc::new().window(1.0, Some(4.0)).repeat_times(2),
//!     Box::new(output),
//!     Box::new(spatial),
//!     Box::new(node.clone()),
//!     Arc::new(SystemClock::new()),
//! )?;
//! emitter.set_clip(Some(PetalSonicAudioData::from_path("footsteps.wav")?));
//! emitter.play();
//!
//! loop {
//!     // Apply end-of-playback and pose notifications
//!     emitter.update();
//!     for event in emitter.poll_events() {
//!         if let PetalSonicEvent::Completed { emitter_id } = event {
//!             println!("{} finished", emitter_id);
//!         }
//!     }
//!     # break;
//! }
//! # Ok::<(), PetalSonicError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`PetalSonicEmitter`]**: playback state machine for one positional sound
//! - **[`OutputGraph`]** / **[`OutputVoice`]**: the audio graph an emitter plays into
//! - **[`SpatialSink`]**: receives pose, distance and cone updates
//! - **[`PoseProvider`]**: the scene object an emitter follows, e.g. [`SceneNode`]
//! - **[`Clock`]**: time base for playback position
//! - **[`SoftwareMixer`]** / **[`PetalSonicEngine`]**: bundled output graph rendered to a cpal device
//!
//! ## Threading
//!
//! An emitter lives on one owner thread. End-of-playback callbacks and pose
//! notifications may fire elsewhere; they are queued and applied by
//! [`PetalSonicEmitter::update`].

pub mod audio_data;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod events;
pub mod math;
pub mod mixer;
pub mod output;
pub mod playback;
pub mod scene;
pub mod spatial;

pub use audio_data::{LoadOptions, PetalSonicAudioData};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PetalSonicEmitterDesc, PetalSonicMixerDesc};
pub use emitter::{EmitterId, PetalSonicEmitter};
pub use engine::PetalSonicEngine;
pub use error::{PetalSonicError, Result};
pub use events::PetalSonicEvent;
pub use math::{Pose, Quat, Vec3};
pub use mixer::{MixerOutput, MixerSpatialSink, MixerVoice, SoftwareMixer};
pub use output::{EndCallback, OutputGraph, OutputVoice};
pub use playback::PlayState;
pub use scene::{PoseProvider, SceneNode, TransformChange};
pub use spatial::{DirectionSetting, DistanceSetting, PanningModel, RolloffModel, SpatialSink};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_emitter_on_software_mixer() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mixer =
            SoftwareMixer::new(PetalSonicMixerDesc::new().sample_rate(100).channels(1)).unwrap();
        let node = SceneNode::new(Pose::from_position(Vec3::new(2.0, 0.0, 0.0)));
        let clock = ManualClock::new(0.0);

        let (output, spatial) = mixer.create_strip();
        let mut emitter = PetalSonicEmitter::new(
            PetalSonicEmitterDesc::new().repeat_times(2),
            Box::new(output),
            Box::new(spatial),
            Box::new(node.clone()),
            Arc::new(clock.clone()),
        )
        .unwrap();
        emitter.set_clip(Some(
            PetalSonicAudioData::new(vec![1.0; 100], 100, 1).unwrap(),
        ));
        emitter.play();
        assert_eq!(mixer.active_voices(), 1);

        // one second of output plays the whole clip
        let mut buffer = vec![0.0; 100];
        mixer.mix(&mut buffer);
        clock.advance(1.0);
        // inverse rolloff at two units
        approx::assert_relative_eq!(buffer[0], 0.5);

        emitter.update();
        assert!(emitter.is_playing());
        assert_eq!(emitter.remaining_repeats(), 1);
        assert_eq!(mixer.active_voices(), 1);

        mixer.mix(&mut buffer);
        emitter.update();
        assert_eq!(emitter.play_state(), PlayState::Stopped);
        assert_eq!(mixer.active_voices(), 0);

        let events = emitter.poll_events();
        assert!(matches!(events.last(), Some(PetalSonicEvent::Completed { .. })));

        drop(emitter);
        assert_eq!(mixer.strip_count(), 0);
        assert_eq!(node.subscriber_count(), 0);
    }
}
