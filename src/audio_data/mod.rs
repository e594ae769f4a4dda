//! Decoded audio clips.
//!
//! [`PetalSonicAudioData`] is the asset an emitter plays. It is immutable once
//! built and cheap to clone, so the clone handed to an output voice doubles as
//! the buffer handle.

mod load_options;
mod symphonia_loader;

use crate::error::{PetalSonicError, Result};
pub use load_options::LoadOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use symphonia_loader::load_audio_file;

#[derive(Debug, Clone)]
pub struct PetalSonicAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
struct AudioDataInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl PetalSonicAudioData {
    /// Wrap interleaved samples. Duration is derived from the frame count.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PetalSonicError::AudioFormat(
                "Sample rate must be non-zero".to_string(),
            ));
        }
        if channels == 0 {
            return Err(PetalSonicError::AudioFormat(
                "Channel count must be non-zero".to_string(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(PetalSonicError::AudioFormat(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        let total_frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / sample_rate as f64);

        Ok(Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        })
    }

    /// Decode a file with default [`LoadOptions`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        load_audio_file(path, &LoadOptions::default())
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    /// Duration in seconds, the unit every playback offset uses.
    pub fn duration_secs(&self) -> f64 {
        self.inner.duration.as_secs_f64()
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// Downmixed value of the frame that covers `time` seconds into the clip.
    ///
    /// Returns silence outside the clip.
    pub fn mono_at(&self, time: f64) -> f32 {
        if !(time >= 0.0) {
            return 0.0;
        }
        let frame = (time * self.inner.sample_rate as f64) as usize;
        if frame >= self.inner.total_frames {
            return 0.0;
        }

        let channels = self.inner.channels as usize;
        let start = frame * channels;
        let sum: f32 = self.inner.samples[start..start + channels].iter().sum();
        sum / channels as f32
    }

    /// True when both handles point at the same decoded buffer.
    pub fn same_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_frames() {
        let data = PetalSonicAudioData::new(vec![0.0; 2000], 100, 2).unwrap();
        assert_eq!(data.total_frames(), 1000);
        assert_eq!(data.duration_secs(), 10.0);
        assert!(!data.is_empty());
    }

    #[test]
    fn test_invalid_layout() {
        assert!(PetalSonicAudioData::new(vec![0.0; 3], 100, 2).is_err());
        assert!(PetalSonicAudioData::new(vec![0.0; 4], 0, 2).is_err());
        assert!(PetalSonicAudioData::new(vec![0.0; 4], 100, 0).is_err());
    }

    #[test]
    fn test_mono_at_downmixes_frames() {
        let data = PetalSonicAudioData::new(vec![1.0, 0.0, 0.5, 0.5, -1.0, -1.0], 2, 2).unwrap();
        assert_eq!(data.mono_at(0.0), 0.5);
        assert_eq!(data.mono_at(0.6), 0.5);
        assert_eq!(data.mono_at(1.0), -1.0);
        assert_eq!(data.mono_at(1.5), 0.0);
        assert_eq!(data.mono_at(-0.1), 0.0);
    }

    #[test]
    fn test_clones_share_buffer() {
        let data = PetalSonicAudioData::new(vec![0.0; 4], 4, 1).unwrap();
        let other = PetalSonicAudioData::new(vec![0.0; 4], 4, 1).unwrap();
        assert!(data.same_buffer(&data.clone()));
        assert!(!data.same_buffer(&other));
    }
}
