//! Configuration for PetalSonic

use crate::error::{PetalSonicError, Result};
use crate::spatial::{DirectionSetting, DistanceSetting};

/// Initial property values for a [`PetalSonicEmitter`](crate::PetalSonicEmitter).
#[derive(Debug, Clone)]
pub struct PetalSonicEmitterDesc {
    pub volume: f32,
    pub mute: bool,
    pub playback_rate: f32,
    /// Loop the `[start_time, end_time)` window within one span
    pub loop_enabled: bool,
    /// Spans per play cycle (at least 1)
    pub repeat_times: u32,
    /// Offset into the clip where playback begins, in seconds
    pub start_time: f64,
    /// Offset where playback ends (None = clip end)
    pub end_time: Option<f64>,
    pub distance: DistanceSetting,
    pub direction: DirectionSetting,
}

impl Default for PetalSonicEmitterDesc {
    fn default() -> Self {
        Self {
            volume: 1.0,
            mute: false,
            playback_rate: 1.0,
            loop_enabled: false,
            repeat_times: 1,
            start_time: 0.0,
            end_time: None,
            distance: DistanceSetting::default(),
            direction: DirectionSetting::default(),
        }
    }
}

impl PetalSonicEmitterDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    pub fn playback_rate(mut self, rate: f32) -> Self {
        self.playback_rate = rate;
        self
    }

    pub fn loop_enabled(mut self, enabled: bool) -> Self {
        self.loop_enabled = enabled;
        self
    }

    pub fn repeat_times(mut self, times: u32) -> Self {
        self.repeat_times = times;
        self
    }

    pub fn window(mut self, start_time: f64, end_time: Option<f64>) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    pub fn distance(mut self, distance: DistanceSetting) -> Self {
        self.distance = distance;
        self
    }

    pub fn direction(mut self, direction: DirectionSetting) -> Self {
        self.direction = direction;
        self
    }

    /// Reject values the emitter setters would otherwise clamp or ignore.
    ///
    /// An `end_time` before `start_time` is accepted here; such a window only
    /// makes `play()` a no-op.
    pub fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(PetalSonicError::Configuration(format!(
                "volume must be finite and non-negative, got {}",
                self.volume
            )));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(PetalSonicError::Configuration(format!(
                "playback_rate must be finite and positive, got {}",
                self.playback_rate
            )));
        }
        if self.repeat_times == 0 {
            return Err(PetalSonicError::Configuration(
                "repeat_times must be at least 1".to_string(),
            ));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(PetalSonicError::Configuration(format!(
                "start_time must be finite and non-negative, got {}",
                self.start_time
            )));
        }
        if let Some(end_time) = self.end_time {
            if !end_time.is_finite() {
                return Err(PetalSonicError::Configuration(format!(
                    "end_time must be finite, got {}",
                    end_time
                )));
            }
        }
        Ok(())
    }
}

/// Output format of the software mixer and the device stream feeding it.
#[derive(Debug, Clone)]
pub struct PetalSonicMixerDesc {
    pub sample_rate: u32,
    /// Frames requested from the device per callback
    pub block_size: usize,
    pub channels: u16,
}

impl Default for PetalSonicMixerDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 1024,
            channels: 2,
        }
    }
}

impl PetalSonicMixerDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PetalSonicError::Configuration(
                "sample_rate must be non-zero".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(PetalSonicError::Configuration(
                "block_size must be non-zero".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(PetalSonicError::Configuration(
                "channels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_desc_validation() {
        assert!(PetalSonicEmitterDesc::default().validate().is_ok());
        assert!(PetalSonicEmitterDesc::new().repeat_times(0).validate().is_err());
        assert!(PetalSonicEmitterDesc::new().volume(-0.5).validate().is_err());
        assert!(PetalSonicEmitterDesc::new().playback_rate(0.0).validate().is_err());
        assert!(
            PetalSonicEmitterDesc::new()
                .window(-1.0, None)
                .validate()
                .is_err()
        );
        // deferred to play()
        assert!(
            PetalSonicEmitterDesc::new()
                .window(4.0, Some(2.0))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_mixer_desc_validation() {
        assert!(PetalSonicMixerDesc::default().validate().is_ok());
        assert!(PetalSonicMixerDesc::new().sample_rate(0).validate().is_err());
        assert!(PetalSonicMixerDesc::new().channels(0).validate().is_err());
    }
}
