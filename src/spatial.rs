//! Spatialization parameters and the sink they are pushed into.
//!
//! The emitter does not spatialize anything itself. It keeps the sink current:
//! pose updates stamped with the sink's clock, and distance/cone settings
//! whenever they are assigned.

use crate::math::Vec3;

/// How gain falls off between `min_distance` and `max_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloffModel {
    Linear,
    #[default]
    Inverse,
    Exponential,
}

/// How a sink places the source in the stereo/binaural field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanningModel {
    #[default]
    EqualPower,
    /// Head-related transfer function. Sinks without HRTF support fall back
    /// to equal-power panning.
    Hrtf,
}

/// Distance attenuation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSetting {
    /// Distance below which the source plays at full gain
    pub min_distance: f32,
    /// Distance past which attenuation stops changing
    pub max_distance: f32,
    pub rolloff: RolloffModel,
    /// Steepness of the rolloff curve
    pub rolloff_factor: f32,
    pub panning: PanningModel,
}

impl Default for DistanceSetting {
    fn default() -> Self {
        Self {
            min_distance: 1.0,
            max_distance: 10000.0,
            rolloff: RolloffModel::Inverse,
            rolloff_factor: 1.0,
            panning: PanningModel::EqualPower,
        }
    }
}

impl DistanceSetting {
    /// Clamp into a usable range: non-negative distances with
    /// `max_distance >= min_distance` and a non-negative rolloff factor.
    pub fn normalized(self) -> Self {
        let min_distance = finite_or(self.min_distance, 1.0).max(0.0);
        let max_distance = finite_or(self.max_distance, 10000.0).max(min_distance);
        let rolloff_factor = finite_or(self.rolloff_factor, 1.0).max(0.0);
        if min_distance != self.min_distance
            || max_distance != self.max_distance
            || rolloff_factor != self.rolloff_factor
        {
            log::warn!("Distance setting clamped: {:?}", self);
        }
        Self {
            min_distance,
            max_distance,
            rolloff_factor,
            ..self
        }
    }

    /// Attenuation for a source `distance` units from the listener.
    pub fn gain(&self, distance: f32) -> f32 {
        let min = self.min_distance;
        let max = self.max_distance;
        let d = distance.min(max);
        if d <= min || self.rolloff_factor <= 0.0 {
            return 1.0;
        }

        match self.rolloff {
            RolloffModel::Linear => {
                let span = max - min;
                if span <= f32::EPSILON {
                    return 1.0;
                }
                1.0 - self.rolloff_factor.min(1.0) * (d - min) / span
            }
            RolloffModel::Inverse => {
                let denominator = min + self.rolloff_factor * (d - min);
                if denominator <= 0.0 {
                    return 1.0;
                }
                min / denominator
            }
            RolloffModel::Exponential => {
                if min <= 0.0 {
                    return 0.0;
                }
                (d / min).powf(-self.rolloff_factor)
            }
        }
    }
}

/// Directional cone settings. Angles are full apertures in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionSetting {
    pub inner_angle: f32,
    pub outer_angle: f32,
    /// Gain applied outside the outer cone
    pub outer_gain: f32,
}

impl Default for DirectionSetting {
    fn default() -> Self {
        Self {
            inner_angle: 360.0,
            outer_angle: 360.0,
            outer_gain: 0.0,
        }
    }
}

impl DirectionSetting {
    /// Clamp angles into `[0, 360]` with `outer_angle >= inner_angle`, and
    /// `outer_gain` into `[0, 1]`.
    pub fn normalized(self) -> Self {
        let inner_angle = finite_or(self.inner_angle, 360.0).clamp(0.0, 360.0);
        let outer_angle = finite_or(self.outer_angle, 360.0).clamp(inner_angle, 360.0);
        let outer_gain = finite_or(self.outer_gain, 0.0).clamp(0.0, 1.0);
        if inner_angle != self.inner_angle
            || outer_angle != self.outer_angle
            || outer_gain != self.outer_gain
        {
            log::warn!("Direction setting clamped: {:?}", self);
        }
        Self {
            inner_angle,
            outer_angle,
            outer_gain,
        }
    }

    pub fn is_omnidirectional(&self) -> bool {
        self.inner_angle >= 360.0 && self.outer_angle >= 360.0
    }

    /// Cone gain for a source facing `forward`, heard from the direction
    /// `to_listener` (source to listener).
    pub fn gain(&self, forward: Vec3, to_listener: Vec3) -> f32 {
        if self.is_omnidirectional() {
            return 1.0;
        }
        let (Some(forward), Some(to_listener)) =
            (forward.try_normalize(), to_listener.try_normalize())
        else {
            return 1.0;
        };

        let angle = forward.dot(to_listener).clamp(-1.0, 1.0).acos().to_degrees();
        let inner = self.inner_angle * 0.5;
        let outer = self.outer_angle * 0.5;

        if angle <= inner {
            1.0
        } else if angle >= outer {
            self.outer_gain
        } else {
            let t = (angle - inner) / (outer - inner);
            1.0 + (self.outer_gain - 1.0) * t
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// Receiver of spatialization updates for one emitter.
///
/// Calls are hand-offs: implementations queue the value for their own
/// scheduling and return immediately.
pub trait SpatialSink: Send {
    /// Current time on the sink's clock, in seconds.
    fn current_time(&self) -> f64;

    fn set_position(&mut self, position: Vec3, at_time: f64);

    fn set_orientation(&mut self, forward: Vec3, at_time: f64);

    fn set_distance_model(&mut self, setting: &DistanceSetting);

    fn set_cone(&mut self, setting: &DirectionSetting);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rolloff_models() {
        let mut setting = DistanceSetting {
            min_distance: 1.0,
            max_distance: 11.0,
            ..Default::default()
        };
        assert_eq!(setting.gain(0.5), 1.0);
        assert_relative_eq!(setting.gain(2.0), 0.5);
        // clamped at max distance
        assert_relative_eq!(setting.gain(100.0), setting.gain(11.0));

        setting.rolloff = RolloffModel::Linear;
        assert_relative_eq!(setting.gain(6.0), 0.5);
        assert_relative_eq!(setting.gain(11.0), 0.0);

        setting.rolloff = RolloffModel::Exponential;
        setting.rolloff_factor = 2.0;
        assert_relative_eq!(setting.gain(2.0), 0.25);

        // no rolloff at a zero reference distance stays finite
        let flat = DistanceSetting {
            min_distance: 0.0,
            max_distance: 100.0,
            rolloff: RolloffModel::Inverse,
            rolloff_factor: 0.0,
            ..Default::default()
        };
        assert_eq!(flat.gain(5.0), 1.0);
        assert_eq!(flat.gain(0.0), 1.0);
        for rolloff in [RolloffModel::Linear, RolloffModel::Exponential] {
            assert_eq!(DistanceSetting { rolloff, ..flat }.gain(5.0), 1.0);
        }

        let zero_reference = DistanceSetting {
            rolloff_factor: 1.0,
            ..flat
        };
        assert!(zero_reference.gain(5.0).is_finite());
    }

    #[test]
    fn test_distance_normalization() {
        let setting = DistanceSetting {
            min_distance: -3.0,
            max_distance: f32::NAN,
            rolloff_factor: -1.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(setting.min_distance, 0.0);
        assert_eq!(setting.max_distance, 10000.0);
        assert_eq!(setting.rolloff_factor, 0.0);

        let setting = DistanceSetting {
            min_distance: 5.0,
            max_distance: 2.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(setting.max_distance, 5.0);
    }

    #[test]
    fn test_cone_gain() {
        let cone = DirectionSetting {
            inner_angle: 90.0,
            outer_angle: 180.0,
            outer_gain: 0.2,
        };
        let forward = -Vec3::Z;

        assert_eq!(cone.gain(forward, -Vec3::Z), 1.0);
        assert_relative_eq!(cone.gain(forward, Vec3::Z), 0.2);
        // 67.5 degrees is halfway between the inner (45) and outer (90) half angles
        let halfway = Vec3::new(67.5f32.to_radians().sin(), 0.0, -67.5f32.to_radians().cos());
        assert_relative_eq!(cone.gain(forward, halfway), 0.6, epsilon = 1e-4);

        assert_eq!(DirectionSetting::default().gain(forward, Vec3::Z), 1.0);
        assert_eq!(cone.gain(Vec3::ZERO, Vec3::Z), 1.0);
    }

    #[test]
    fn test_direction_normalization() {
        let cone = DirectionSetting {
            inner_angle: 400.0,
            outer_angle: 10.0,
            outer_gain: 3.0,
        }
        .normalized();
        assert_eq!(cone.inner_angle, 360.0);
        assert_eq!(cone.outer_angle, 360.0);
        assert_eq!(cone.outer_gain, 1.0);
    }
}
