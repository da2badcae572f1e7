//! Named speed presets
//!
//! A preset sets the target speed and ramp of both axes plus the
//! oscillation trigger offset in one go.

use heapless::String;

use crate::motion::ProfileConfig;

use super::types::{MachineConfig, MAX_LABEL_LEN};

/// Speed and ramp for one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisPreset {
    pub rpm: f32,
    pub profile: ProfileConfig,
}

/// Named set of speeds for both axes
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedPreset {
    pub name: String<MAX_LABEL_LEN>,
    pub main: AxisPreset,
    pub oscillation: AxisPreset,
    pub trigger_offset_deg: f32,
}

const fn ramp(accel_zone: f32, decel_zone: f32, curve: f32, min_speed: f32) -> ProfileConfig {
    ProfileConfig {
        accel_zone,
        decel_zone,
        curve,
        min_speed,
    }
}

impl SpeedPreset {
    fn named(name: &str, main: AxisPreset, oscillation: AxisPreset, trigger_offset_deg: f32) -> Self {
        let mut label = String::new();
        for c in name.chars() {
            if label.push(c).is_err() {
                break;
            }
        }
        Self {
            name: label,
            main,
            oscillation,
            trigger_offset_deg,
        }
    }

    /// Default everyday motion
    pub fn balanced() -> Self {
        Self::named(
            "balanced",
            AxisPreset {
                rpm: 5.0,
                profile: ramp(0.05, 0.05, 1.5, 0.1),
            },
            AxisPreset {
                rpm: 1.2,
                profile: ramp(0.05, 0.05, 0.9, 0.1),
            },
            30.0,
        )
    }

    /// Quicker sweeps with long ramps
    pub fn fast() -> Self {
        Self::named(
            "fast",
            AxisPreset {
                rpm: 8.0,
                profile: ramp(0.2, 0.2, 0.5, 0.1),
            },
            AxisPreset {
                rpm: 2.0,
                profile: ramp(0.4, 0.2, 0.5, 0.12),
            },
            70.0,
        )
    }

    /// Slow, soft motion
    pub fn smooth() -> Self {
        Self::named(
            "smooth",
            AxisPreset {
                rpm: 4.0,
                profile: ramp(0.08, 0.08, 1.2, 0.1),
            },
            AxisPreset {
                rpm: 0.8,
                profile: ramp(0.08, 0.08, 0.8, 0.1),
            },
            45.0,
        )
    }

    pub fn builtin() -> [Self; 3] {
        [Self::balanced(), Self::fast(), Self::smooth()]
    }

    /// Preset with the given name and the built-in values of `base`
    pub fn derived(name: &str, base: &SpeedPreset) -> Self {
        Self::named(name, base.main, base.oscillation, base.trigger_offset_deg)
    }

    /// Write this preset into a configuration
    pub fn apply(&self, config: &mut MachineConfig) {
        config.main.axis.target_rpm = self.main.rpm;
        config.main.profile = self.main.profile;
        config.oscillation.axis.target_rpm = self.oscillation.rpm;
        config.oscillation.profile = self.oscillation.profile;
        config.sequence.trigger_offset_deg = self.trigger_offset_deg;
    }
}
