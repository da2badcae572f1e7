//! Configuration type definitions
//!
//! These types represent the machine configuration. The firmware fills
//! them from `machine.toml`; every field has a default matching the
//! reference build.

use heapless::{String, Vec};

use crate::motion::{AxisConfig, MotionLimits, ProfileConfig};
use crate::state::{HomingConfig, SequenceConfig};
use crate::traits::Direction;

use super::presets::SpeedPreset;

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 16;

/// Maximum speed presets per config (three built in)
pub const MAX_PRESETS: usize = 6;

/// Configuration errors found by [`MachineConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Zero steps, microsteps or gear ratio
    InvalidGearing,
    /// Target speed not positive
    InvalidSpeed,
    /// Ramp zone, curve or floor out of range
    InvalidProfile,
    /// Soft limit above the hard limit, or a non-positive limit
    InvalidLimits,
    /// Trigger offset larger than half the sweep
    InvalidTrigger,
    /// `preset` names no known preset
    UnknownPreset,
}

/// GPIO pin assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    /// GPIO pin number (0-29 for RP2040)
    pub pin: u8,
    /// Pin is active-low (inverted)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl PinConfig {
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: false,
        }
    }

    pub const fn inverted(pin: u8) -> Self {
        Self {
            pin,
            inverted: true,
            pull_up: false,
        }
    }

    pub const fn with_pullup(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: true,
        }
    }
}

/// Mechanics and ramp of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSettings {
    pub axis: AxisConfig,
    pub profile: ProfileConfig,
}

impl AxisSettings {
    pub const MAIN: Self = Self {
        axis: AxisConfig::MAIN,
        profile: ProfileConfig::MAIN,
    };

    pub const OSCILLATION: Self = Self {
        axis: AxisConfig::OSCILLATION,
        profile: ProfileConfig::OSCILLATION,
    };

    fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.axis;
        if a.steps_per_rev == 0 || a.microsteps == 0 || a.gear_ratio == 0 {
            return Err(ConfigError::InvalidGearing);
        }
        if !(a.target_rpm > 0.0) {
            return Err(ConfigError::InvalidSpeed);
        }
        let p = &self.profile;
        let zone_ok = |z: f32| (0.0..=1.0).contains(&z);
        if !zone_ok(p.accel_zone)
            || !zone_ok(p.decel_zone)
            || !(p.curve > 0.0)
            || !(p.min_speed > 0.0 && p.min_speed <= 1.0)
        {
            return Err(ConfigError::InvalidProfile);
        }
        Ok(())
    }
}

/// Main axis travel and persistence cadence
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TravelSettings {
    pub limits: MotionLimits,
    /// Distance of a plain `go` command
    pub default_move_deg: f32,
    /// Save the position whenever it drifted this far from the stored value
    pub save_interval_steps: u32,
    /// Distance from zero that still counts as home
    pub home_tolerance_deg: f32,
}

impl Default for TravelSettings {
    fn default() -> Self {
        Self {
            limits: MotionLimits::default(),
            default_move_deg: 180.0,
            save_interval_steps: 44,
            home_tolerance_deg: 1.0,
        }
    }
}

/// Oscillation homing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingSettings {
    /// Safety distance kept from each switch
    pub offset_deg: f32,
    pub settle_ms: u32,
    pub first_direction: Direction,
    /// Home the oscillation axis at boot
    pub auto_start: bool,
}

impl Default for HomingSettings {
    fn default() -> Self {
        Self {
            offset_deg: 0.5,
            settle_ms: 500,
            first_direction: Direction::Clockwise,
            auto_start: true,
        }
    }
}

/// Synchronized sequence
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceSettings {
    /// Main axis sweep
    pub travel_deg: f32,
    /// Oscillation trigger distance from each sweep end
    pub trigger_offset_deg: f32,
    /// Clearance kept from the usable oscillation range, in steps
    pub stroke_margin_steps: u32,
    /// Start the sequence once homing finishes
    pub auto_start: bool,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            travel_deg: 720.0,
            trigger_offset_deg: 60.0,
            stroke_margin_steps: 50,
            auto_start: true,
        }
    }
}

/// Position store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreSettings {
    /// 7-bit I2C address of the FRAM
    pub i2c_address: u8,
    /// Drive the main axis back to zero after an unclean shutdown
    pub auto_recovery: bool,
    /// Finish the recovery move before homing the oscillation axis
    pub recovery_before_homing: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            i2c_address: 0x50,
            auto_recovery: true,
            recovery_before_homing: true,
        }
    }
}

/// Loop and signal timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingSettings {
    pub control_interval_ms: u32,
    pub debounce_ms: u32,
    /// Pause between a direction change and the next pulse
    pub dir_change_delay_ms: u32,
    /// Direction-to-step setup time required by the driver
    pub dir_setup_us: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            control_interval_ms: 10,
            debounce_ms: 5,
            dir_change_delay_ms: 50,
            dir_setup_us: 5,
        }
    }
}

/// Board wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinSettings {
    pub main_step: PinConfig,
    pub main_dir: PinConfig,
    pub oscillation_step: PinConfig,
    pub oscillation_dir: PinConfig,
    /// Driver enable, active low
    pub oscillation_enable: PinConfig,
    /// Normally-closed switch reached by the first seek
    pub first_switch: PinConfig,
    pub second_switch: PinConfig,
    pub i2c_sda: PinConfig,
    pub i2c_scl: PinConfig,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            main_step: PinConfig::new(2),
            main_dir: PinConfig::new(3),
            oscillation_step: PinConfig::new(6),
            oscillation_dir: PinConfig::new(7),
            oscillation_enable: PinConfig::inverted(8),
            first_switch: PinConfig::with_pullup(10),
            second_switch: PinConfig::with_pullup(11),
            i2c_sda: PinConfig::new(4),
            i2c_scl: PinConfig::new(5),
        }
    }
}

/// Complete machine configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MachineConfig {
    pub main: AxisSettings,
    pub oscillation: AxisSettings,
    pub travel: TravelSettings,
    pub homing: HomingSettings,
    pub sequence: SequenceSettings,
    pub store: StoreSettings,
    pub timing: TimingSettings,
    pub pins: PinSettings,
    /// Known speed presets, built-ins first
    pub presets: Vec<SpeedPreset, MAX_PRESETS>,
    /// Preset applied over the axis speeds, if any
    pub preset: Option<String<MAX_LABEL_LEN>>,
}

impl MachineConfig {
    pub fn new() -> Self {
        let mut presets = Vec::new();
        for preset in SpeedPreset::builtin() {
            let _ = presets.push(preset);
        }
        Self {
            main: AxisSettings::MAIN,
            oscillation: AxisSettings::OSCILLATION,
            travel: TravelSettings::default(),
            homing: HomingSettings::default(),
            sequence: SequenceSettings::default(),
            store: StoreSettings::default(),
            timing: TimingSettings::default(),
            pins: PinSettings::default(),
            presets,
            preset: None,
        }
    }

    /// Look up a preset by name
    pub fn find_preset(&self, name: &str) -> Option<&SpeedPreset> {
        self.presets.iter().find(|p| p.name.as_str() == name)
    }

    /// Overwrite the axis speeds, ramps and trigger offset with the
    /// selected preset
    pub fn apply_preset(&mut self) -> Result<(), ConfigError> {
        let Some(name) = self.preset.as_ref() else {
            return Ok(());
        };
        let preset = self
            .find_preset(name.as_str())
            .cloned()
            .ok_or(ConfigError::UnknownPreset)?;
        preset.apply(self);
        Ok(())
    }

    /// Check ranges that would make the machine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.main.validate()?;
        self.oscillation.validate()?;

        let limits = &self.travel.limits;
        if !(limits.hard_limit_deg > 0.0) || !(limits.soft_limit_deg <= limits.hard_limit_deg) {
            return Err(ConfigError::InvalidLimits);
        }
        if !(self.sequence.travel_deg > 0.0) || self.sequence.travel_deg > limits.hard_limit_deg {
            return Err(ConfigError::InvalidLimits);
        }

        let offset = self.sequence.trigger_offset_deg;
        if !(offset >= 0.0) || offset * 2.0 > self.sequence.travel_deg {
            return Err(ConfigError::InvalidTrigger);
        }
        Ok(())
    }

    /// Homing parameters in oscillation-axis steps
    pub fn homing_config(&self) -> HomingConfig {
        HomingConfig {
            offset_steps: self.oscillation.axis.degrees_to_steps(self.homing.offset_deg),
            settle_ms: self.homing.settle_ms,
            first_direction: self.homing.first_direction,
        }
    }

    /// Sequence geometry in steps
    pub fn sequence_config(&self) -> SequenceConfig {
        let mut config = SequenceConfig::from_degrees(
            &self.main.axis,
            self.sequence.travel_deg,
            self.sequence.trigger_offset_deg,
        );
        config.stroke_margin_steps = self.sequence.stroke_margin_steps;
        config.advance_direction = self.homing.first_direction;
        config
    }

    /// Home tolerance in main-axis steps
    pub fn home_tolerance_steps(&self) -> u32 {
        self.main.axis.degrees_to_steps(self.travel.home_tolerance_deg)
    }

    /// Largest plausible main-axis position magnitude
    pub fn max_travel_steps(&self) -> u32 {
        self.travel.limits.max_travel_steps(&self.main.axis)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new()
    }
}
