//! Acceleration and deceleration ramps
//!
//! Ramp lengths are a fixed fraction of one output revolution, not of the
//! move, so every move accelerates the same way no matter how far it goes.
//! Very short moves therefore spend most of their time ramping.

use libm::powf;

/// Ramp shape for one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileConfig {
    /// Acceleration zone as a fraction of one output revolution
    pub accel_zone: f32,
    /// Deceleration zone as a fraction of one output revolution
    pub decel_zone: f32,
    /// Exponent applied to ramp progress (1.0 = linear)
    pub curve: f32,
    /// Lowest speed factor, as a fraction of the target speed
    pub min_speed: f32,
}

impl ProfileConfig {
    /// Main axis ramp: 5% zones, curve 0.8
    pub const MAIN: Self = Self {
        accel_zone: 0.05,
        decel_zone: 0.05,
        curve: 0.8,
        min_speed: 0.1,
    };

    /// Oscillation axis ramp: 5% zones, curve 0.9
    pub const OSCILLATION: Self = Self {
        accel_zone: 0.05,
        decel_zone: 0.05,
        curve: 0.9,
        min_speed: 0.1,
    };
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self::MAIN
    }
}

/// Per-move ramp evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedProfile {
    accel_zone_steps: u32,
    decel_zone_steps: u32,
    curve: f32,
    floor: f32,
    accel_end: u32,
    decel_start: u32,
    total: u32,
    active: bool,
}

impl SpeedProfile {
    /// Create a profile for an axis with `steps_per_output_rev` microsteps
    /// per output revolution
    pub fn new(config: &ProfileConfig, steps_per_output_rev: u32) -> Self {
        let rev = steps_per_output_rev as f32;
        let floor = config.min_speed.clamp(0.0, 1.0);
        Self {
            accel_zone_steps: (rev * config.accel_zone.max(0.0)) as u32,
            decel_zone_steps: (rev * config.decel_zone.max(0.0)) as u32,
            curve: config.curve,
            floor,
            accel_end: 0,
            decel_start: 0,
            total: 0,
            active: false,
        }
    }

    /// Compute the ramp points for a move of `total_steps`
    pub fn begin_move(&mut self, total_steps: u32) {
        self.total = total_steps;
        self.accel_end = self.accel_zone_steps;
        self.decel_start = total_steps.saturating_sub(self.decel_zone_steps);
        self.active = true;
    }

    /// Run the next move at constant speed (homing, seeks)
    pub fn bypass(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn accel_end(&self) -> u32 {
        self.accel_end
    }

    pub fn decel_start(&self) -> u32 {
        self.decel_start
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Speed factor at `current_step` of the move, in `[floor, 1.0]`
    pub fn evaluate(&self, current_step: u32) -> f32 {
        if !self.active {
            return 1.0;
        }
        let accel = self.accel_factor(current_step);
        let decel = self.decel_factor(current_step);
        accel.min(decel)
    }

    fn accel_factor(&self, step: u32) -> f32 {
        if self.accel_end == 0 || step >= self.accel_end {
            return 1.0;
        }
        let progress = step as f32 / self.accel_end as f32;
        self.ramp(progress)
    }

    fn decel_factor(&self, step: u32) -> f32 {
        if step <= self.decel_start {
            return 1.0;
        }
        let length = self.total - self.decel_start;
        if length == 0 {
            return 1.0;
        }
        let remaining = self.total.saturating_sub(step);
        self.ramp(remaining as f32 / length as f32)
    }

    fn ramp(&self, progress: f32) -> f32 {
        powf(progress, self.curve).max(self.floor).min(1.0)
    }
}
