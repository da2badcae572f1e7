//! Travel limits for the main axis
//!
//! A move whose end position would pass the hard limit is rejected before
//! the axis is touched. Passing the soft limit is only reported.

use crate::traits::Direction;

use super::axis::AxisConfig;

/// Errors when starting a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveError {
    /// Distance is zero, negative or not a number
    InvalidDistance,
    /// End position would pass the hard limit
    HardLimit,
    /// Oscillation axis has no valid range yet
    NotHomed,
}

/// Result of an accepted limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitCheck {
    /// End position inside the soft limit
    Clear,
    /// End position between the soft and hard limits
    SoftLimitWarning,
    /// Check was skipped (homing and return-to-zero moves)
    Unchecked,
}

/// Travel limits in output-shaft degrees, symmetric around zero
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionLimits {
    /// Moves ending beyond this are rejected
    pub hard_limit_deg: f32,
    /// Moves ending beyond this raise a warning
    pub soft_limit_deg: f32,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            hard_limit_deg: 720.0,
            soft_limit_deg: 630.0,
        }
    }
}

impl MotionLimits {
    /// Largest position magnitude, in steps, that is still plausible
    pub fn max_travel_steps(&self, axis: &AxisConfig) -> u32 {
        axis.degrees_to_steps(self.hard_limit_deg)
    }

    /// Validate a requested distance and clamp it to the hard limit
    pub fn clamp_distance(&self, degrees: f32) -> Result<f32, MoveError> {
        if !degrees.is_finite() || degrees <= 0.0 {
            return Err(MoveError::InvalidDistance);
        }
        Ok(degrees.min(self.hard_limit_deg))
    }

    /// Check where a move of `steps` in `direction` from `position` ends
    pub fn check(
        &self,
        axis: &AxisConfig,
        position: i32,
        direction: Direction,
        steps: u32,
    ) -> Result<LimitCheck, MoveError> {
        let predicted = position as i64 + direction.sign() as i64 * steps as i64;
        let predicted_deg = predicted as f32 / axis.steps_per_output_rev() as f32 * 360.0;
        let magnitude = if predicted_deg < 0.0 {
            -predicted_deg
        } else {
            predicted_deg
        };

        if magnitude > self.hard_limit_deg {
            Err(MoveError::HardLimit)
        } else if magnitude > self.soft_limit_deg {
            Ok(LimitCheck::SoftLimitWarning)
        } else {
            Ok(LimitCheck::Clear)
        }
    }
}
