//! Motion
//!
//! Step generation, speed ramps and travel limits.

pub mod axis;
pub mod limits;
pub mod profile;

pub use axis::{
    Axis, AxisConfig, AxisId, AxisSnapshot, StepOutcome, MAX_SPEED_MULTIPLIER,
    MIN_SPEED_MULTIPLIER, SEEK_STEPS,
};
pub use limits::{LimitCheck, MotionLimits, MoveError};
pub use profile::{ProfileConfig, SpeedProfile};
