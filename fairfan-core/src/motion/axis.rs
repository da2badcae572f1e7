//! Step engine for one stepper axis
//!
//! An [`Axis`] is shared between two contexts:
//!
//! - the pulse timer, which calls [`Axis::tick`] at twice the step rate and
//!   is the only writer of the step count and position while a move runs
//! - the control loop, which publishes moves with [`Axis::begin_move`],
//!   disables the axis and reads the counters
//!
//! Every shared field is an atomic. A move's direction and total are
//! stored before `enabled` is published with `Release`, and the pulse
//! timer loads `enabled` with `Acquire`, so a tick never sees a half
//! configured move.

use libm::fabsf;
use portable_atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::traits::Direction;

/// Lowest allowed speed multiplier
pub const MIN_SPEED_MULTIPLIER: f32 = 0.1;

/// Highest allowed speed multiplier
pub const MAX_SPEED_MULTIPLIER: f32 = 10.0;

/// Total used for "run until a switch stops us" moves
pub const SEEK_STEPS: u32 = u32::MAX;

/// Bit pattern of `1.0f32`
const F32_ONE_BITS: u32 = 0x3F80_0000;

/// Axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisId {
    /// Main axis (turns the fan body, position is persisted)
    Main,
    /// Oscillation axis (swings between two limit switches)
    Oscillation,
}

/// Mechanical constants of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisConfig {
    /// Full steps per motor revolution (200 for 1.8° motors)
    pub steps_per_rev: u16,
    /// Driver microstep factor
    pub microsteps: u8,
    /// Gear reduction between motor and output shaft
    pub gear_ratio: u8,
    /// Output shaft speed at a multiplier of 1.0
    pub target_rpm: f32,
}

impl AxisConfig {
    /// Main axis: 200 steps, 1/8 microstepping, 20:1, 4 rpm
    pub const MAIN: Self = Self {
        steps_per_rev: 200,
        microsteps: 8,
        gear_ratio: 20,
        target_rpm: 4.0,
    };

    /// Oscillation axis: 200 steps, 1/8 microstepping, 50:1, 0.8 rpm
    pub const OSCILLATION: Self = Self {
        steps_per_rev: 200,
        microsteps: 8,
        gear_ratio: 50,
        target_rpm: 0.8,
    };

    /// Microsteps per revolution of the output shaft
    pub fn steps_per_output_rev(&self) -> u32 {
        self.gear_ratio as u32 * self.steps_per_rev as u32 * self.microsteps as u32
    }

    /// Step frequency at the target speed, in Hz
    pub fn step_frequency_hz(&self) -> f32 {
        let motor_rpm = self.target_rpm * self.gear_ratio as f32;
        (motor_rpm / 60.0) * self.steps_per_rev as f32 * self.microsteps as f32
    }

    /// Convert an output-shaft angle into a step count (truncating)
    pub fn degrees_to_steps(&self, degrees: f32) -> u32 {
        ((fabsf(degrees) / 360.0) * self.steps_per_output_rev() as f32) as u32
    }

    /// Convert a signed step count into an output-shaft angle
    pub fn steps_to_degrees(&self, steps: i32) -> f32 {
        (steps as f32 / self.steps_per_output_rev() as f32) * 360.0
    }

    /// Angle covered by one microstep
    pub fn degrees_per_step(&self) -> f32 {
        360.0 / self.steps_per_output_rev() as f32
    }
}

/// Line change requested by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// Nothing to do, the line is already low
    Idle,
    /// Drive the step line high
    High,
    /// Drive the step line low
    Low,
}

/// Point-in-time copy of the shared axis fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSnapshot {
    pub enabled: bool,
    pub step_count: u32,
    pub total_steps: u32,
    pub position: i32,
    pub direction: Direction,
}

impl AxisSnapshot {
    /// Snapshot of a disabled axis at `position`
    pub fn idle_at(position: i32) -> Self {
        Self {
            enabled: false,
            step_count: 0,
            total_steps: 0,
            position,
            direction: Direction::Clockwise,
        }
    }

    /// Axis is not emitting pulses
    pub fn is_idle(&self) -> bool {
        !self.enabled
    }

    /// Axis stopped because its move ran to the end
    pub fn is_move_complete(&self) -> bool {
        !self.enabled && self.step_count >= self.total_steps
    }
}

/// One stepper axis
pub struct Axis {
    id: AxisId,
    config: AxisConfig,
    step_count: AtomicU32,
    total_steps: AtomicU32,
    position: AtomicI32,
    enabled: AtomicBool,
    clockwise: AtomicBool,
    direction_changed: AtomicBool,
    pulse_high: AtomicBool,
    /// Line still high from a pulse already credited by `begin_move`
    release_pending: AtomicBool,
    position_changed: AtomicBool,
    /// f32 bits, clamped to the multiplier range
    speed_multiplier: AtomicU32,
    /// f32 bits, written from the speed profile each control cycle
    profile_factor: AtomicU32,
}

impl Axis {
    /// Create an idle axis
    pub const fn new(id: AxisId, config: AxisConfig) -> Self {
        Self {
            id,
            config,
            step_count: AtomicU32::new(0),
            total_steps: AtomicU32::new(0),
            position: AtomicI32::new(0),
            enabled: AtomicBool::new(false),
            clockwise: AtomicBool::new(true),
            direction_changed: AtomicBool::new(false),
            pulse_high: AtomicBool::new(false),
            release_pending: AtomicBool::new(false),
            position_changed: AtomicBool::new(false),
            speed_multiplier: AtomicU32::new(F32_ONE_BITS),
            profile_factor: AtomicU32::new(F32_ONE_BITS),
        }
    }

    /// Reset the output state: disabled, line low, clockwise
    pub fn init(&self) {
        self.enabled.store(false, Ordering::Release);
        self.pulse_high.store(false, Ordering::Relaxed);
        self.release_pending.store(false, Ordering::Relaxed);
        self.clockwise.store(true, Ordering::Relaxed);
        self.direction_changed.store(true, Ordering::Release);
    }

    pub fn id(&self) -> AxisId {
        self.id
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    /// Advance the pulse generator by one half period
    ///
    /// Called from the pulse timer. Only the falling half of a pulse counts
    /// as a step; it moves the position by one in the current direction.
    /// The axis disables itself once the step count reaches the total.
    pub fn tick(&self) -> StepOutcome {
        if !self.enabled.load(Ordering::Acquire) {
            return self.release_line();
        }
        if self.release_pending.swap(false, Ordering::Relaxed) {
            return StepOutcome::Low;
        }

        let count = self.step_count.load(Ordering::Relaxed);
        let total = self.total_steps.load(Ordering::Relaxed);
        if count >= total {
            self.enabled.store(false, Ordering::Release);
            return self.release_line();
        }

        let high = !self.pulse_high.load(Ordering::Relaxed);
        self.pulse_high.store(high, Ordering::Relaxed);
        if high {
            return StepOutcome::High;
        }

        let count = count + 1;
        self.step_count.store(count, Ordering::Release);
        let delta = if self.clockwise.load(Ordering::Relaxed) { 1 } else { -1 };
        let position = self.position.load(Ordering::Relaxed).wrapping_add(delta);
        self.position.store(position, Ordering::Release);
        self.position_changed.store(true, Ordering::Release);

        if count >= total {
            self.enabled.store(false, Ordering::Release);
        }
        StepOutcome::Low
    }

    fn release_line(&self) -> StepOutcome {
        let high = self.pulse_high.swap(false, Ordering::Relaxed);
        if self.release_pending.swap(false, Ordering::Relaxed) || high {
            StepOutcome::Low
        } else {
            StepOutcome::Idle
        }
    }

    /// Set the direction for the next pulses
    ///
    /// Returns true if the direction actually changed.
    pub fn set_direction(&self, direction: Direction) -> bool {
        let clockwise = direction == Direction::Clockwise;
        let previous = self.clockwise.swap(clockwise, Ordering::AcqRel);
        if previous != clockwise {
            self.direction_changed.store(true, Ordering::Release);
        }
        previous != clockwise
    }

    pub fn direction(&self) -> Direction {
        if self.clockwise.load(Ordering::Acquire) {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }
    }

    /// Consume the "direction line needs updating" flag
    pub fn take_direction_change(&self) -> bool {
        self.direction_changed.swap(false, Ordering::AcqRel)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop emitting pulses from the next tick on
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn reset_step_count(&self) {
        self.step_count.store(0, Ordering::Release);
    }

    pub fn set_total_steps(&self, total: u32) {
        self.total_steps.store(total, Ordering::Release);
    }

    /// Publish a new move
    ///
    /// The axis is disabled while the parameters are rewritten and enabled
    /// last, so the pulse timer only ever sees a complete move. A pulse of
    /// the previous move that is still high is credited in the old
    /// direction; the next tick only drops the line.
    pub fn begin_move(&self, direction: Direction, total_steps: u32) {
        self.enabled.store(false, Ordering::Release);
        if self.pulse_high.swap(false, Ordering::Relaxed) {
            let delta = if self.clockwise.load(Ordering::Relaxed) { 1 } else { -1 };
            let position = self.position.load(Ordering::Relaxed).wrapping_add(delta);
            self.position.store(position, Ordering::Release);
            self.position_changed.store(true, Ordering::Release);
            self.release_pending.store(true, Ordering::Relaxed);
        }
        self.set_direction(direction);
        self.set_total_steps(total_steps);
        self.reset_step_count();
        self.enabled.store(true, Ordering::Release);
    }

    pub fn step_count(&self) -> u32 {
        self.step_count.load(Ordering::Acquire)
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps.load(Ordering::Acquire)
    }

    pub fn position(&self) -> i32 {
        self.position.load(Ordering::Acquire)
    }

    /// Overwrite the position (zeroing, recovery, homing)
    ///
    /// Only valid while the axis is disabled.
    pub fn set_position(&self, position: i32) {
        self.position.store(position, Ordering::Release);
        self.position_changed.store(true, Ordering::Release);
    }

    /// Position in output-shaft degrees
    pub fn position_degrees(&self) -> f32 {
        self.config.steps_to_degrees(self.position())
    }

    /// Consume the "position changed" flag
    pub fn take_position_changed(&self) -> bool {
        self.position_changed.swap(false, Ordering::AcqRel)
    }

    /// Copy the shared fields
    pub fn snapshot(&self) -> AxisSnapshot {
        AxisSnapshot {
            enabled: self.is_enabled(),
            step_count: self.step_count(),
            total_steps: self.total_steps(),
            position: self.position(),
            direction: self.direction(),
        }
    }

    /// Set the speed multiplier, clamped to 0.1x..10x
    pub fn set_speed_multiplier(&self, multiplier: f32) {
        let clamped = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER)
        };
        self.speed_multiplier
            .store(clamped.to_bits(), Ordering::Release);
    }

    pub fn speed_multiplier(&self) -> f32 {
        f32::from_bits(self.speed_multiplier.load(Ordering::Acquire))
    }

    /// Set the ramp factor from the speed profile (0 < factor <= 1)
    pub fn set_profile_factor(&self, factor: f32) {
        let factor = if factor > 0.0 { factor.min(1.0) } else { 1.0 };
        self.profile_factor.store(factor.to_bits(), Ordering::Release);
    }

    pub fn profile_factor(&self) -> f32 {
        f32::from_bits(self.profile_factor.load(Ordering::Acquire))
    }

    /// Pulse half-period in microseconds at the current speed
    ///
    /// The pulse timer fires twice per step, so the half-period is
    /// 500 000 / (step frequency × multiplier × ramp factor).
    pub fn pulse_period_us(&self) -> u32 {
        let rate =
            self.config.step_frequency_hz() * self.speed_multiplier() * self.profile_factor();
        if rate <= 0.0 {
            return u32::MAX;
        }
        let period = 500_000.0 / rate;
        if period >= u32::MAX as f32 {
            u32::MAX
        } else {
            (period as u32).max(1)
        }
    }
}
