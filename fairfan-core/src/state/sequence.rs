//! Synchronized sequence
//!
//! The main axis sweeps between zero and its maximum travel. Near each end
//! of a sweep the oscillation axis is started on a half stroke, so the two
//! motions overlap around every main-axis reversal.

use crate::motion::{AxisConfig, AxisId, AxisSnapshot, ProfileConfig};
use crate::traits::Direction;

use super::command::{commands, push, Command, Commands, MoveRequest};

/// Sequence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequenceError {
    /// The oscillation axis has no measured range yet
    NotHomed,
}

/// Sequence phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SequencePhase {
    Idle,
    /// Main axis running toward its maximum
    Advancing,
    /// Main axis running back to zero
    Returning,
}

/// Sequence geometry, in main-axis and oscillation-axis steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceConfig {
    /// Main axis sweep length
    pub travel_steps: u32,
    /// Main-axis position that marks the returning stroke
    pub low_trigger_steps: u32,
    /// Main-axis position that starts the advancing stroke
    pub high_trigger_steps: u32,
    /// Clearance subtracted from the usable range before halving it
    pub stroke_margin_steps: u32,
    /// Oscillation direction for the stroke started while advancing
    pub advance_direction: Direction,
}

impl SequenceConfig {
    /// Build the geometry from angles on the main axis
    pub fn from_degrees(main: &AxisConfig, travel_deg: f32, trigger_offset_deg: f32) -> Self {
        let offset = trigger_offset_deg.clamp(0.0, travel_deg.max(0.0));
        Self {
            travel_steps: main.degrees_to_steps(travel_deg),
            low_trigger_steps: main.degrees_to_steps(offset),
            high_trigger_steps: main.degrees_to_steps(travel_deg - offset),
            stroke_margin_steps: 50,
            advance_direction: Direction::Clockwise,
        }
    }

    pub fn high_trigger(&self) -> i32 {
        self.high_trigger_steps.min(i32::MAX as u32) as i32
    }

    pub fn low_trigger(&self) -> i32 {
        self.low_trigger_steps.min(i32::MAX as u32) as i32
    }

    /// Oscillation half stroke for a homed `usable_range`
    pub fn half_stroke(&self, usable_range: u32) -> u32 {
        usable_range.saturating_sub(self.stroke_margin_steps) / 2
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self::from_degrees(&AxisConfig::MAIN, 720.0, 60.0)
    }
}

/// Oscillation speed multiplier that fits one half stroke into the time the
/// main axis needs to cross both trigger zones
///
/// Ramp zones are integrated at the mean of the floor and full speed.
pub fn sync_speed_multiplier(
    main: &AxisConfig,
    main_profile: &ProfileConfig,
    trigger_offset_deg: f32,
    oscillation: &AxisConfig,
    oscillation_profile: &ProfileConfig,
    half_stroke_deg: f32,
) -> f32 {
    let overlap = 2.0 * trigger_offset_deg;
    let accel = 360.0 * main_profile.accel_zone;
    let decel = 360.0 * main_profile.decel_zone;
    let cruise = (overlap - accel - decel).max(0.0);
    let main_rps = main.target_rpm / 60.0;
    let main_ramp = (main_profile.min_speed + 1.0) / 2.0;
    if main_rps <= 0.0 || main_ramp <= 0.0 {
        return 1.0;
    }

    let main_seconds =
        ((accel + decel) / 360.0) / (main_rps * main_ramp) + (cruise / 360.0) / main_rps;
    if main_seconds <= 0.0 {
        return 1.0;
    }

    let osc_zones = 360.0 * (oscillation_profile.accel_zone + oscillation_profile.decel_zone);
    let osc_cruise = (half_stroke_deg - osc_zones).max(0.0);
    let osc_ramp = (oscillation_profile.min_speed + 1.0) / 2.0;
    let required_rpm =
        (osc_zones / (360.0 * osc_ramp) + osc_cruise / 360.0) / (main_seconds / 60.0);

    if oscillation.target_rpm <= 0.0 {
        return 1.0;
    }
    required_rpm / oscillation.target_rpm
}

/// Inputs sampled once per control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceInputs {
    pub main: AxisSnapshot,
    pub oscillation: AxisSnapshot,
}

/// Main/oscillation sequence
#[derive(Debug, Clone)]
pub struct SequenceMachine {
    config: SequenceConfig,
    phase: SequencePhase,
    half_stroke: u32,
    high_fired: bool,
    low_fired: bool,
}

impl SequenceMachine {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            phase: SequencePhase::Idle,
            half_stroke: 0,
            high_fired: false,
            low_fired: false,
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn phase(&self) -> SequencePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != SequencePhase::Idle
    }

    /// Oscillation steps per stroke of the running sequence
    pub fn half_stroke(&self) -> u32 {
        self.half_stroke
    }

    /// Start sweeping
    ///
    /// `usable_range` is the oscillation range from the last homing cycle,
    /// `None` if the axis is not homed. Restarting a running sequence
    /// begins a fresh advance from the current main-axis position.
    pub fn start(
        &mut self,
        usable_range: Option<u32>,
        main: AxisSnapshot,
        oscillation_multiplier: f32,
    ) -> Result<Commands, SequenceError> {
        let usable = usable_range.ok_or(SequenceError::NotHomed)?;

        self.half_stroke = self.config.half_stroke(usable);
        self.high_fired = false;
        self.low_fired = false;
        self.phase = SequencePhase::Advancing;

        Ok(commands([
            Command::SetSpeedMultiplier {
                axis: AxisId::Oscillation,
                multiplier: oscillation_multiplier,
            },
            self.advance(main.position),
        ]))
    }

    /// Stop the sequence and both axes
    pub fn stop(&mut self) -> Commands {
        if !self.is_active() {
            return Commands::new();
        }
        self.reset();
        commands([
            Command::Stop(AxisId::Main),
            Command::Stop(AxisId::Oscillation),
        ])
    }

    /// Stop the sequence and let both axes finish their current moves
    pub fn stop_without_motors(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.phase = SequencePhase::Idle;
        self.high_fired = false;
        self.low_fired = false;
    }

    fn advance(&self, position: i32) -> Command {
        let span = self.config.travel_steps as i64 - position as i64;
        let steps = span.clamp(0, u32::MAX as i64) as u32;
        Command::Move {
            axis: AxisId::Main,
            request: MoveRequest::ramped(Direction::Clockwise, steps),
        }
    }

    fn retreat(&self, position: i32) -> Command {
        Command::Move {
            axis: AxisId::Main,
            request: MoveRequest::ramped(
                Direction::toward_zero(position),
                position.unsigned_abs(),
            ),
        }
    }

    fn stroke(&self, direction: Direction) -> Command {
        Command::Move {
            axis: AxisId::Oscillation,
            request: MoveRequest::stroke(direction, self.half_stroke),
        }
    }

    /// Advance the sequence by one control cycle
    pub fn poll(&mut self, inputs: SequenceInputs) -> Commands {
        let mut out = Commands::new();
        let main = inputs.main;
        let forward = self.config.advance_direction;

        match self.phase {
            SequencePhase::Idle => {}
            SequencePhase::Advancing => {
                if !self.high_fired
                    && inputs.oscillation.is_idle()
                    && main.position >= self.config.high_trigger()
                {
                    self.high_fired = true;
                    push(&mut out, self.stroke(forward));
                }
                if main.is_move_complete() {
                    push(&mut out, self.retreat(main.position));
                    self.phase = SequencePhase::Returning;
                    self.low_fired = false;
                }
            }
            SequencePhase::Returning => {
                if !self.low_fired
                    && inputs.oscillation.is_idle()
                    && main.position <= self.config.low_trigger()
                {
                    self.low_fired = true;
                    push(&mut out, self.stroke(forward.opposite()));
                }
                if main.is_move_complete() {
                    push(&mut out, self.advance(main.position));
                    self.phase = SequencePhase::Advancing;
                    self.high_fired = false;
                    self.low_fired = false;
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SequenceMachine {
        SequenceMachine::new(SequenceConfig::from_degrees(&AxisConfig::MAIN, 720.0, 40.0))
    }

    fn moving(position: i32, total: u32) -> AxisSnapshot {
        AxisSnapshot {
            enabled: true,
            step_count: 0,
            total_steps: total,
            position,
            direction: Direction::Clockwise,
        }
    }

    fn done(position: i32, total: u32) -> AxisSnapshot {
        AxisSnapshot {
            enabled: false,
            step_count: total,
            total_steps: total,
            position,
            direction: Direction::Clockwise,
        }
    }

    fn oscillation_starts(cmds: &Commands) -> usize {
        cmds.iter()
            .filter(|c| matches!(c, Command::Move { axis: AxisId::Oscillation, .. }))
            .count()
    }

    #[test]
    fn test_start_requires_homing() {
        let mut seq = machine();
        let result = seq.start(None, AxisSnapshot::idle_at(0), 1.0);
        assert_eq!(result, Err(SequenceError::NotHomed));
        assert_eq!(seq.phase(), SequencePhase::Idle);
    }

    #[test]
    fn test_start_moves_to_max() {
        let mut seq = machine();
        let cmds = seq.start(Some(4800), AxisSnapshot::idle_at(0), 2.0).unwrap();
        assert_eq!(seq.phase(), SequencePhase::Advancing);
        assert_eq!(seq.half_stroke(), 2375);
        assert_eq!(
            cmds[0],
            Command::SetSpeedMultiplier {
                axis: AxisId::Oscillation,
                multiplier: 2.0
            }
        );
        assert_eq!(
            cmds[1],
            Command::Move {
                axis: AxisId::Main,
                request: MoveRequest::ramped(Direction::Clockwise, 64_000),
            }
        );
    }

    #[test]
    fn test_high_trigger_fires_once() {
        let main = AxisConfig::MAIN;
        let mut seq = machine();
        seq.start(Some(4800), AxisSnapshot::idle_at(0), 1.0).unwrap();
        let idle = AxisSnapshot::idle_at(0);

        let before = main.degrees_to_steps(679.0) as i32;
        let cmds = seq.poll(SequenceInputs { main: moving(before, 64_000), oscillation: idle });
        assert_eq!(oscillation_starts(&cmds), 0);

        let at = main.degrees_to_steps(680.0) as i32;
        let cmds = seq.poll(SequenceInputs { main: moving(at, 64_000), oscillation: idle });
        assert_eq!(oscillation_starts(&cmds), 1);
        assert_eq!(
            cmds[0],
            Command::Move {
                axis: AxisId::Oscillation,
                request: MoveRequest::stroke(Direction::Clockwise, 2375),
            }
        );

        // Oscillation already finished its stroke, still no restart
        let past = main.degrees_to_steps(681.0) as i32;
        let cmds = seq.poll(SequenceInputs { main: moving(past, 64_000), oscillation: idle });
        assert_eq!(oscillation_starts(&cmds), 0);
    }

    #[test]
    fn test_trigger_waits_for_idle_oscillation() {
        let mut seq = machine();
        seq.start(Some(4800), AxisSnapshot::idle_at(0), 1.0).unwrap();
        let high = seq.config().high_trigger();

        let busy = moving(-100, 500);
        let cmds = seq.poll(SequenceInputs { main: moving(high, 64_000), oscillation: busy });
        assert!(cmds.is_empty());

        let cmds = seq.poll(SequenceInputs {
            main: moving(high + 10, 64_000),
            oscillation: AxisSnapshot::idle_at(-100),
        });
        assert_eq!(oscillation_starts(&cmds), 1);
    }

    #[test]
    fn test_reverses_and_returns() {
        let mut seq = machine();
        seq.start(Some(4800), AxisSnapshot::idle_at(0), 1.0).unwrap();
        let idle = AxisSnapshot::idle_at(0);

        let cmds = seq.poll(SequenceInputs { main: done(64_000, 64_000), oscillation: idle });
        assert_eq!(seq.phase(), SequencePhase::Returning);
        // Trigger and reversal land in the same cycle
        assert_eq!(oscillation_starts(&cmds), 1);
        assert_eq!(
            cmds[1],
            Command::Move {
                axis: AxisId::Main,
                request: MoveRequest::ramped(Direction::CounterClockwise, 64_000),
            }
        );

        let low = seq.config().low_trigger();
        let cmds = seq.poll(SequenceInputs { main: moving(low + 1, 64_000), oscillation: idle });
        assert!(cmds.is_empty());
        let cmds = seq.poll(SequenceInputs { main: moving(low, 64_000), oscillation: idle });
        assert_eq!(
            cmds[0],
            Command::Move {
                axis: AxisId::Oscillation,
                request: MoveRequest::stroke(Direction::CounterClockwise, 2375),
            }
        );
        let cmds = seq.poll(SequenceInputs { main: moving(low - 1, 64_000), oscillation: idle });
        assert!(cmds.is_empty());

        let cmds = seq.poll(SequenceInputs { main: done(0, 64_000), oscillation: idle });
        assert_eq!(seq.phase(), SequencePhase::Advancing);
        assert_eq!(
            cmds[0],
            Command::Move {
                axis: AxisId::Main,
                request: MoveRequest::ramped(Direction::Clockwise, 64_000),
            }
        );
    }

    #[test]
    fn test_stop_variants() {
        let mut seq = machine();
        assert!(seq.stop().is_empty());

        seq.start(Some(4800), AxisSnapshot::idle_at(0), 1.0).unwrap();
        let cmds = seq.stop();
        assert_eq!(cmds.len(), 2);
        assert!(!seq.is_active());

        let mut seq = machine();
        seq.start(Some(4800), AxisSnapshot::idle_at(0), 1.0).unwrap();
        seq.stop_without_motors();
        assert!(!seq.is_active());
        let idle = AxisSnapshot::idle_at(0);
        assert!(seq
            .poll(SequenceInputs { main: done(64_000, 64_000), oscillation: idle })
            .is_empty());
    }

    #[test]
    fn test_sync_speed_multiplier_defaults() {
        let factor = sync_speed_multiplier(
            &AxisConfig::MAIN,
            &ProfileConfig::MAIN,
            60.0,
            &AxisConfig::OSCILLATION,
            &ProfileConfig::OSCILLATION,
            12.5,
        );
        assert!(libm::fabsf(factor - 2.19) < 0.01, "factor = {}", factor);
    }
}
