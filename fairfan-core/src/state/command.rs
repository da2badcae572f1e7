//! Commands returned by the state machines
//!
//! Machines never touch an axis. They return these values and the
//! controller executes them in order.

use heapless::Vec;

use crate::motion::AxisId;
use crate::traits::Direction;

/// Most commands a single transition can emit
pub const MAX_COMMANDS: usize = 4;

/// Commands emitted by one transition
pub type Commands = Vec<Command, MAX_COMMANDS>;

/// A bounded move on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveRequest {
    pub direction: Direction,
    pub steps: u32,
    /// Run the speed profile (false = constant speed)
    pub ramped: bool,
    /// Check travel limits before starting
    pub check_limits: bool,
    /// Refuse unless the oscillation range is homed
    pub needs_homing: bool,
}

impl MoveRequest {
    /// Ramped move without a limit check
    pub fn ramped(direction: Direction, steps: u32) -> Self {
        Self {
            direction,
            steps,
            ramped: true,
            check_limits: false,
            needs_homing: false,
        }
    }

    /// Constant-speed move without a limit check (homing)
    pub fn constant(direction: Direction, steps: u32) -> Self {
        Self {
            direction,
            steps,
            ramped: false,
            check_limits: false,
            needs_homing: false,
        }
    }

    /// Ramped oscillation stroke inside the homed range
    pub fn stroke(direction: Direction, steps: u32) -> Self {
        Self {
            needs_homing: true,
            ..Self::ramped(direction, steps)
        }
    }

    /// Ramped move that must stay inside the travel limits
    pub fn checked(direction: Direction, steps: u32) -> Self {
        Self {
            direction,
            steps,
            ramped: true,
            check_limits: true,
            needs_homing: false,
        }
    }
}

/// Side effect requested by a state machine
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Start a move
    Move { axis: AxisId, request: MoveRequest },
    /// Disable an axis immediately
    Stop(AxisId),
    /// Overwrite an axis position
    SetPosition { axis: AxisId, position: i32 },
    /// Set an axis speed multiplier
    SetSpeedMultiplier { axis: AxisId, multiplier: f32 },
    /// Begin a new homing cycle on the oscillation axis
    StartHoming,
}

/// Append a command
///
/// MAX_COMMANDS bounds every transition; overflowing it is a bug in the
/// calling machine.
pub(crate) fn push(out: &mut Commands, cmd: Command) {
    let pushed = out.push(cmd).is_ok();
    debug_assert!(pushed, "command list overflow");
}

/// Build a command list from a fixed set of commands
pub(crate) fn commands<const N: usize>(items: [Command; N]) -> Commands {
    let mut out = Commands::new();
    for item in items {
        push(&mut out, item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_keep_order() {
        let out = commands([Command::StartHoming, Command::Stop(AxisId::Main)]);
        assert_eq!(out.as_slice(), &[Command::StartHoming, Command::Stop(AxisId::Main)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "command list overflow")]
    fn test_overflow_is_caught() {
        let mut out = commands([Command::StartHoming; MAX_COMMANDS]);
        push(&mut out, Command::Stop(AxisId::Oscillation));
    }
}
