//! State machines
//!
//! Homing, sequence and soft stop. Each machine maps its inputs to a list
//! of [`Command`]s and never drives an axis itself; the controller executes
//! the commands.

pub mod command;
pub mod homing;
pub mod sequence;
pub mod softstop;

pub use command::{Command, Commands, MoveRequest, MAX_COMMANDS};
pub use homing::{HomingConfig, HomingEvent, HomingInputs, HomingMachine, HomingState, SeekPhase};
pub use sequence::{
    sync_speed_multiplier, SequenceConfig, SequenceError, SequenceInputs, SequenceMachine,
    SequencePhase,
};
pub use softstop::{SoftStopInputs, SoftStopMachine, SoftStopState};
