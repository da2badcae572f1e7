//! Soft stop
//!
//! Lets both axes finish their current moves, brings the main axis back to
//! zero and re-homes the oscillation axis. Nothing here stops an axis
//! abruptly.

use crate::motion::{AxisId, AxisSnapshot};
use crate::traits::Direction;

use super::command::{commands, push, Command, Commands, MoveRequest};

/// Soft stop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoftStopState {
    Idle,
    /// Both axes decelerating to the end of their current moves
    WaitingForStop,
    /// Main axis on its way back to zero
    MainReturningHome,
    /// Oscillation homing cycle running
    OscillationHoming,
}

/// Inputs sampled once per control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftStopInputs {
    pub main: AxisSnapshot,
    pub oscillation: AxisSnapshot,
    /// Oscillation homing machine is idle
    pub homing_idle: bool,
}

#[derive(Debug, Clone)]
pub struct SoftStopMachine {
    state: SoftStopState,
    home_tolerance: u32,
    main_handled: bool,
    oscillation_handled: bool,
}

impl SoftStopMachine {
    /// `home_tolerance` is the distance from zero, in main-axis steps, that
    /// still counts as home
    pub fn new(home_tolerance: u32) -> Self {
        Self {
            state: SoftStopState::Idle,
            home_tolerance,
            main_handled: false,
            oscillation_handled: false,
        }
    }

    pub fn state(&self) -> SoftStopState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SoftStopState::Idle
    }

    /// Begin a soft stop
    ///
    /// Whether the main axis needs a return move is decided once it comes
    /// to rest, from where it stopped.
    pub fn start(&mut self) {
        self.main_handled = false;
        self.oscillation_handled = false;
        self.state = SoftStopState::WaitingForStop;
    }

    /// Cancel without touching either axis
    pub fn stop(&mut self) {
        self.state = SoftStopState::Idle;
    }

    fn is_home(&self, position: i32) -> bool {
        position.unsigned_abs() < self.home_tolerance
    }

    /// Advance the soft stop by one control cycle
    pub fn poll(&mut self, inputs: SoftStopInputs) -> Commands {
        let mut out = Commands::new();

        match self.state {
            SoftStopState::Idle => {}
            SoftStopState::WaitingForStop => {
                let position = inputs.main.position;

                if !self.main_handled && inputs.main.is_idle() {
                    self.main_handled = true;
                    if !self.is_home(position) {
                        push(
                            &mut out,
                            Command::Move {
                                axis: AxisId::Main,
                                request: MoveRequest::ramped(
                                    Direction::toward_zero(position),
                                    position.unsigned_abs(),
                                ),
                            },
                        );
                    }
                }

                if !self.oscillation_handled && inputs.oscillation.is_idle() {
                    self.oscillation_handled = true;
                }

                if self.main_handled && self.oscillation_handled {
                    if self.is_home(position) {
                        push(&mut out, Command::StartHoming);
                        self.state = SoftStopState::OscillationHoming;
                    } else {
                        self.state = SoftStopState::MainReturningHome;
                    }
                }
            }
            SoftStopState::MainReturningHome => {
                if inputs.main.is_idle() {
                    out = commands([Command::StartHoming]);
                    self.state = SoftStopState::OscillationHoming;
                }
            }
            SoftStopState::OscillationHoming => {
                if inputs.homing_idle {
                    self.state = SoftStopState::Idle;
                }
            }
        }

        out
    }
}
