//! Homing state machine for the oscillation axis
//!
//! ```text
//! Idle -> SeekFirst -> OffsetFirst -> SeekSecond -> OffsetSecond -> Complete -> Idle
//! ```
//!
//! Each seek runs the axis toward its switch with an effectively unbounded
//! step count. A seek that never reaches its switch never progresses; there
//! is no timeout here, the operator or a watchdog has to cancel it.

use crate::motion::{AxisId, AxisSnapshot, SEEK_STEPS};
use crate::traits::Direction;

use super::command::{commands, Command, Commands, MoveRequest};

/// Homing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingConfig {
    /// Safety distance kept from each switch, in steps
    pub offset_steps: u32,
    /// Pause after a switch contact before backing off
    pub settle_ms: u32,
    /// Direction that runs toward the first switch
    pub first_direction: Direction,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            // 0.5° on the 50:1 oscillation axis
            offset_steps: 111,
            settle_ms: 500,
            first_direction: Direction::Clockwise,
        }
    }
}

/// Progress inside a seek state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SeekPhase {
    /// Waiting for the axis to stop before the seek begins
    Pending,
    /// Switch was already pressed; moving off it first
    BackingOff,
    /// Running toward the switch
    Seeking,
    /// Switch hit; waiting for the mechanics to settle
    Settling { since_ms: u32 },
}

/// Homing states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingState {
    Idle,
    SeekFirst(SeekPhase),
    OffsetFirst,
    SeekSecond(SeekPhase),
    OffsetSecond,
    Complete,
}

/// Inputs sampled once per control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingInputs {
    pub axis: AxisSnapshot,
    pub first_pressed: bool,
    pub second_pressed: bool,
    pub now_ms: u32,
}

/// Events driving the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingEvent {
    Start,
    Cancel,
    Poll(HomingInputs),
}

/// Oscillation axis homing
#[derive(Debug, Clone)]
pub struct HomingMachine {
    config: HomingConfig,
    state: HomingState,
    offset_travelled: u32,
    measured_range: u32,
    usable_range: u32,
    homed: bool,
}

impl HomingMachine {
    pub fn new(config: HomingConfig) -> Self {
        Self {
            config,
            state: HomingState::Idle,
            offset_travelled: 0,
            measured_range: 0,
            usable_range: 0,
            homed: false,
        }
    }

    pub fn state(&self) -> HomingState {
        self.state
    }

    pub fn config(&self) -> &HomingConfig {
        &self.config
    }

    pub fn is_idle(&self) -> bool {
        self.state == HomingState::Idle
    }

    /// True once a cycle has finished and until the next one starts
    pub fn is_homing_complete(&self) -> bool {
        self.homed
    }

    /// Mark the range as unknown (axis moved by hand, soft stop cancelled)
    pub fn invalidate(&mut self) {
        self.homed = false;
    }

    /// Switch-to-switch distance from the last cycle
    pub fn measured_range(&self) -> Option<u32> {
        self.homed.then_some(self.measured_range)
    }

    /// Travel between the two offset points from the last cycle
    pub fn usable_range(&self) -> Option<u32> {
        self.homed.then_some(self.usable_range)
    }

    pub fn start(&mut self) -> Commands {
        self.handle(HomingEvent::Start)
    }

    pub fn cancel(&mut self) -> Commands {
        self.handle(HomingEvent::Cancel)
    }

    pub fn poll(&mut self, inputs: HomingInputs) -> Commands {
        self.handle(HomingEvent::Poll(inputs))
    }

    fn first(&self) -> Direction {
        self.config.first_direction
    }

    fn second(&self) -> Direction {
        self.config.first_direction.opposite()
    }

    fn seek(direction: Direction) -> Command {
        Command::Move {
            axis: AxisId::Oscillation,
            request: MoveRequest::constant(direction, SEEK_STEPS),
        }
    }

    fn offset(&self, direction: Direction) -> Command {
        Command::Move {
            axis: AxisId::Oscillation,
            request: MoveRequest::constant(direction, self.config.offset_steps),
        }
    }

    fn settled(&self, since_ms: u32, now_ms: u32) -> bool {
        now_ms.wrapping_sub(since_ms) >= self.config.settle_ms
    }

    /// Apply one event
    pub fn handle(&mut self, event: HomingEvent) -> Commands {
        use HomingEvent::*;
        use HomingState::*;
        use SeekPhase::*;

        let stop = Command::Stop(AxisId::Oscillation);

        let (next, out) = match (self.state, event) {
            (_, Start) => {
                self.homed = false;
                self.offset_travelled = 0;
                self.measured_range = 0;
                self.usable_range = 0;
                (SeekFirst(Pending), commands([stop]))
            }
            (Idle, Cancel) => (Idle, Commands::new()),
            (_, Cancel) => (Idle, commands([stop])),

            (Idle, Poll(_)) => (Idle, Commands::new()),

            // First switch
            (SeekFirst(Pending), Poll(i)) if i.axis.is_idle() => {
                if i.first_pressed {
                    (SeekFirst(BackingOff), commands([self.offset(self.second())]))
                } else {
                    (SeekFirst(Seeking), commands([Self::seek(self.first())]))
                }
            }
            (SeekFirst(BackingOff), Poll(i)) if i.axis.is_idle() => {
                (SeekFirst(Seeking), commands([Self::seek(self.first())]))
            }
            (SeekFirst(Seeking), Poll(i)) if i.first_pressed => (
                SeekFirst(Settling { since_ms: i.now_ms }),
                commands([stop]),
            ),
            (SeekFirst(Seeking), Poll(i)) if i.axis.is_idle() => {
                (SeekFirst(Seeking), commands([Self::seek(self.first())]))
            }
            (SeekFirst(Settling { since_ms }), Poll(i)) if self.settled(since_ms, i.now_ms) => {
                (OffsetFirst, commands([self.offset(self.second())]))
            }
            (OffsetFirst, Poll(i)) if i.axis.is_move_complete() => {
                self.offset_travelled = i.axis.step_count;
                if i.second_pressed {
                    (SeekSecond(BackingOff), commands([self.offset(self.first())]))
                } else {
                    (SeekSecond(Seeking), commands([Self::seek(self.second())]))
                }
            }

            // Second switch
            (SeekSecond(BackingOff), Poll(i)) if i.axis.is_idle() => {
                // The back-off undid part of the first offset
                self.offset_travelled = self.offset_travelled.saturating_sub(i.axis.step_count);
                (SeekSecond(Seeking), commands([Self::seek(self.second())]))
            }
            (SeekSecond(Seeking), Poll(i)) if i.second_pressed => {
                self.measured_range = self.offset_travelled.saturating_add(i.axis.step_count);
                (
                    SeekSecond(Settling { since_ms: i.now_ms }),
                    commands([stop]),
                )
            }
            (SeekSecond(Seeking), Poll(i)) if i.axis.is_idle() => {
                (SeekSecond(Seeking), commands([Self::seek(self.second())]))
            }
            (SeekSecond(Settling { since_ms }), Poll(i)) if self.settled(since_ms, i.now_ms) => {
                (OffsetSecond, commands([self.offset(self.first())]))
            }
            (OffsetSecond, Poll(i)) if i.axis.is_move_complete() => {
                self.usable_range = self
                    .measured_range
                    .saturating_sub(2 * self.config.offset_steps);
                self.homed = true;
                // Zero sits at the offset point next to the first switch
                let position = self.usable_range.min(i32::MAX as u32) as i32
                    * self.second().sign();
                (
                    Complete,
                    commands([Command::SetPosition {
                        axis: AxisId::Oscillation,
                        position,
                    }]),
                )
            }
            (Complete, Poll(_)) => (Idle, Commands::new()),

            (state, Poll(_)) => (state, Commands::new()),
        };

        self.state = next;
        out
    }
}
