//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use fairfan_core::traits::Direction;

/// Channel capacity for operator commands
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Operator requests for the control task
///
/// Whatever front end the board carries (serial console, buttons, a
/// network bridge) feeds this channel.
#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum OperatorCommand {
    /// Move the main axis clockwise by the configured distance
    GoMain,
    MoveMain { direction: Direction, degrees: f32 },
    SetDistance(f32),
    StopMain,
    SetZero,
    ReturnHome,
    ReportPosition,
    StartHoming,
    StopOscillation,
    StartSequence,
    StopSequence,
    SoftStop,
    StopAll,
    StoreInfo,
    StoreClear,
    StoreFix,
    StoreWrite { address: u16, value: u8 },
    StoreRead { address: u16 },
    StoreDump { address: u16, len: u16 },
}

/// Operator commands (from whichever front end is attached)
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, OperatorCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Wakes the main-axis step task when a move was published
pub static MAIN_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Wakes the oscillation step task when a move was published
pub static OSCILLATION_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
