//! Controller reports

use heapless::Vec;

use crate::motion::{AxisId, LimitCheck, MoveError};
use crate::persist::{LoadOutcome, RecoveryAction, Slot, StoreError};
use crate::state::SequenceError;
use crate::traits::Direction;

/// Most events one control cycle can report
pub const MAX_EVENTS: usize = 8;

/// Events reported by one control cycle
pub type Events = Vec<ControllerEvent, MAX_EVENTS>;

/// Something worth telling the operator about
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerEvent {
    MoveStarted {
        axis: AxisId,
        direction: Direction,
        steps: u32,
    },
    /// Move ends between the soft and hard limits
    SoftLimitWarning { end_position: i32 },
    MoveRejected(MoveError),
    HomingStarted,
    HomingComplete { measured: u32, usable: u32 },
    SequenceStarted { multiplier: f32 },
    SequenceRejected(SequenceError),
    SoftStopComplete,
    /// Main axis finished the boot recovery move
    RecoveryComplete,
    PositionSaved { position: i32, slot: Slot },
    /// First failure of a run of failed saves
    SaveFailed(StoreError),
}

/// Accepted move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveOutcome {
    pub direction: Direction,
    pub steps: u32,
    pub check: LimitCheck,
}

/// Main axis position report
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionInfo {
    pub steps: i32,
    pub degrees: f32,
    pub soft_limit_deg: f32,
    pub hard_limit_deg: f32,
    pub moving: bool,
}

/// What happened at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    /// Store load result; an error means the device runs without persistence
    pub load: Result<LoadOutcome, StoreError>,
    pub recovery: Option<RecoveryAction>,
    /// Steps of the scheduled return-to-zero move
    pub recovery_steps: Option<u32>,
    /// Failed rewrite of a corrupt store; the bad record stays in place
    pub repair: Option<StoreError>,
    pub homing_scheduled: bool,
}
