//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod control;
pub mod step;

pub use control::{control_task, ControlParts, Fram};
pub use step::{step_task, StepTiming};
