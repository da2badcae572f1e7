//! Hardware abstraction traits
//!
//! The core only talks to hardware through these seams; drivers in
//! `fairfan-drivers` provide the implementations.

pub mod stepper;
pub mod storage;

pub use stepper::Direction;
pub use storage::{NvError, NvMemory};
