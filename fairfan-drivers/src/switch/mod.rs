//! Limit switch inputs

pub mod limit;

pub use limit::{Debouncer, LimitSwitch};
