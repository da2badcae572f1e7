//! FRAM drivers

pub mod mb85rc;

pub use mb85rc::{FramError, Mb85rc, DEFAULT_ADDRESS, MB85RC256_CAPACITY};
