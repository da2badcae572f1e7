//! RP2040-specific HAL for the FairFan firmware
//!
//! This crate provides RP2040-specific implementations of the shared
//! `fairfan-hal` traits, plus RP2040-specific functionality:
//!
//! - GPIO allocation and conflict checks for the configured pins
//! - Dynamic pin allocation for config-driven setup
//! - Blocking I2C master for the position FRAM

#![no_std]

pub mod gpio;
pub mod i2c;
pub mod pins;

pub use gpio::{GpioAllocator, RpInput, RpOutput};
pub use i2c::{I2cBusError, RpI2c};
pub use pins::{FramBusPeripherals, PinBank, PinError};
