//! FairFan Hardware Abstraction Layer
//!
//! This crate defines the small set of hardware traits the drivers need:
//! digital pins for step/direction outputs and limit-switch inputs, and an
//! I2C master for the position FRAM. Chip-specific crates implement them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  fairfan-firmware                       │
//! └─────────────────────────────────────────┘
//!          │                     │
//!          ▼                     ▼
//! ┌──────────────────┐   ┌──────────────────┐
//! │ fairfan-drivers  │   │ fairfan-hal-     │
//! │ (FRAM, switches) │   │    rp2040        │
//! └──────────────────┘   └──────────────────┘
//!          │                     │
//!          └──────────┬──────────┘
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  fairfan-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`i2c::I2cBus`] - I2C bus operations

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod i2c;

pub use gpio::{InputPin, OutputPin};
pub use i2c::{I2cBus, I2cConfig};
