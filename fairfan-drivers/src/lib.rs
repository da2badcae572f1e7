//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in fairfan-core on top of the fairfan-hal pin and bus traits:
//!
//! - MB85RC I2C FRAM (position store backing memory)
//! - Debounced normally-closed limit switches
//! - Step/direction/enable outputs for the stepper drivers

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod fram;
pub mod stepper;
pub mod switch;
