//! Board-agnostic core logic for the FairFan controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware:
//!
//! - Per-axis step engine and speed profile
//! - Crash-safe dual-slot position store and boot recovery
//! - Homing, sequence and soft-stop state machines
//! - The controller that owns both axes and executes machine commands
//! - Configuration types and the `machine.toml` parser

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod controller;
pub mod motion;
pub mod persist;
pub mod state;
pub mod traits;
