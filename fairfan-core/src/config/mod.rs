//! Configuration
//!
//! Machine configuration types, the built-in speed presets and the
//! `machine.toml` parser.

pub mod presets;
pub mod toml;
pub mod types;

pub use presets::{AxisPreset, SpeedPreset};
pub use toml::{parse_config, ParseError};
pub use types::*;
