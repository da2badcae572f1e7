//! Configuration loading
//!
//! The machine configuration is compiled in from `machine.toml` and parsed
//! at boot by the no_std parser in `fairfan-core`. `build.rs` has already
//! rejected malformed files, so a parse failure here means a value the host
//! check could not see; the firmware falls back to the built-in defaults.

use defmt::*;

use fairfan_core::config::{parse_config, MachineConfig, PinSettings};
use fairfan_hal_rp2040::GpioAllocator;

/// Embedded configuration (compiled into firmware)
/// Edit machine.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../../machine.toml");

/// Parse the embedded configuration
pub fn load_config() -> MachineConfig {
    let mut config = match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Loaded machine.toml");
            config
        }
        Err(e) => {
            error!("machine.toml rejected ({}), using defaults", e);
            MachineConfig::default()
        }
    };

    if let Some(name) = &config.preset {
        info!("Speed preset: {}", name.as_str());
    }

    let mut allocator = GpioAllocator::new();
    if let Err((pin, e)) = allocator.allocate_all(&config.pins) {
        error!("Pin gpio{} cannot be used ({}), using default wiring", pin, e);
        config.pins = PinSettings::default();
    }

    info!(
        "Main axis: {} steps/rev at {} rpm, limits {}/{} deg",
        config.main.axis.steps_per_output_rev(),
        config.main.axis.target_rpm,
        config.travel.limits.soft_limit_deg,
        config.travel.limits.hard_limit_deg
    );
    info!(
        "Oscillation axis: {} steps/rev at {} rpm",
        config.oscillation.axis.steps_per_output_rev(),
        config.oscillation.axis.target_rpm
    );

    config
}
