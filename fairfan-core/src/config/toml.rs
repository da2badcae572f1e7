//! Simple TOML parser for machine configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! FairFan configuration. It does NOT accept the full TOML grammar.
//!
//! Supported features:
//! - Key = value pairs (string, integer, float, boolean)
//! - [section] headers
//! - [section.subsection] headers
//! - Comments (# ...)
//!
//! NOT supported:
//! - Arrays and inline tables
//! - Multi-line strings
//! - Dotted keys outside section headers
//!
//! Unknown keys are ignored so older firmware accepts newer files.

use heapless::String as HString;

use crate::motion::AxisConfig;
use crate::traits::Direction;

use super::presets::{AxisPreset, SpeedPreset};
use super::types::{AxisSettings, ConfigError, MachineConfig, PinConfig, MAX_LABEL_LEN};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid section header
    InvalidSection,
    /// Invalid value type
    InvalidValue,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
    /// Invalid pin string
    InvalidPin,
    /// Values parsed but describe an unusable machine
    Invalid(ConfigError),
}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        ParseError::Invalid(e)
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy)]
enum Section {
    Root,
    MainAxis,
    OscillationAxis,
    Travel,
    Homing,
    Sequence,
    Store,
    Timing,
    Pins,
    /// Index into `MachineConfig::presets`
    Profile(usize),
}

/// Parse TOML configuration into MachineConfig
///
/// Starts from the defaults, applies the selected preset and validates
/// the result.
pub fn parse_config(input: &str) -> Result<MachineConfig, ParseError> {
    let mut config = MachineConfig::new();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1], &mut config)?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config)?;
        }
    }

    config.apply_preset()?;
    config.validate()?;
    Ok(config)
}

/// Parse section header like "axis.main", "homing" or "profile.night"
fn parse_section_header(header: &str, config: &mut MachineConfig) -> Result<Section, ParseError> {
    let header = header.trim();

    if let Some((kind, name)) = header.split_once('.') {
        return match (kind, name) {
            ("axis", "main") => Ok(Section::MainAxis),
            ("axis", "oscillation") => Ok(Section::OscillationAxis),
            ("profile", name) if !name.is_empty() && !name.contains('.') => {
                profile_slot(name, config).map(Section::Profile)
            }
            _ => Err(ParseError::InvalidSection),
        };
    }

    match header {
        "travel" => Ok(Section::Travel),
        "homing" => Ok(Section::Homing),
        "sequence" => Ok(Section::Sequence),
        "store" => Ok(Section::Store),
        "timing" => Ok(Section::Timing),
        "pins" => Ok(Section::Pins),
        _ => Err(ParseError::InvalidSection),
    }
}

/// Find a preset by name or add one based on "balanced"
fn profile_slot(name: &str, config: &mut MachineConfig) -> Result<usize, ParseError> {
    if let Some(index) = config.presets.iter().position(|p| p.name.as_str() == name) {
        return Ok(index);
    }
    if name.len() > MAX_LABEL_LEN {
        return Err(ParseError::InvalidSection);
    }
    let preset = SpeedPreset::derived(name, &SpeedPreset::balanced());
    config
        .presets
        .push(preset)
        .map_err(|_| ParseError::TooManyItems)?;
    Ok(config.presets.len() - 1)
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

/// Parse an integer value, decimal or 0x-prefixed hex
fn parse_int<T: TryFrom<u32>>(value: &str) -> Result<T, ParseError> {
    let raw = if let Some(hex) = value.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse::<u32>()
    };
    let raw = raw.map_err(|_| ParseError::InvalidValue)?;
    T::try_from(raw).map_err(|_| ParseError::InvalidValue)
}

/// Parse a float value; integers are accepted
fn parse_float(value: &str) -> Result<f32, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse "cw" / "ccw"
fn parse_direction(value: &str) -> Result<Direction, ParseError> {
    match parse_string(value) {
        "cw" | "clockwise" => Ok(Direction::Clockwise),
        "ccw" | "counterclockwise" => Ok(Direction::CounterClockwise),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse a pin string like "gpio11", "!gpio12", "^gpio4"
fn parse_pin(value: &str) -> Result<PinConfig, ParseError> {
    let mut s = parse_string(value);
    let mut inverted = false;
    let mut pull_up = false;

    // Check for modifiers
    while !s.is_empty() {
        if let Some(rest) = s.strip_prefix('!') {
            inverted = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('^') {
            pull_up = true;
            s = rest;
        } else {
            break;
        }
    }

    // Parse "gpioNN"
    let number = s.strip_prefix("gpio").ok_or(ParseError::InvalidPin)?;
    let pin: u8 = number.parse().map_err(|_| ParseError::InvalidPin)?;
    if pin > 29 {
        return Err(ParseError::InvalidPin);
    }

    Ok(PinConfig {
        pin,
        inverted,
        pull_up,
    })
}

fn apply_axis(settings: &mut AxisSettings, key: &str, value: &str) -> Result<(), ParseError> {
    let axis: &mut AxisConfig = &mut settings.axis;
    match key {
        "steps_per_rev" => axis.steps_per_rev = parse_int(value)?,
        "microsteps" => axis.microsteps = parse_int(value)?,
        "gear_ratio" => axis.gear_ratio = parse_int(value)?,
        "rpm" | "target_rpm" => axis.target_rpm = parse_float(value)?,
        "accel_zone" => settings.profile.accel_zone = parse_float(value)?,
        "decel_zone" => settings.profile.decel_zone = parse_float(value)?,
        "curve" => settings.profile.curve = parse_float(value)?,
        "min_speed" => settings.profile.min_speed = parse_float(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_axis_preset(
    preset: &mut AxisPreset,
    key: &str,
    value: &str,
) -> Result<(), ParseError> {
    match key {
        "rpm" => preset.rpm = parse_float(value)?,
        "accel_zone" => preset.profile.accel_zone = parse_float(value)?,
        "decel_zone" => preset.profile.decel_zone = parse_float(value)?,
        "curve" => preset.profile.curve = parse_float(value)?,
        "min_speed" => preset.profile.min_speed = parse_float(value)?,
        _ => {}
    }
    Ok(())
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut MachineConfig,
) -> Result<(), ParseError> {
    match section {
        Section::Root => {
            if key == "preset" {
                let name =
                    HString::try_from(parse_string(value)).map_err(|_| ParseError::InvalidValue)?;
                config.preset = Some(name);
            }
        }
        Section::MainAxis => apply_axis(&mut config.main, key, value)?,
        Section::OscillationAxis => apply_axis(&mut config.oscillation, key, value)?,
        Section::Travel => {
            let travel = &mut config.travel;
            match key {
                "hard_limit_deg" => travel.limits.hard_limit_deg = parse_float(value)?,
                "soft_limit_deg" => travel.limits.soft_limit_deg = parse_float(value)?,
                "default_move_deg" => travel.default_move_deg = parse_float(value)?,
                "save_interval_steps" => travel.save_interval_steps = parse_int(value)?,
                "home_tolerance_deg" => travel.home_tolerance_deg = parse_float(value)?,
                _ => {}
            }
        }
        Section::Homing => {
            let homing = &mut config.homing;
            match key {
                "offset_deg" => homing.offset_deg = parse_float(value)?,
                "settle_ms" => homing.settle_ms = parse_int(value)?,
                "first_direction" => homing.first_direction = parse_direction(value)?,
                "auto_start" => homing.auto_start = parse_bool(value)?,
                _ => {}
            }
        }
        Section::Sequence => {
            let sequence = &mut config.sequence;
            match key {
                "travel_deg" => sequence.travel_deg = parse_float(value)?,
                "trigger_offset_deg" => sequence.trigger_offset_deg = parse_float(value)?,
                "stroke_margin_steps" => sequence.stroke_margin_steps = parse_int(value)?,
                "auto_start" => sequence.auto_start = parse_bool(value)?,
                _ => {}
            }
        }
        Section::Store => {
            let store = &mut config.store;
            match key {
                "i2c_address" => {
                    let address: u8 = parse_int(value)?;
                    if address > 0x7F {
                        return Err(ParseError::InvalidValue);
                    }
                    store.i2c_address = address;
                }
                "auto_recovery" => store.auto_recovery = parse_bool(value)?,
                "recovery_before_homing" => store.recovery_before_homing = parse_bool(value)?,
                _ => {}
            }
        }
        Section::Timing => {
            let timing = &mut config.timing;
            match key {
                "control_interval_ms" => timing.control_interval_ms = parse_int(value)?,
                "debounce_ms" => timing.debounce_ms = parse_int(value)?,
                "dir_change_delay_ms" => timing.dir_change_delay_ms = parse_int(value)?,
                "dir_setup_us" => timing.dir_setup_us = parse_int(value)?,
                _ => {}
            }
        }
        Section::Pins => {
            let pins = &mut config.pins;
            match key {
                "main_step" => pins.main_step = parse_pin(value)?,
                "main_dir" => pins.main_dir = parse_pin(value)?,
                "oscillation_step" => pins.oscillation_step = parse_pin(value)?,
                "oscillation_dir" => pins.oscillation_dir = parse_pin(value)?,
                "oscillation_enable" => pins.oscillation_enable = parse_pin(value)?,
                "first_switch" => pins.first_switch = parse_pin(value)?,
                "second_switch" => pins.second_switch = parse_pin(value)?,
                "i2c_sda" => pins.i2c_sda = parse_pin(value)?,
                "i2c_scl" => pins.i2c_scl = parse_pin(value)?,
                _ => {}
            }
        }
        Section::Profile(index) => {
            let preset = config
                .presets
                .get_mut(index)
                .ok_or(ParseError::InvalidSection)?;
            if let Some(rest) = key.strip_prefix("main_") {
                apply_axis_preset(&mut preset.main, rest, value)?;
            } else if let Some(rest) = key.strip_prefix("oscillation_") {
                apply_axis_preset(&mut preset.oscillation, rest, value)?;
            } else if key == "trigger_offset_deg" {
                preset.trigger_offset_deg = parse_float(value)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pin() {
        let pin = parse_pin("gpio11").unwrap();
        assert_eq!(pin.pin, 11);
        assert!(!pin.inverted);
        assert!(!pin.pull_up);

        let pin = parse_pin("!gpio12").unwrap();
        assert_eq!(pin.pin, 12);
        assert!(pin.inverted);

        let pin = parse_pin("\"^!gpio5\"").unwrap();
        assert_eq!(pin.pin, 5);
        assert!(pin.inverted);
        assert!(pin.pull_up);

        assert_eq!(parse_pin("gpio30"), Err(ParseError::InvalidPin));
        assert_eq!(parse_pin("pin3"), Err(ParseError::InvalidPin));
    }

    #[test]
    fn test_parse_int_hex() {
        let address: u8 = parse_int("0x50").unwrap();
        assert_eq!(address, 0x50);
        assert_eq!(parse_int::<u8>("300"), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_parse_key_value_strips_comment() {
        assert_eq!(
            parse_key_value("rpm = 4.0 # output shaft"),
            Some(("rpm", "4.0"))
        );
        assert_eq!(
            parse_key_value("preset = \"a#b\""),
            Some(("preset", "\"a#b\""))
        );
        assert_eq!(parse_key_value("rpm ="), None);
    }

    #[test]
    fn test_empty_input_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.main.axis.gear_ratio, 20);
        assert_eq!(config.travel.save_interval_steps, 44);
        assert_eq!(config.store.i2c_address, 0x50);
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
# FairFan test machine
preset = "night"

[axis.main]
gear_ratio = 30
rpm = 3.5

[axis.oscillation]
microsteps = 16

[travel]
hard_limit_deg = 540
soft_limit_deg = 500.0

[homing]
offset_deg = 1.0
first_direction = "ccw"
auto_start = false

[sequence]
travel_deg = 540
trigger_offset_deg = 40

[store]
i2c_address = 0x51

[timing]
debounce_ms = 8

[pins]
first_switch = "^gpio14"

[profile.night]
main_rpm = 2.0
oscillation_curve = 0.7
trigger_offset_deg = 35
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.main.axis.gear_ratio, 30);
        // Preset overrides the axis speed
        assert_eq!(config.main.axis.target_rpm, 2.0);
        assert_eq!(config.oscillation.axis.microsteps, 16);
        assert_eq!(config.oscillation.profile.curve, 0.7);
        assert_eq!(config.sequence.trigger_offset_deg, 35.0);
        assert_eq!(config.travel.limits.hard_limit_deg, 540.0);
        assert_eq!(config.homing.first_direction, Direction::CounterClockwise);
        assert!(!config.homing.auto_start);
        assert_eq!(config.store.i2c_address, 0x51);
        assert_eq!(config.timing.debounce_ms, 8);
        assert_eq!(config.pins.first_switch.pin, 14);
        assert!(config.pins.first_switch.pull_up);
        assert_eq!(config.presets.len(), 4);
    }

    #[test]
    fn test_override_builtin_preset() {
        let config_str = r#"
preset = "fast"

[profile.fast]
main_rpm = 6.0
"#;
        let config = parse_config(config_str).unwrap();
        assert_eq!(config.main.axis.target_rpm, 6.0);
        assert_eq!(config.main.profile.accel_zone, 0.2);
        assert_eq!(config.presets.len(), 3);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_config("[motor]\nrpm = 1"),
            Err(ParseError::InvalidSection)
        );
        assert_eq!(
            parse_config("[axis.main]\nrpm = fast"),
            Err(ParseError::InvalidValue)
        );
        assert_eq!(
            parse_config("preset = \"turbo\""),
            Err(ParseError::Invalid(ConfigError::UnknownPreset))
        );
        assert_eq!(
            parse_config("[travel]\nsoft_limit_deg = 800"),
            Err(ParseError::Invalid(ConfigError::InvalidLimits))
        );
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = parse_config("[homing]\nspeed = 3\n").unwrap();
        assert_eq!(config.homing.settle_ms, 500);
    }
}
