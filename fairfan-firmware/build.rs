//! Build script for fairfan-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates machine.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).expect("cannot create memory.x");
    f.write_all(memory_x).expect("cannot write memory.x");

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate machine.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=machine.toml");

    let config_path = Path::new("machine.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: machine.toml not found!                                  ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds machine.toml from the fairfan-firmware      ║\n\
            ║  directory. Restore it or create a new one.                      ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read machine.toml                              ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in machine.toml                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_axes(&config, &mut errors);
    validate_travel(&config, &mut errors);
    validate_sequence(&config, &mut errors);
    validate_pins(&config, &mut errors);
    validate_preset(&config, &mut errors);
    report("Invalid machine configuration", &errors);

    println!("cargo:warning=machine.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<57}║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Numeric value, accepting integers where floats are expected
fn number(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

fn check_range(
    table: &toml::value::Table,
    section: &str,
    key: &str,
    min: f64,
    max: f64,
    errors: &mut Vec<String>,
) {
    if let Some(value) = table.get(key) {
        match number(value) {
            Some(n) if n >= min && n <= max => {}
            Some(_) => errors.push(format!("[{}] {} must be {}-{}", section, key, min, max)),
            None => errors.push(format!("[{}] {} must be a number", section, key)),
        }
    }
}

fn section<'a>(config: &'a toml::Value, path: &[&str]) -> Option<&'a toml::value::Table> {
    let mut value = config;
    for key in path {
        value = value.get(key)?;
    }
    value.as_table()
}

fn validate_axes(config: &toml::Value, errors: &mut Vec<String>) {
    for name in ["main", "oscillation"] {
        let Some(axis) = section(config, &["axis", name]) else {
            continue;
        };
        let label = format!("axis.{}", name);
        check_range(axis, &label, "steps_per_rev", 1.0, 65535.0, errors);
        check_range(axis, &label, "microsteps", 1.0, 255.0, errors);
        check_range(axis, &label, "gear_ratio", 1.0, 255.0, errors);
        check_range(axis, &label, "rpm", 0.01, 60.0, errors);
        check_range(axis, &label, "accel_zone", 0.0, 1.0, errors);
        check_range(axis, &label, "decel_zone", 0.0, 1.0, errors);
        check_range(axis, &label, "curve", 0.01, 10.0, errors);
        check_range(axis, &label, "min_speed", 0.01, 1.0, errors);
    }
}

fn validate_travel(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(travel) = section(config, &["travel"]) else {
        return;
    };
    check_range(travel, "travel", "hard_limit_deg", 1.0, 3600.0, errors);
    check_range(travel, "travel", "soft_limit_deg", 0.0, 3600.0, errors);
    check_range(travel, "travel", "default_move_deg", 0.1, 3600.0, errors);
    check_range(travel, "travel", "save_interval_steps", 1.0, 1_000_000.0, errors);

    let hard = travel.get("hard_limit_deg").and_then(number);
    let soft = travel.get("soft_limit_deg").and_then(number);
    if let (Some(hard), Some(soft)) = (hard, soft) {
        if soft > hard {
            errors.push("[travel] soft_limit_deg must not exceed hard_limit_deg".to_string());
        }
    }
}

fn validate_sequence(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(sequence) = section(config, &["sequence"]) else {
        return;
    };
    check_range(sequence, "sequence", "travel_deg", 1.0, 3600.0, errors);
    check_range(sequence, "sequence", "trigger_offset_deg", 0.0, 360.0, errors);

    let travel = sequence.get("travel_deg").and_then(number);
    let offset = sequence.get("trigger_offset_deg").and_then(number);
    if let (Some(travel), Some(offset)) = (travel, offset) {
        if 2.0 * offset >= travel {
            errors.push("[sequence] trigger_offset_deg must be below travel_deg / 2".to_string());
        }
    }

    if let Some(homing) = section(config, &["homing"]) {
        if let Some(toml::Value::String(dir)) = homing.get("first_direction") {
            if !["cw", "ccw"].contains(&dir.as_str()) {
                errors.push("[homing] first_direction must be 'cw' or 'ccw'".to_string());
            }
        }
    }
}

/// Parse "gpio11", "!gpio8" or "^gpio10" into a pin number
fn pin_number(s: &str) -> Option<u8> {
    let s = s.trim_start_matches(['!', '^']);
    let pin: u8 = s.strip_prefix("gpio")?.parse().ok()?;
    (pin < 30).then_some(pin)
}

fn validate_pins(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(pins) = section(config, &["pins"]) else {
        return;
    };

    let mut seen: Vec<(u8, &str)> = Vec::new();
    for (key, value) in pins {
        let Some(s) = value.as_str() else {
            errors.push(format!("[pins] {} must be a string like \"gpio2\"", key));
            continue;
        };
        let Some(pin) = pin_number(s) else {
            errors.push(format!("[pins] {} = \"{}\" is not a valid RP2040 pin", key, s));
            continue;
        };
        if let Some((_, other)) = seen.iter().find(|(p, _)| *p == pin) {
            errors.push(format!("[pins] {} and {} both use gpio{}", other, key, pin));
        }
        seen.push((pin, key.as_str()));
    }

    // The FRAM bus is wired to I2C0 on GP4/GP5
    for (key, expected) in [("i2c_sda", 4u8), ("i2c_scl", 5u8)] {
        if let Some(pin) = pins.get(key).and_then(|v| v.as_str()).and_then(pin_number) {
            if pin != expected {
                errors.push(format!("[pins] {} must be gpio{}", key, expected));
            }
        }
    }
}

fn validate_preset(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(name) = config.get("preset").and_then(|v| v.as_str()) else {
        return;
    };
    let builtin = ["balanced", "fast", "smooth"];
    let custom = section(config, &["profile"]).is_some_and(|t| t.contains_key(name));
    if !builtin.contains(&name) && !custom {
        errors.push(format!("preset '{}' is neither built in nor a [profile.*]", name));
    }
    if let Some(profiles) = section(config, &["profile"]) {
        let added = profiles
            .keys()
            .filter(|k| !builtin.contains(&k.as_str()))
            .count();
        if added > 3 {
            errors.push("at most 3 [profile.*] sections fit next to the built-ins".to_string());
        }
    }
}
