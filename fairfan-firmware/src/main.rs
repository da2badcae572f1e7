//! FairFan - Dual-Axis Fan Controller Firmware
//!
//! Main firmware binary for RP2040-based controllers. The main axis sweeps
//! the fan body over a fixed arc; the oscillation axis swings between two
//! limit switches in step with it. The main axis position is kept in an
//! I2C FRAM so an interrupted sweep can be recovered after power loss.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use fairfan_core::config::PinConfig;
use fairfan_core::motion::{Axis, AxisId};
use fairfan_drivers::fram::Mb85rc;
use fairfan_drivers::stepper::StepDirPins;
use fairfan_drivers::switch::LimitSwitch;
use fairfan_hal::I2cConfig;
use fairfan_hal_rp2040::{PinBank, RpI2c, RpInput, RpOutput};

use crate::channels::{MAIN_WAKE, OSCILLATION_WAKE};

mod channels;
mod config;
mod tasks;

// Axes are shared between the control task and their step task
static MAIN_AXIS: StaticCell<Axis> = StaticCell::new();
static OSCILLATION_AXIS: StaticCell<Axis> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("FairFan firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = config::load_config();

    let (mut bank, fram_bus) = PinBank::split(p);
    let pins = config.pins;

    let main_pins = StepDirPins::new(
        output(&mut bank, &pins.main_step, "main_step"),
        output(&mut bank, &pins.main_dir, "main_dir"),
        None,
    );
    let oscillation_pins = StepDirPins::new(
        output(&mut bank, &pins.oscillation_step, "oscillation_step"),
        output(&mut bank, &pins.oscillation_dir, "oscillation_dir"),
        Some(output(
            &mut bank,
            &pins.oscillation_enable,
            "oscillation_enable",
        )),
    );
    info!("Stepper outputs initialized");

    let debounce_ms = config.timing.debounce_ms;
    let first_switch = LimitSwitch::with_polarity(
        input(&mut bank, &pins.first_switch, "first_switch"),
        pins.first_switch.inverted,
        debounce_ms,
    );
    let second_switch = LimitSwitch::with_polarity(
        input(&mut bank, &pins.second_switch, "second_switch"),
        pins.second_switch.inverted,
        debounce_ms,
    );
    info!("Limit switches initialized");

    // FRAM on I2C0 (GP4 SDA, GP5 SCL)
    let i2c = RpI2c::new(fram_bus.i2c, fram_bus.scl, fram_bus.sda, I2cConfig::FAST);
    let fram = Mb85rc::new(i2c, config.store.i2c_address);
    info!("FRAM bus initialized at 0x{:02x}", config.store.i2c_address);

    let main_axis: &'static Axis = MAIN_AXIS.init(Axis::new(AxisId::Main, config.main.axis));
    let oscillation_axis: &'static Axis = OSCILLATION_AXIS.init(Axis::new(
        AxisId::Oscillation,
        config.oscillation.axis,
    ));

    let timing = tasks::StepTiming {
        dir_change_delay_ms: config.timing.dir_change_delay_ms,
        dir_setup_us: config.timing.dir_setup_us,
    };

    info!("Spawning tasks...");

    spawner
        .spawn(tasks::step_task(main_axis, main_pins, &MAIN_WAKE, timing))
        .unwrap();
    spawner
        .spawn(tasks::step_task(
            oscillation_axis,
            oscillation_pins,
            &OSCILLATION_WAKE,
            timing,
        ))
        .unwrap();
    spawner
        .spawn(tasks::control_task(tasks::ControlParts {
            config,
            main: main_axis,
            oscillation: oscillation_axis,
            fram,
            first_switch,
            second_switch,
        }))
        .unwrap();

    info!("All tasks spawned");
}

/// Take a configured output pin; a missing pin leaves the board unusable
fn output(bank: &mut PinBank, pin: &PinConfig, name: &str) -> RpOutput<'static> {
    match bank.output(pin) {
        Ok(out) => out,
        Err(e) => defmt::panic!("{} on gpio{} unavailable: {}", name, pin.pin, e),
    }
}

fn input(bank: &mut PinBank, pin: &PinConfig, name: &str) -> RpInput<'static> {
    match bank.input(pin) {
        Ok(input) => input,
        Err(e) => defmt::panic!("{} on gpio{} unavailable: {}", name, pin.pin, e),
    }
}
