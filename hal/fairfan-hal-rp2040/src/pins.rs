//! Dynamic pin allocation for config-driven hardware setup
//!
//! Lets the firmware take GPIO pins by the numbers in `machine.toml`
//! instead of hardcoding them. The FRAM bus pins are taken out first:
//! the I2C peripheral needs them with their concrete types.

use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pull};
use embassy_rp::peripherals::{I2C0, PIN_4, PIN_5};
use embassy_rp::{Peri, Peripherals};
use fairfan_core::config::PinConfig;

use crate::gpio::{RpInput, RpOutput, GPIO_COUNT};

/// Error when requesting a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin,
    /// Pin already taken
    AlreadyTaken,
    /// Pin reserved for the FRAM bus
    Reserved,
}

/// SDA of the FRAM bus
pub const FRAM_SDA: u8 = 4;
/// SCL of the FRAM bus
pub const FRAM_SCL: u8 = 5;

/// Peripherals of the FRAM bus (I2C0 on GP4/GP5)
pub struct FramBusPeripherals {
    pub i2c: Peri<'static, I2C0>,
    pub sda: Peri<'static, PIN_4>,
    pub scl: Peri<'static, PIN_5>,
}

/// Pin bank that holds the free GPIO pins and hands them out by number
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
}

impl PinBank {
    /// Split the peripherals into the pin bank and the FRAM bus
    pub fn split(p: Peripherals) -> (Self, FramBusPeripherals) {
        let bank = Self {
            pins: [
                Some(p.PIN_0.into()),
                Some(p.PIN_1.into()),
                Some(p.PIN_2.into()),
                Some(p.PIN_3.into()),
                None,
                None,
                Some(p.PIN_6.into()),
                Some(p.PIN_7.into()),
                Some(p.PIN_8.into()),
                Some(p.PIN_9.into()),
                Some(p.PIN_10.into()),
                Some(p.PIN_11.into()),
                Some(p.PIN_12.into()),
                Some(p.PIN_13.into()),
                Some(p.PIN_14.into()),
                Some(p.PIN_15.into()),
                Some(p.PIN_16.into()),
                Some(p.PIN_17.into()),
                Some(p.PIN_18.into()),
                Some(p.PIN_19.into()),
                Some(p.PIN_20.into()),
                Some(p.PIN_21.into()),
                Some(p.PIN_22.into()),
                Some(p.PIN_23.into()),
                Some(p.PIN_24.into()),
                Some(p.PIN_25.into()),
                Some(p.PIN_26.into()),
                Some(p.PIN_27.into()),
                Some(p.PIN_28.into()),
                Some(p.PIN_29.into()),
            ],
        };
        let bus = FramBusPeripherals {
            i2c: p.I2C0,
            sda: p.PIN_4,
            scl: p.PIN_5,
        };
        (bank, bus)
    }

    /// Take a pin by number
    pub fn take(&mut self, pin_num: u8) -> Result<Peri<'static, AnyPin>, PinError> {
        if pin_num as usize >= GPIO_COUNT {
            return Err(PinError::InvalidPin);
        }
        if pin_num == FRAM_SDA || pin_num == FRAM_SCL {
            return Err(PinError::Reserved);
        }
        self.pins[pin_num as usize]
            .take()
            .ok_or(PinError::AlreadyTaken)
    }

    pub fn is_available(&self, pin_num: u8) -> bool {
        self.pins
            .get(pin_num as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Take a pin as an output, deasserted
    pub fn output(&mut self, config: &PinConfig) -> Result<RpOutput<'static>, PinError> {
        let pin = self.take(config.pin)?;
        let level = if config.inverted { Level::High } else { Level::Low };
        Ok(RpOutput::new(Output::new(pin, level), config))
    }

    /// Take a pin as an input, with the pull-up if configured
    pub fn input(&mut self, config: &PinConfig) -> Result<RpInput<'static>, PinError> {
        let pin = self.take(config.pin)?;
        let pull = if config.pull_up { Pull::Up } else { Pull::None };
        Ok(RpInput::new(Input::new(pin, pull)))
    }
}
