//! GPIO allocation and pin wrappers
//!
//! Tracks which GPIO pins are in use to prevent conflicts, and adapts
//! Embassy's pin drivers to the `fairfan-hal` traits.

use embassy_rp::gpio::{Input, Output};
use fairfan_core::config::{PinConfig, PinSettings};
use heapless::FnvIndexSet;

use crate::pins::PinError;

/// Maximum number of GPIO pins on RP2040
pub const GPIO_COUNT: usize = 30;

/// GPIO allocator to track pin usage
pub struct GpioAllocator {
    /// Set of allocated GPIO pins
    allocated: FnvIndexSet<u8, 32>,
}

impl Default for GpioAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioAllocator {
    pub fn new() -> Self {
        Self {
            allocated: FnvIndexSet::new(),
        }
    }

    /// Allocate a GPIO pin
    pub fn allocate(&mut self, pin: u8) -> Result<(), PinError> {
        if pin >= GPIO_COUNT as u8 {
            return Err(PinError::InvalidPin);
        }
        if self.allocated.contains(&pin) {
            return Err(PinError::AlreadyTaken);
        }
        self.allocated
            .insert(pin)
            .map_err(|_| PinError::InvalidPin)?;
        Ok(())
    }

    pub fn release(&mut self, pin: u8) {
        self.allocated.remove(&pin);
    }

    pub fn is_allocated(&self, pin: u8) -> bool {
        self.allocated.contains(&pin)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    /// Allocate every pin of a machine configuration
    ///
    /// On conflict returns the offending pin number with the error.
    pub fn allocate_all(&mut self, pins: &PinSettings) -> Result<(), (u8, PinError)> {
        let all = [
            pins.main_step,
            pins.main_dir,
            pins.oscillation_step,
            pins.oscillation_dir,
            pins.oscillation_enable,
            pins.first_switch,
            pins.second_switch,
            pins.i2c_sda,
            pins.i2c_scl,
        ];
        for cfg in all {
            self.allocate(cfg.pin).map_err(|e| (cfg.pin, e))?;
        }
        Ok(())
    }
}

/// Output pin with configurable polarity
///
/// `set_high` asserts the signal: an inverted pin drives the line low.
pub struct RpOutput<'d> {
    pin: Output<'d>,
    inverted: bool,
}

impl<'d> RpOutput<'d> {
    pub fn new(pin: Output<'d>, config: &PinConfig) -> Self {
        let mut out = Self {
            pin,
            inverted: config.inverted,
        };
        fairfan_hal::OutputPin::set_low(&mut out);
        out
    }
}

impl fairfan_hal::OutputPin for RpOutput<'_> {
    fn set_high(&mut self) {
        if self.inverted {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
    }

    fn set_low(&mut self) {
        if self.inverted {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high() != self.inverted
    }
}

/// Input pin reporting the raw line level
///
/// Switch polarity is applied by the limit-switch driver.
pub struct RpInput<'d> {
    pin: Input<'d>,
}

impl<'d> RpInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }
}

impl fairfan_hal::InputPin for RpInput<'_> {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator() {
        let mut alloc = GpioAllocator::new();

        assert!(alloc.allocate(11).is_ok());
        assert!(alloc.is_allocated(11));
        assert_eq!(alloc.allocate(11), Err(PinError::AlreadyTaken));
        assert_eq!(alloc.allocate(30), Err(PinError::InvalidPin));

        alloc.release(11);
        assert!(!alloc.is_allocated(11));
        assert!(alloc.allocate(11).is_ok());
    }

    #[test]
    fn test_default_pins_do_not_clash() {
        let mut alloc = GpioAllocator::new();
        assert_eq!(alloc.allocate_all(&PinSettings::default()), Ok(()));
        assert_eq!(alloc.allocated_count(), 9);
    }

    #[test]
    fn test_clash_reported() {
        let mut pins = PinSettings::default();
        pins.second_switch = PinConfig::with_pullup(pins.main_step.pin);
        let mut alloc = GpioAllocator::new();
        assert_eq!(
            alloc.allocate_all(&pins),
            Err((pins.main_step.pin, PinError::AlreadyTaken))
        );
    }
}
