//! I2C master for addressed memory parts
//!
//! The only device on the bus is the position FRAM, so the trait covers
//! the two transfers a memory part needs: an address-prefixed write and a
//! set-address-then-read with a repeated start.

/// Blocking I2C master
pub trait I2cBus {
    type Error;

    /// Single write transaction to the 7-bit `address`
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Write `prefix`, repeated start, then fill `buf`
    fn write_read(&mut self, address: u8, prefix: &[u8], buf: &mut [u8])
        -> Result<(), Self::Error>;
}

/// Bus clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// SCL frequency in Hz
    pub frequency: u32,
}

impl I2cConfig {
    /// 100 kHz
    pub const STANDARD: Self = Self::khz(100);
    /// 400 kHz
    pub const FAST: Self = Self::khz(400);

    pub const fn khz(khz: u32) -> Self {
        Self {
            frequency: khz * 1000,
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::FAST
    }
}
