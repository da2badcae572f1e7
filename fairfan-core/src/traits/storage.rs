//! Byte-addressed non-volatile memory

/// Errors from non-volatile memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvError {
    /// Device did not acknowledge (missing or unpowered)
    NotPresent,
    /// Bus transfer failed
    Bus,
    /// Access extends past the end of the device
    OutOfRange,
}

/// Byte-addressed non-volatile memory such as an I2C FRAM
///
/// Implementations must write through immediately; there is no flush step.
pub trait NvMemory {
    /// Number of addressable bytes
    fn capacity(&self) -> u32;

    /// Check that the device responds
    fn probe(&mut self) -> Result<(), NvError>;

    /// Read `buf.len()` bytes starting at `address`
    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), NvError>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), NvError>;

    /// Check that `len` bytes starting at `address` fit in the device
    fn check_range(&self, address: u16, len: usize) -> Result<(), NvError> {
        if address as u32 + len as u32 > self.capacity() {
            Err(NvError::OutOfRange)
        } else {
            Ok(())
        }
    }
}
