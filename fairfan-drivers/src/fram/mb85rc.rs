//! MB85RC series I2C FRAM
//!
//! Byte-addressed ferroelectric RAM with two address bytes (big endian)
//! in front of every transfer. Writes complete within the bus
//! transaction, so there is no page buffer or write-cycle delay to wait
//! out.

use fairfan_core::traits::{NvError, NvMemory};
use fairfan_hal::I2cBus;
use heapless::Vec;

/// Factory I2C address with A0..A2 tied low
pub const DEFAULT_ADDRESS: u8 = 0x50;

/// Size of the MB85RC256V in bytes
pub const MB85RC256_CAPACITY: u32 = 0x8000;

/// Data bytes sent per write transaction
const WRITE_CHUNK: usize = 32;

/// FRAM transfer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramError<E> {
    /// No acknowledge from the device address
    NotPresent,
    /// Transfer failed on a device that answered the last probe
    Bus(E),
    /// Access extends past the end of the part
    OutOfRange,
}

impl<E> From<FramError<E>> for NvError {
    fn from(e: FramError<E>) -> Self {
        match e {
            FramError::NotPresent => NvError::NotPresent,
            FramError::Bus(_) => NvError::Bus,
            FramError::OutOfRange => NvError::OutOfRange,
        }
    }
}

/// MB85RC FRAM on an I2C bus
pub struct Mb85rc<B> {
    bus: B,
    address: u8,
    capacity: u32,
    present: bool,
}

impl<B: I2cBus> Mb85rc<B> {
    /// MB85RC256V at `address`
    pub fn new(bus: B, address: u8) -> Self {
        Self::with_capacity(bus, address, MB85RC256_CAPACITY)
    }

    pub fn with_capacity(bus: B, address: u8, capacity: u32) -> Self {
        Self {
            bus,
            address,
            capacity,
            present: false,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Last probe found the device
    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Release the bus
    pub fn release(self) -> B {
        self.bus
    }

    fn bus_error(&self, e: B::Error) -> FramError<B::Error> {
        if self.present {
            FramError::Bus(e)
        } else {
            FramError::NotPresent
        }
    }

    fn fits(&self, address: u16, len: usize) -> Result<(), FramError<B::Error>> {
        if address as u32 + len as u32 > self.capacity {
            Err(FramError::OutOfRange)
        } else {
            Ok(())
        }
    }

    /// Sequential read starting at `address`
    pub fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<(), FramError<B::Error>> {
        self.fits(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let word = address.to_be_bytes();
        self.bus
            .write_read(self.address, &word, buf)
            .map_err(|e| self.bus_error(e))
    }

    /// Write `data` starting at `address`, split into bus-sized frames
    pub fn write_bytes(&mut self, address: u16, data: &[u8]) -> Result<(), FramError<B::Error>> {
        self.fits(address, data.len())?;

        let mut offset = 0usize;
        for chunk in data.chunks(WRITE_CHUNK) {
            let word = (address as usize + offset) as u16;
            let mut frame: Vec<u8, { WRITE_CHUNK + 2 }> = Vec::new();
            // Capacity covers the two address bytes plus one chunk
            let _ = frame.extend_from_slice(&word.to_be_bytes());
            let _ = frame.extend_from_slice(chunk);
            self.bus
                .write(self.address, &frame)
                .map_err(|e| self.bus_error(e))?;
            offset += chunk.len();
        }
        Ok(())
    }
}

impl<B: I2cBus> NvMemory for Mb85rc<B> {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn probe(&mut self) -> Result<(), NvError> {
        // Setting the address pointer is the cheapest transfer the part ACKs
        self.present = self.bus.write(self.address, &[0, 0]).is_ok();
        if self.present {
            Ok(())
        } else {
            Err(NvError::NotPresent)
        }
    }

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), NvError> {
        Ok(self.read_bytes(address, buf)?)
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), NvError> {
        Ok(self.write_bytes(address, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairfan_core::persist::{LoadOutcome, PositionStore, SlotStatus};
    use std::vec::Vec as StdVec;

    /// I2C bus with a simulated FRAM behind one address
    struct FakeBus {
        device: u8,
        memory: [u8; 128],
        pointer: usize,
        transactions: StdVec<(u8, usize)>,
        fail: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Nack;

    impl FakeBus {
        fn new(device: u8) -> Self {
            Self {
                device,
                memory: [0; 128],
                pointer: 0,
                transactions: StdVec::new(),
                fail: false,
            }
        }

        fn ack(&self, address: u8) -> Result<(), Nack> {
            if self.fail || address != self.device {
                Err(Nack)
            } else {
                Ok(())
            }
        }
    }

    impl I2cBus for FakeBus {
        type Error = Nack;

        fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Nack> {
            self.ack(address)?;
            self.transactions.push((address, data.len()));
            self.pointer = u16::from_be_bytes([data[0], data[1]]) as usize;
            for b in &data[2..] {
                self.memory[self.pointer % 128] = *b;
                self.pointer += 1;
            }
            Ok(())
        }

        fn write_read(&mut self, address: u8, prefix: &[u8], buf: &mut [u8]) -> Result<(), Nack> {
            self.write(address, prefix)?;
            for b in buf.iter_mut() {
                *b = self.memory[self.pointer % 128];
                self.pointer += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn test_probe() {
        let mut fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        assert_eq!(fram.probe(), Ok(()));
        assert!(fram.is_present());

        let mut missing = Mb85rc::new(FakeBus::new(0x51), DEFAULT_ADDRESS);
        assert_eq!(missing.probe(), Err(NvError::NotPresent));
        assert_eq!(missing.read(0, &mut [0u8; 2]), Err(NvError::NotPresent));
    }

    #[test]
    fn test_write_then_read() {
        let mut fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        fram.probe().unwrap();

        fram.write(0x10, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        fram.read(0x10, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_long_write_is_chunked() {
        let mut fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        let data = [0xA5u8; 70];
        fram.write(0, &data).unwrap();

        let lengths: StdVec<usize> = fram.bus.transactions.iter().map(|t| t.1).collect();
        assert_eq!(lengths, [34, 34, 8]);
        assert!(fram.bus.memory[..70].iter().all(|b| *b == 0xA5));
        assert_eq!(fram.bus.memory[70], 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        assert_eq!(fram.write(0x7FFF, &[1, 2]), Err(NvError::OutOfRange));
        assert_eq!(fram.write(0x7FFF, &[1]), Ok(()));
    }

    #[test]
    fn test_bus_failure_after_probe() {
        let mut fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        fram.probe().unwrap();
        fram.bus.fail = true;
        assert_eq!(fram.write_bytes(0, &[1]), Err(FramError::Bus(Nack)));
        assert_eq!(fram.write(0, &[1]), Err(NvError::Bus));
    }

    #[test]
    fn test_backs_position_store() {
        let fram = Mb85rc::new(FakeBus::new(DEFAULT_ADDRESS), DEFAULT_ADDRESS);
        let mut store = PositionStore::new(fram);
        store.init().unwrap();
        assert_eq!(store.load(), Ok(LoadOutcome::NoPriorData));

        store.save(-1234).unwrap();
        store.save(5678).unwrap();
        let info = store.inspect().unwrap();
        assert_eq!(info.slot_a, SlotStatus::Valid(-1234));
        assert_eq!(info.slot_b, SlotStatus::Valid(5678));

        let fram = store.memory();
        let mut reopened = PositionStore::new(Mb85rc::new(
            FakeBus {
                memory: fram.bus.memory,
                ..FakeBus::new(DEFAULT_ADDRESS)
            },
            DEFAULT_ADDRESS,
        ));
        reopened.init().unwrap();
        assert_eq!(
            reopened.load(),
            Ok(LoadOutcome::Diverged {
                primary: -1234,
                backup: 5678
            })
        );
    }
}
