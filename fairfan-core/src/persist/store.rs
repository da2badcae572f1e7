//! Dual-slot position store
//!
//! Memory layout (big-endian):
//!
//! ```text
//! Slot A  0x0000  magic (2)  position (4)  crc16 (2)
//! Slot B  0x0008  magic (2)  position (4)  crc16 (2)
//! ```
//!
//! Saves alternate between the slots so a power loss during a write can
//! corrupt at most one of them. The CRC covers magic and position.
//!
//! The alternation state is not persisted. After a cold boot the store
//! does not know which slot was written last, so [`PositionStore::save`]
//! refuses to run until [`PositionStore::load`] (or `clear`) has looked at
//! both slots and picked the slot to overwrite next.

use crate::traits::{NvError, NvMemory};

use super::crc::crc16_ccitt;

/// Slot marker
pub const MAGIC: u16 = 0xFAFA;

/// Bytes per slot
pub const SLOT_SIZE: u16 = 8;

/// Slot A (primary) address
pub const SLOT_A_ADDR: u16 = 0x0000;

/// Slot B (backup) address
pub const SLOT_B_ADDR: u16 = 0x0008;

/// Highest raw address accepted by the maintenance accessors
pub const MAX_ADDRESS: u16 = 0x7FFF;

/// Largest raw range read
pub const RAW_READ_MAX: usize = 256;

/// One of the two slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn address(self) -> u16 {
        match self {
            Slot::A => SLOT_A_ADDR,
            Slot::B => SLOT_B_ADDR,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Decoded content of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotStatus {
    /// Magic and checksum match
    Valid(i32),
    /// Magic mismatch (never written or cleared)
    BadMagic,
    /// Magic matches but the checksum does not (torn write)
    BadChecksum,
}

impl SlotStatus {
    pub fn position(&self) -> Option<i32> {
        match self {
            SlotStatus::Valid(position) => Some(*position),
            _ => None,
        }
    }
}

/// Result of validating both slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadOutcome {
    /// Both slots valid and equal
    Agreed(i32),
    /// Both slots valid but different; the primary slot wins
    ///
    /// This is the only trace of an interrupted write. Without a sequence
    /// counter the newer slot cannot be told apart, so this is a heuristic.
    Diverged { primary: i32, backup: i32 },
    /// Only slot A is valid
    PrimaryOnly(i32),
    /// Only slot B is valid
    BackupOnly(i32),
    /// Neither slot is valid; both were rewritten with zero
    NoPriorData,
}

impl LoadOutcome {
    /// Position to use after loading
    pub fn position(&self) -> i32 {
        match *self {
            LoadOutcome::Agreed(position)
            | LoadOutcome::PrimaryOnly(position)
            | LoadOutcome::BackupOnly(position) => position,
            LoadOutcome::Diverged { primary, .. } => primary,
            LoadOutcome::NoPriorData => 0,
        }
    }

    /// True when the result had to be guessed
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, LoadOutcome::Diverged { .. })
    }
}

/// Errors from the position store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// `init` has not succeeded; the memory was not found
    Uninitialized,
    /// `save` before `load`: the slot to overwrite is unknown
    NotLoaded,
    /// Raw access outside 0..=0x7FFF or longer than 256 bytes
    AddressOutOfRange,
    /// Underlying memory failed
    Memory(NvError),
}

impl From<NvError> for StoreError {
    fn from(e: NvError) -> Self {
        StoreError::Memory(e)
    }
}

/// Diagnostic view of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreInfo {
    pub slot_a: SlotStatus,
    pub slot_b: SlotStatus,
    pub next_slot: Slot,
    pub last_saved: i32,
}

/// Encode a slot record
pub fn encode_slot(position: i32) -> [u8; SLOT_SIZE as usize] {
    let mut record = [0u8; SLOT_SIZE as usize];
    record[0..2].copy_from_slice(&MAGIC.to_be_bytes());
    record[2..6].copy_from_slice(&position.to_be_bytes());
    let crc = crc16_ccitt(&record[..6]);
    record[6..8].copy_from_slice(&crc.to_be_bytes());
    record
}

/// Decode and validate a slot record
pub fn decode_slot(record: &[u8; SLOT_SIZE as usize]) -> SlotStatus {
    let magic = u16::from_be_bytes([record[0], record[1]]);
    if magic != MAGIC {
        return SlotStatus::BadMagic;
    }
    let stored_crc = u16::from_be_bytes([record[6], record[7]]);
    if crc16_ccitt(&record[..6]) != stored_crc {
        return SlotStatus::BadChecksum;
    }
    SlotStatus::Valid(i32::from_be_bytes([
        record[2], record[3], record[4], record[5],
    ]))
}

/// Crash-safe store for one signed position
pub struct PositionStore<M> {
    memory: M,
    initialized: bool,
    loaded: bool,
    next: Slot,
    last_saved: i32,
}

impl<M: NvMemory> PositionStore<M> {
    /// Wrap a memory device; call [`init`](Self::init) before use
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            initialized: false,
            loaded: false,
            next: Slot::A,
            last_saved: 0,
        }
    }

    /// Check that the memory responds
    pub fn init(&mut self) -> Result<(), StoreError> {
        self.memory.probe()?;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Last position written by this store
    pub fn last_saved(&self) -> i32 {
        self.last_saved
    }

    /// Slot the next save goes to
    pub fn next_slot(&self) -> Slot {
        self.next
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized {
            Ok(())
        } else {
            Err(StoreError::Uninitialized)
        }
    }

    fn read_slot(&mut self, slot: Slot) -> Result<SlotStatus, StoreError> {
        let mut record = [0u8; SLOT_SIZE as usize];
        self.memory.read(slot.address(), &mut record)?;
        Ok(decode_slot(&record))
    }

    fn write_slot(&mut self, slot: Slot, position: i32) -> Result<(), StoreError> {
        self.memory.write(slot.address(), &encode_slot(position))?;
        Ok(())
    }

    /// Persist `position` into the slot not written last
    ///
    /// Returns the slot that was written. On failure the alternation is
    /// left unchanged, so the next save retries the same slot.
    pub fn save(&mut self, position: i32) -> Result<Slot, StoreError> {
        self.ensure_initialized()?;
        if !self.loaded {
            return Err(StoreError::NotLoaded);
        }
        let slot = self.next;
        self.write_slot(slot, position)?;
        self.next = slot.other();
        self.last_saved = position;
        Ok(slot)
    }

    /// Validate both slots and pick the stored position
    ///
    /// An empty store is initialized with zero in both slots.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        self.ensure_initialized()?;
        let a = self.read_slot(Slot::A)?;
        let b = self.read_slot(Slot::B)?;

        let (outcome, next) = match (a.position(), b.position()) {
            (Some(pa), Some(pb)) if pa == pb => (LoadOutcome::Agreed(pa), Slot::A),
            (Some(pa), Some(pb)) => (
                LoadOutcome::Diverged {
                    primary: pa,
                    backup: pb,
                },
                Slot::B,
            ),
            (Some(pa), None) => (LoadOutcome::PrimaryOnly(pa), Slot::B),
            (None, Some(pb)) => (LoadOutcome::BackupOnly(pb), Slot::A),
            (None, None) => {
                self.write_slot(Slot::A, 0)?;
                self.write_slot(Slot::B, 0)?;
                (LoadOutcome::NoPriorData, Slot::A)
            }
        };

        self.next = next;
        self.last_saved = outcome.position();
        self.loaded = true;
        Ok(outcome)
    }

    /// Zero both slots (factory reset)
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        let zeros = [0u8; (SLOT_SIZE * 2) as usize];
        self.memory.write(SLOT_A_ADDR, &zeros)?;
        self.next = Slot::A;
        self.last_saved = 0;
        self.loaded = true;
        Ok(())
    }

    /// Read both slots without changing anything
    pub fn inspect(&mut self) -> Result<StoreInfo, StoreError> {
        self.ensure_initialized()?;
        Ok(StoreInfo {
            slot_a: self.read_slot(Slot::A)?,
            slot_b: self.read_slot(Slot::B)?,
            next_slot: self.next,
            last_saved: self.last_saved,
        })
    }

    /// Write one byte, bypassing the slot logic
    pub fn write_raw(&mut self, address: u16, value: u8) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        if address > MAX_ADDRESS {
            return Err(StoreError::AddressOutOfRange);
        }
        self.memory.write(address, &[value])?;
        Ok(())
    }

    /// Read one byte, bypassing the slot logic
    pub fn read_raw(&mut self, address: u16) -> Result<u8, StoreError> {
        let mut byte = [0u8; 1];
        self.read_range(address, &mut byte)?;
        Ok(byte[0])
    }

    /// Read up to 256 bytes starting at `address`
    pub fn read_range(&mut self, address: u16, buf: &mut [u8]) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        let end = address as u32 + buf.len() as u32;
        if buf.len() > RAW_READ_MAX || end > MAX_ADDRESS as u32 + 1 {
            return Err(StoreError::AddressOutOfRange);
        }
        self.memory.read(address, buf)?;
        Ok(())
    }

    /// Borrow the underlying memory
    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Byte array standing in for the FRAM
    pub(crate) struct RamMemory {
        pub bytes: [u8; 64],
        pub present: bool,
        pub fail_writes: bool,
    }

    impl RamMemory {
        pub fn new() -> Self {
            Self {
                bytes: [0xFF; 64],
                present: true,
                fail_writes: false,
            }
        }
    }

    impl NvMemory for RamMemory {
        fn capacity(&self) -> u32 {
            0x8000
        }

        fn probe(&mut self) -> Result<(), NvError> {
            if self.present {
                Ok(())
            } else {
                Err(NvError::NotPresent)
            }
        }

        fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), NvError> {
            self.check_range(address, buf.len())?;
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self
                    .bytes
                    .get(address as usize + i)
                    .copied()
                    .unwrap_or(0xFF);
            }
            Ok(())
        }

        fn write(&mut self, address: u16, data: &[u8]) -> Result<(), NvError> {
            if self.fail_writes {
                return Err(NvError::Bus);
            }
            self.check_range(address, data.len())?;
            for (i, b) in data.iter().enumerate() {
                if let Some(slot) = self.bytes.get_mut(address as usize + i) {
                    *slot = *b;
                }
            }
            Ok(())
        }
    }

    pub(crate) fn loaded_store() -> PositionStore<RamMemory> {
        let mut store = PositionStore::new(RamMemory::new());
        store.init().unwrap();
        store.load().unwrap();
        store
    }

    #[test]
    fn test_record_layout() {
        let record = encode_slot(-2);
        assert_eq!(&record[0..2], &[0xFA, 0xFA]);
        assert_eq!(&record[2..6], &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(decode_slot(&record), SlotStatus::Valid(-2));
    }

    #[test]
    fn test_corrupt_checksum_detected() {
        let mut record = encode_slot(1234);
        record[4] ^= 0x01;
        assert_eq!(decode_slot(&record), SlotStatus::BadChecksum);
        record[0] = 0;
        assert_eq!(decode_slot(&record), SlotStatus::BadMagic);
    }

    #[test]
    fn test_empty_store_initializes_zero() {
        let mut store = PositionStore::new(RamMemory::new());
        store.init().unwrap();
        assert_eq!(store.load(), Ok(LoadOutcome::NoPriorData));

        let info = store.inspect().unwrap();
        assert_eq!(info.slot_a, SlotStatus::Valid(0));
        assert_eq!(info.slot_b, SlotStatus::Valid(0));
    }

    #[test]
    fn test_missing_memory() {
        let mut memory = RamMemory::new();
        memory.present = false;
        let mut store = PositionStore::new(memory);
        assert_eq!(store.init(), Err(StoreError::Memory(NvError::NotPresent)));
        assert_eq!(store.save(1), Err(StoreError::Uninitialized));
        assert_eq!(store.load(), Err(StoreError::Uninitialized));
    }

    #[test]
    fn test_save_requires_load() {
        let mut store = PositionStore::new(RamMemory::new());
        store.init().unwrap();
        assert_eq!(store.save(5), Err(StoreError::NotLoaded));
    }

    #[test]
    fn test_ping_pong() {
        let mut store = loaded_store();
        assert_eq!(store.save(10), Ok(Slot::A));
        assert_eq!(store.save(20), Ok(Slot::B));
        assert_eq!(store.save(30), Ok(Slot::A));

        let info = store.inspect().unwrap();
        assert_eq!(info.slot_a, SlotStatus::Valid(30));
        assert_eq!(info.slot_b, SlotStatus::Valid(20));
        assert_eq!(info.next_slot, Slot::B);
    }

    #[test]
    fn test_diverged_prefers_primary() {
        let mut store = loaded_store();
        store.save(111).unwrap();
        store.save(222).unwrap();

        let mut rebooted = PositionStore::new(store.memory);
        rebooted.init().unwrap();
        let outcome = rebooted.load().unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Diverged {
                primary: 111,
                backup: 222
            }
        );
        assert!(outcome.is_ambiguous());
        assert_eq!(outcome.position(), 111);
        // The primary holds the chosen value, so the backup is overwritten next
        assert_eq!(rebooted.next_slot(), Slot::B);
    }

    #[test]
    fn test_torn_write_falls_back_to_other_slot() {
        let mut store = loaded_store();
        store.save(500).unwrap();
        store.save(500).unwrap();
        // Tear slot A's position bytes
        store.memory_mut().bytes[3] ^= 0xFF;

        let mut rebooted = PositionStore::new(store.memory);
        rebooted.init().unwrap();
        assert_eq!(rebooted.load(), Ok(LoadOutcome::BackupOnly(500)));
        // Never overwrite the only good copy
        assert_eq!(rebooted.next_slot(), Slot::A);
    }

    #[test]
    fn test_failed_save_retries_same_slot() {
        let mut store = loaded_store();
        store.memory_mut().fail_writes = true;
        assert_eq!(store.save(7), Err(StoreError::Memory(NvError::Bus)));
        store.memory_mut().fail_writes = false;
        assert_eq!(store.save(7), Ok(Slot::A));
        assert_eq!(store.last_saved(), 7);
    }

    #[test]
    fn test_clear_idempotent() {
        let mut store = loaded_store();
        store.save(42).unwrap();

        store.clear().unwrap();
        let once = store.memory().bytes;
        let info_once = store.inspect().unwrap();

        store.clear().unwrap();
        assert_eq!(store.memory().bytes, once);
        assert_eq!(store.inspect().unwrap(), info_once);
        assert_eq!(info_once.slot_a, SlotStatus::BadMagic);
        assert_eq!(info_once.slot_b, SlotStatus::BadMagic);
    }

    #[test]
    fn test_raw_access() {
        let mut store = loaded_store();
        store.write_raw(0x20, 0xAB).unwrap();
        assert_eq!(store.read_raw(0x20), Ok(0xAB));
        assert_eq!(store.write_raw(0x8000, 1), Err(StoreError::AddressOutOfRange));

        let mut buf = [0u8; 16];
        store.read_range(0x0000, &mut buf).unwrap();
        assert_eq!(&buf[0..2], &[0xFA, 0xFA]);

        let mut too_long = [0u8; RAW_READ_MAX + 1];
        assert_eq!(
            store.read_range(0, &mut too_long),
            Err(StoreError::AddressOutOfRange)
        );
        let mut tail = [0u8; 2];
        assert_eq!(
            store.read_range(MAX_ADDRESS, &mut tail),
            Err(StoreError::AddressOutOfRange)
        );
    }

    proptest! {
        #[test]
        fn prop_save_then_load(position in any::<i32>()) {
            let mut store = loaded_store();
            store.save(position).unwrap();

            let mut rebooted = PositionStore::new(store.memory);
            rebooted.init().unwrap();
            prop_assert_eq!(rebooted.load().unwrap().position(), position);
        }
    }
}
