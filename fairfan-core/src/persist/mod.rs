//! Position persistence
//!
//! The main axis position is kept in two checksummed slots of a byte
//! addressed non-volatile memory and validated again at boot.

pub mod crc;
pub mod recovery;
pub mod store;

pub use crc::crc16_ccitt;
pub use recovery::{recover, RecoveryAction};
pub use store::{
    decode_slot, encode_slot, LoadOutcome, PositionStore, Slot, SlotStatus, StoreError,
    StoreInfo, MAGIC, MAX_ADDRESS, RAW_READ_MAX, SLOT_A_ADDR, SLOT_B_ADDR, SLOT_SIZE,
};
