use serde::{Deserialize, Serialize};

use super::status::Status;

/// Point-in-time copy of the programmer-visible registers.
///
/// `p` is the packed status byte (bit 0 = C .. bit 7 = N, bit 5 set), so the
/// serialized form does not depend on how `Status` is laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
}

impl Registers {
    pub fn status(&self) -> Status {
        Status::from_byte(self.p)
    }
}
