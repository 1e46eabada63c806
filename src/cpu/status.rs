//! Processor status register.
//!
//! The flags live as named booleans. `StatusFlags` is only the packed
//! byte form used on the stack and in snapshots: bit 0 = C .. bit 7 = N,
//! with bit 5 always reading back as 1.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0b00000001;
        const ZERO = 0b00000010;
        const INTERRUPT_DISABLE = 0b00000100;
        const DECIMAL = 0b00001000;
        const BREAK = 0b00010000;
        const UNUSED = 0b00100000;
        const OVERFLOW = 0b01000000;
        const NEGATIVE = 0b10000000;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub carry: bool,
    pub zero: bool,
    pub interrupt_disable: bool,
    pub decimal: bool,
    pub break_command: bool,
    pub overflow: bool,
    pub negative: bool,
}

impl Status {
    pub fn from_byte(value: u8) -> Self {
        StatusFlags::from_bits_truncate(value).into()
    }

    /// Packs the flags into the canonical byte. Bit 5 is always set.
    pub fn to_byte(self) -> u8 {
        StatusFlags::from(self).bits()
    }

    pub fn set_zero_negative(&mut self, value: u8) {
        self.zero = value == 0;
        self.negative = value & 0x80 != 0;
    }

    // Short mnemonic views over the same fields.

    pub fn c(&self) -> bool {
        self.carry
    }

    pub fn z(&self) -> bool {
        self.zero
    }

    pub fn i(&self) -> bool {
        self.interrupt_disable
    }

    pub fn d(&self) -> bool {
        self.decimal
    }

    pub fn b(&self) -> bool {
        self.break_command
    }

    pub fn v(&self) -> bool {
        self.overflow
    }

    pub fn n(&self) -> bool {
        self.negative
    }

    pub fn set_c(&mut self, on: bool) {
        self.carry = on;
    }

    pub fn set_z(&mut self, on: bool) {
        self.zero = on;
    }

    pub fn set_i(&mut self, on: bool) {
        self.interrupt_disable = on;
    }

    pub fn set_d(&mut self, on: bool) {
        self.decimal = on;
    }

    pub fn set_b(&mut self, on: bool) {
        self.break_command = on;
    }

    pub fn set_v(&mut self, on: bool) {
        self.overflow = on;
    }

    pub fn set_n(&mut self, on: bool) {
        self.negative = on;
    }
}

impl From<StatusFlags> for Status {
    fn from(flags: StatusFlags) -> Self {
        Status {
            carry: flags.contains(StatusFlags::CARRY),
            zero: flags.contains(StatusFlags::ZERO),
            interrupt_disable: flags.contains(StatusFlags::INTERRUPT_DISABLE),
            decimal: flags.contains(StatusFlags::DECIMAL),
            break_command: flags.contains(StatusFlags::BREAK),
            overflow: flags.contains(StatusFlags::OVERFLOW),
            negative: flags.contains(StatusFlags::NEGATIVE),
        }
    }
}

impl From<Status> for StatusFlags {
    fn from(status: Status) -> Self {
        let mut flags = StatusFlags::UNUSED;
        flags.set(StatusFlags::CARRY, status.carry);
        flags.set(StatusFlags::ZERO, status.zero);
        flags.set(StatusFlags::INTERRUPT_DISABLE, status.interrupt_disable);
        flags.set(StatusFlags::DECIMAL, status.decimal);
        flags.set(StatusFlags::BREAK, status.break_command);
        flags.set(StatusFlags::OVERFLOW, status.overflow);
        flags.set(StatusFlags::NEGATIVE, status.negative);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_order() {
        let status = Status {
            carry: true,
            negative: true,
            ..Status::default()
        };
        assert_eq!(status.to_byte(), 0b1010_0001);

        let status = Status {
            zero: true,
            interrupt_disable: true,
            decimal: true,
            break_command: true,
            overflow: true,
            ..Status::default()
        };
        assert_eq!(status.to_byte(), 0b0111_1110);
    }

    #[test]
    fn test_unused_bit_is_not_a_flag() {
        assert_eq!(Status::from_byte(0x20), Status::default());
        assert_eq!(Status::from_byte(0x00).to_byte(), 0x20);
    }

    #[test]
    fn test_short_and_long_names_share_storage() {
        let mut status = Status::default();
        status.set_c(true);
        status.set_v(true);
        assert!(status.carry);
        assert!(status.overflow);

        status.negative = true;
        status.decimal = true;
        assert!(status.n());
        assert!(status.d());
        assert!(!status.z());
        assert!(!status.i());
        assert!(!status.b());
    }

    #[test]
    fn test_byte_round_trip_ignores_bit5() {
        for value in 0..=255u8 {
            assert_eq!(Status::from_byte(value).to_byte(), value | 0x20);
        }
    }
}
