//! iNES header.
//!
//! Layout of the 16-byte record:
//!
//! | Byte | Contents |
//! |------|----------|
//! | 0-3  | `"NES"` followed by `0x1A` |
//! | 4    | PRG ROM size in 16 KiB banks |
//! | 5    | CHR ROM size in 8 KiB banks (0 means CHR RAM) |
//! | 6    | mirroring, battery RAM, trainer, four-screen, mapper low nibble |
//! | 7    | VS system, 3 reserved bits, mapper high nibble |
//! | 8    | RAM size in 8 KiB banks (0 means 1) |
//! | 9    | PAL bit, 7 reserved bits |
//! | 10-14| reserved, must be zero |
//! | 15   | padding, ignored |

use serde::{Deserialize, Serialize};

use super::{FormatError, HeaderPolicy, LoadError};

pub const HEADER_LEN: usize = 16;
pub const TRAINER_LEN: usize = 512;
pub const PRG_BANK_LEN: usize = 16 * 1024;
pub const CHR_BANK_LEN: usize = 8 * 1024;

const MAGIC: [u8; 4] = *b"NES\x1A";

const FLAGS7_RESERVED: u8 = 0b0000_1110;
const FLAGS9_RESERVED: u8 = 0b1111_1110;
const RESERVED_BYTES: std::ops::Range<usize> = 10..15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeHeader {
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub mirroring: Mirroring,
    pub battery_backed_ram: bool,
    pub has_trainer: bool,
    pub vs_system: bool,
    pub mapper: u8,
    /// Already adjusted: a zero byte in the image reads as one bank.
    pub ram_banks: u8,
    pub pal: bool,
}

impl CartridgeHeader {
    pub fn parse(data: &[u8], policy: HeaderPolicy) -> Result<Self, LoadError> {
        let magic_len = data.len().min(MAGIC.len());
        if data[..magic_len] != MAGIC[..magic_len] {
            return Err(LoadError::InvalidFormat(FormatError::BadMagic));
        }
        if data.len() < HEADER_LEN {
            return Err(LoadError::TruncatedImage {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        let flags6 = data[6];
        let mut flags7 = data[7];
        let mut flags9 = data[9];

        let reserved = [
            (7, flags7 & FLAGS7_RESERVED),
            (9, flags9 & FLAGS9_RESERVED),
        ]
        .into_iter()
        .chain(RESERVED_BYTES.map(|offset| (offset, data[offset])))
        .filter(|&(_, value)| value != 0);

        for (offset, value) in reserved {
            match policy {
                HeaderPolicy::Strict => {
                    return Err(LoadError::InvalidFormat(FormatError::ReservedBits {
                        offset,
                        value,
                    }));
                }
                HeaderPolicy::Lenient => {
                    log::warn!(
                        "Ignoring reserved header bits 0x{:02X} at offset {}",
                        value,
                        offset
                    );
                }
            }
        }
        flags7 &= !FLAGS7_RESERVED;
        flags9 &= !FLAGS9_RESERVED;

        let prg_banks = data[4];
        if prg_banks == 0 {
            return Err(LoadError::InvalidFormat(FormatError::NoProgramBanks));
        }

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        Ok(CartridgeHeader {
            prg_banks,
            chr_banks: data[5],
            mirroring,
            battery_backed_ram: flags6 & 0x02 != 0,
            has_trainer: flags6 & 0x04 != 0,
            vs_system: flags7 & 0x01 != 0,
            mapper: (flags7 & 0xF0) | (flags6 >> 4),
            ram_banks: data[8].max(1),
            pal: flags9 & 0x01 != 0,
        })
    }

    pub fn trainer_len(&self) -> usize {
        if self.has_trainer {
            TRAINER_LEN
        } else {
            0
        }
    }

    pub fn prg_len(&self) -> usize {
        self.prg_banks as usize * PRG_BANK_LEN
    }

    pub fn chr_len(&self) -> usize {
        self.chr_banks as usize * CHR_BANK_LEN
    }

    /// Size of a well-formed image described by this header.
    pub fn expected_len(&self) -> usize {
        HEADER_LEN + self.trainer_len() + self.prg_len() + self.chr_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bytes: [u8; 12]) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&MAGIC);
        out[4..].copy_from_slice(&bytes);
        out
    }

    #[test]
    fn test_parse_fields() {
        let raw = header([2, 1, 0b0101_0111, 0b0011_0001, 0, 1, 0, 0, 0, 0, 0, 0]);
        let parsed = CartridgeHeader::parse(&raw, HeaderPolicy::Strict).unwrap();

        assert_eq!(parsed.prg_banks, 2);
        assert_eq!(parsed.chr_banks, 1);
        assert_eq!(parsed.mirroring, Mirroring::Vertical);
        assert!(parsed.battery_backed_ram);
        assert!(parsed.has_trainer);
        assert!(parsed.vs_system);
        assert_eq!(parsed.mapper, 0x35);
        assert_eq!(parsed.ram_banks, 1);
        assert!(parsed.pal);
        assert_eq!(parsed.expected_len(), 16 + 512 + 2 * 16384 + 8192);
    }

    #[test]
    fn test_four_screen_wins_over_vertical() {
        let raw = header([1, 0, 0b0000_1001, 0, 3, 0, 0, 0, 0, 0, 0, 0]);
        let parsed = CartridgeHeader::parse(&raw, HeaderPolicy::Strict).unwrap();
        assert_eq!(parsed.mirroring, Mirroring::FourScreen);
        assert_eq!(parsed.ram_banks, 3);
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = header([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        raw[3] = 0x1B;
        assert_eq!(
            CartridgeHeader::parse(&raw, HeaderPolicy::Lenient),
            Err(LoadError::InvalidFormat(FormatError::BadMagic))
        );
        assert_eq!(
            CartridgeHeader::parse(b"NEZ", HeaderPolicy::Strict),
            Err(LoadError::InvalidFormat(FormatError::BadMagic))
        );
    }

    #[test]
    fn test_short_header_is_truncated() {
        assert_eq!(
            CartridgeHeader::parse(b"NES\x1A\x01", HeaderPolicy::Strict),
            Err(LoadError::TruncatedImage {
                expected: HEADER_LEN,
                actual: 5
            })
        );
    }

    #[test]
    fn test_strict_rejects_reserved_bits() {
        let raw = header([1, 0, 0, 0b0000_0100, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            CartridgeHeader::parse(&raw, HeaderPolicy::Strict),
            Err(LoadError::InvalidFormat(FormatError::ReservedBits {
                offset: 7,
                value: 0x04
            }))
        );

        let raw = header([1, 0, 0, 0, 0, 0x80, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            CartridgeHeader::parse(&raw, HeaderPolicy::Strict),
            Err(LoadError::InvalidFormat(FormatError::ReservedBits {
                offset: 9,
                value: 0x80
            }))
        );

        let raw = header([1, 0, 0, 0, 0, 0, 0, 0, b'D', 0, 0, 0]);
        assert_eq!(
            CartridgeHeader::parse(&raw, HeaderPolicy::Strict),
            Err(LoadError::InvalidFormat(FormatError::ReservedBits {
                offset: 12,
                value: b'D'
            }))
        );
    }

    #[test]
    fn test_padding_byte_is_not_checked() {
        let raw = header([1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF]);
        assert!(CartridgeHeader::parse(&raw, HeaderPolicy::Strict).is_ok());
    }

    #[test]
    fn test_lenient_masks_reserved_bits() {
        let raw = header([1, 0, 0x10, 0b0010_1111, 0, 0xFF, 1, 2, 3, 4, 5, 0]);
        let parsed = CartridgeHeader::parse(&raw, HeaderPolicy::Lenient).unwrap();
        assert_eq!(parsed.mapper, 0x21);
        assert!(parsed.vs_system);
        assert!(parsed.pal);
    }

    #[test]
    fn test_zero_program_banks() {
        let raw = header([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            CartridgeHeader::parse(&raw, HeaderPolicy::Strict),
            Err(LoadError::InvalidFormat(FormatError::NoProgramBanks))
        );
    }
}
