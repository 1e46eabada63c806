//! Cartridge images in the iNES layout.
//!
//! A `Cartridge` owns the raw image and hands out borrowed views of its
//! trainer, PRG banks and CHR banks. Offsets are computed from the header
//! and checked against the buffer once, at load time.

mod header;

use std::fmt;
use std::ops::Range;
use std::slice::ChunksExact;

pub use header::{
    CartridgeHeader, Mirroring, CHR_BANK_LEN, HEADER_LEN, PRG_BANK_LEN, TRAINER_LEN,
};

use crate::debug_flags;

/// What to do with header bits the format reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Reserved bits and trailing bytes are format errors.
    #[default]
    Strict,
    /// Reserved bits are masked off and trailing bytes ignored, with a warning.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    pub policy: HeaderPolicy,
}

impl LoadOptions {
    pub fn from_env() -> Self {
        LoadOptions::default().lenient_if(debug_flags::lenient_header())
    }

    /// Switches to the lenient policy when `on`. Never switches back to strict.
    pub fn lenient_if(self, on: bool) -> Self {
        if on {
            LoadOptions {
                policy: HeaderPolicy::Lenient,
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    BadMagic,
    NoProgramBanks,
    ReservedBits { offset: usize, value: u8 },
    TrailingData { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    InvalidFormat(FormatError),
    /// The buffer ends before the regions the header declares.
    TruncatedImage { expected: usize, actual: usize },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatError::BadMagic => write!(f, "missing \"NES\\x1A\" signature"),
            FormatError::NoProgramBanks => write!(f, "header declares no PRG ROM banks"),
            FormatError::ReservedBits { offset, value } => write!(
                f,
                "reserved header bits set at offset {}: 0x{:02X}",
                offset, value
            ),
            FormatError::TrailingData { expected, actual } => write!(
                f,
                "{} bytes after the declared {}-byte image",
                actual.saturating_sub(*expected),
                expected
            ),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::InvalidFormat(err) => write!(f, "invalid iNES image: {}", err),
            LoadError::TruncatedImage { expected, actual } => write!(
                f,
                "truncated iNES image: expected {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<FormatError> for LoadError {
    fn from(err: FormatError) -> Self {
        LoadError::InvalidFormat(err)
    }
}

#[derive(Debug)]
pub struct Cartridge {
    header: CartridgeHeader,
    data: Box<[u8]>,
    trainer: Option<Range<usize>>,
    prg: Range<usize>,
    chr: Range<usize>,
}

impl Cartridge {
    /// Loads an image with the default (strict) header policy.
    pub fn load(data: Vec<u8>) -> Result<Self, LoadError> {
        Self::load_with(data, LoadOptions::default())
    }

    /// Takes ownership of `data`; the bank views borrow from it without copying.
    pub fn load_with(data: Vec<u8>, options: LoadOptions) -> Result<Self, LoadError> {
        let header = CartridgeHeader::parse(&data, options.policy)?;

        let expected = header.expected_len();
        if data.len() < expected {
            return Err(LoadError::TruncatedImage {
                expected,
                actual: data.len(),
            });
        }
        if data.len() > expected {
            match options.policy {
                HeaderPolicy::Strict => {
                    return Err(FormatError::TrailingData {
                        expected,
                        actual: data.len(),
                    }
                    .into());
                }
                HeaderPolicy::Lenient => {
                    log::warn!(
                        "Ignoring {} trailing bytes after the declared {}-byte image",
                        data.len() - expected,
                        expected
                    );
                }
            }
        }

        let mut offset = HEADER_LEN;
        let trainer = header.has_trainer.then(|| {
            let range = offset..offset + TRAINER_LEN;
            offset = range.end;
            range
        });
        let prg = offset..offset + header.prg_len();
        let chr = prg.end..prg.end + header.chr_len();

        log::info!(
            "Cartridge loaded - Mapper: {}, PRG ROM: {} x 16KB, CHR ROM: {} x 8KB, trainer: {}, mirroring: {:?}",
            header.mapper,
            header.prg_banks,
            header.chr_banks,
            header.has_trainer,
            header.mirroring
        );

        Ok(Cartridge {
            header,
            data: data.into_boxed_slice(),
            trainer,
            prg,
            chr,
        })
    }

    /// Copies `bytes` once into an owned buffer, then loads it.
    pub fn from_slice(bytes: &[u8], options: LoadOptions) -> Result<Self, LoadError> {
        Self::load_with(bytes.to_vec(), options)
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn mapper_number(&self) -> u8 {
        self.header.mapper
    }

    pub fn mirroring(&self) -> Mirroring {
        self.header.mirroring
    }

    pub fn trainer(&self) -> Option<&[u8; TRAINER_LEN]> {
        let range = self.trainer.clone()?;
        self.data.get(range)?.try_into().ok()
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.data[self.prg.clone()]
    }

    pub fn chr_rom(&self) -> &[u8] {
        &self.data[self.chr.clone()]
    }

    pub fn prg_bank_count(&self) -> usize {
        self.header.prg_banks as usize
    }

    pub fn chr_bank_count(&self) -> usize {
        self.header.chr_banks as usize
    }

    pub fn prg_bank(&self, index: usize) -> Option<&[u8; PRG_BANK_LEN]> {
        bank(self.prg_rom(), index)
    }

    pub fn chr_bank(&self, index: usize) -> Option<&[u8; CHR_BANK_LEN]> {
        bank(self.chr_rom(), index)
    }

    pub fn prg_banks(&self) -> ChunksExact<'_, u8> {
        self.prg_rom().chunks_exact(PRG_BANK_LEN)
    }

    pub fn chr_banks(&self) -> ChunksExact<'_, u8> {
        self.chr_rom().chunks_exact(CHR_BANK_LEN)
    }
}

fn bank<const N: usize>(region: &[u8], index: usize) -> Option<&[u8; N]> {
    let start = index.checked_mul(N)?;
    let end = start.checked_add(N)?;
    region.get(start..end)?.try_into().ok()
}
