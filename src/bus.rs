use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::cartridge::{Cartridge, TRAINER_LEN};
use crate::cpu::CpuBus;
use crate::debug_flags;
use crate::memory::WorkRam;

pub const PRG_WINDOW_START: u16 = 0x8000;
pub const TRAINER_START: u16 = 0x7000;
const TRAINER_END: u16 = TRAINER_START + TRAINER_LEN as u16 - 1;

/// Value returned for reads nothing responds to.
pub const OPEN_BUS_VALUE: u8 = 0x00;

/// A device attached to an address range of the CPU bus (RAM, PPU/APU
/// registers, mapper registers).
///
/// Handlers are consulted before the cartridge. A handler that returns
/// `None` from `read` lets the access fall through to whatever is mapped
/// underneath, which is how a write-only mapper register can sit on top of
/// PRG ROM.
pub trait BusHandler {
    fn read(&mut self, addr: u16) -> Option<u8>;
    fn write(&mut self, addr: u16, data: u8);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusConfig {
    /// Latch writes into ROM as faults instead of dropping them.
    pub strict_rom_writes: bool,
}

impl BusConfig {
    pub fn from_env() -> Self {
        BusConfig {
            strict_rom_writes: debug_flags::strict_rom_writes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    Overlap {
        new: RangeInclusive<u16>,
        existing: RangeInclusive<u16>,
    },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MapError::Overlap { new, existing } => write!(
                f,
                "handler range ${:04X}-${:04X} overlaps ${:04X}-${:04X}",
                new.start(),
                new.end(),
                existing.start(),
                existing.end()
            ),
        }
    }
}

impl std::error::Error for MapError {}

struct Mapping {
    range: RangeInclusive<u16>,
    handler: Box<dyn BusHandler>,
}

/// CPU address space for a mapper-0 cartridge.
///
/// $8000-$FFFF is the 32 KiB PRG window. A single 16 KiB bank appears in
/// both halves; two banks map linearly. The trainer, when present, is
/// readable at $7000-$71FF. Everything else belongs to registered handlers
/// or reads as `OPEN_BUS_VALUE`.
pub struct NesBus {
    cartridge: Arc<Cartridge>,
    handlers: Vec<Mapping>,
    config: BusConfig,
    fault: Option<(u16, u8)>,
}

impl NesBus {
    pub fn new(cartridge: Arc<Cartridge>) -> Self {
        Self::with_config(cartridge, BusConfig::default())
    }

    pub fn with_config(cartridge: Arc<Cartridge>, config: BusConfig) -> Self {
        if cartridge.mapper_number() != 0 {
            log::warn!(
                "Mapper {} is not supported; using the mapper 0 layout",
                cartridge.mapper_number()
            );
        }
        if cartridge.prg_bank_count() > 2 {
            log::warn!(
                "{} PRG banks present; only the first two are visible without bank switching",
                cartridge.prg_bank_count()
            );
        }
        NesBus {
            cartridge,
            handlers: Vec::new(),
            config,
            fault: None,
        }
    }

    /// Bus with the console's work RAM already attached at $0000-$1FFF.
    pub fn with_work_ram(cartridge: Arc<Cartridge>, config: BusConfig) -> Self {
        let mut bus = Self::with_config(cartridge, config);
        bus.handlers.push(Mapping {
            range: WorkRam::START..=WorkRam::END,
            handler: Box::new(WorkRam::new()),
        });
        bus
    }

    /// Attaches `handler` to `range`. Ranges of different handlers may not overlap.
    pub fn map(
        &mut self,
        range: RangeInclusive<u16>,
        handler: Box<dyn BusHandler>,
    ) -> Result<(), MapError> {
        if let Some(existing) = self
            .handlers
            .iter()
            .find(|m| range.start() <= m.range.end() && m.range.start() <= range.end())
        {
            return Err(MapError::Overlap {
                new: range,
                existing: existing.range.clone(),
            });
        }
        log::debug!(
            "Mapped bus handler at ${:04X}-${:04X}",
            range.start(),
            range.end()
        );
        self.handlers.push(Mapping { range, handler });
        Ok(())
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    fn handler_for(&mut self, addr: u16) -> Option<&mut Mapping> {
        self.handlers.iter_mut().find(|m| m.range.contains(&addr))
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let prg = self.cartridge.prg_rom();
        if prg.is_empty() {
            return OPEN_BUS_VALUE;
        }
        let offset = (addr - PRG_WINDOW_START) as usize % prg.len();
        prg[offset]
    }

    fn read_trainer(&self, addr: u16) -> Option<u8> {
        let trainer = self.cartridge.trainer()?;
        trainer.get((addr - TRAINER_START) as usize).copied()
    }

    fn is_rom(&self, addr: u16) -> bool {
        match addr {
            PRG_WINDOW_START..=0xFFFF => true,
            TRAINER_START..=TRAINER_END => self.cartridge.trainer().is_some(),
            _ => false,
        }
    }
}

impl CpuBus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        if let Some(mapping) = self.handler_for(addr) {
            if let Some(value) = mapping.handler.read(addr) {
                return value;
            }
        }
        match addr {
            PRG_WINDOW_START..=0xFFFF => self.read_prg(addr),
            TRAINER_START..=TRAINER_END => self.read_trainer(addr).unwrap_or(OPEN_BUS_VALUE),
            _ => OPEN_BUS_VALUE,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        if let Some(mapping) = self.handler_for(addr) {
            mapping.handler.write(addr, data);
            return;
        }
        if self.is_rom(addr) {
            if self.config.strict_rom_writes {
                self.fault = Some((addr, data));
            } else {
                log::debug!("Ignoring write of 0x{:02X} to ROM at ${:04X}", data, addr);
            }
        } else {
            log::debug!("Ignoring write of 0x{:02X} to unmapped ${:04X}", data, addr);
        }
    }

    fn take_fault(&mut self) -> Option<(u16, u8)> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{HEADER_LEN, PRG_BANK_LEN};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cartridge(prg_banks: u8, trainer: bool) -> Arc<Cartridge> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, prg_banks, 0, if trainer { 0x04 } else { 0 }];
        data.resize(HEADER_LEN, 0);
        if trainer {
            data.extend((0..TRAINER_LEN).map(|i| (i as u8) ^ 0x5A));
        }
        for bank in 0..prg_banks as usize {
            data.extend((0..PRG_BANK_LEN).map(|i| (i as u8).wrapping_add(bank as u8 * 0x40)));
        }
        Arc::new(Cartridge::load(data).unwrap())
    }

    #[test]
    fn test_single_bank_is_mirrored() {
        let mut bus = NesBus::new(cartridge(1, false));
        for addr in [0x8000u16, 0x8001, 0x9234, 0xBFFF] {
            let low = bus.read(addr);
            let high = bus.read(addr + 0x4000);
            assert_eq!(low, high, "mirror mismatch at ${:04X}", addr);
        }
        assert_eq!(bus.read(0xC005), 0x05);
    }

    #[test]
    fn test_two_banks_are_linear() {
        let mut bus = NesBus::new(cartridge(2, false));
        assert_eq!(bus.read(0x8010), 0x10);
        assert_eq!(bus.read(0xC010), 0x50);
        assert_eq!(bus.read(0xFFFF), 0xFF_u8.wrapping_add(0x40));
    }

    #[test]
    fn test_unmapped_reads_are_zero() {
        let mut bus = NesBus::new(cartridge(1, false));
        assert_eq!(bus.read(0x0000), OPEN_BUS_VALUE);
        assert_eq!(bus.read(0x2002), OPEN_BUS_VALUE);
        assert_eq!(bus.read(0x7000), OPEN_BUS_VALUE);
        assert_eq!(OPEN_BUS_VALUE, 0x00);
    }

    #[test]
    fn test_rom_writes_are_ignored() {
        let mut bus = NesBus::new(cartridge(1, false));
        let before = bus.read(0x8123);
        bus.write(0x8123, before.wrapping_add(1));
        assert_eq!(bus.read(0x8123), before);
        assert_eq!(bus.take_fault(), None);
    }

    #[test]
    fn test_strict_rom_writes_latch_a_fault() {
        let config = BusConfig {
            strict_rom_writes: true,
        };
        let mut bus = NesBus::with_config(cartridge(1, false), config);
        bus.write(0x0200, 0x11);
        assert_eq!(bus.take_fault(), None);

        bus.write(0xC000, 0x22);
        assert_eq!(bus.take_fault(), Some((0xC000, 0x22)));
        assert_eq!(bus.take_fault(), None);
    }

    #[test]
    fn test_trainer_window() {
        let mut bus = NesBus::new(cartridge(1, true));
        assert_eq!(bus.read(0x7000), 0x5A);
        assert_eq!(bus.read(0x71FF), 0xFF ^ 0x5A);
        assert_eq!(bus.read(0x7200), OPEN_BUS_VALUE);
    }

    #[test]
    fn test_handlers_take_precedence() {
        let mut bus = NesBus::new(cartridge(1, false));
        bus.map(WorkRam::START..=WorkRam::END, Box::new(WorkRam::new()))
            .unwrap();

        bus.write(0x0010, 0xAB);
        assert_eq!(bus.read(0x0010), 0xAB);
        assert_eq!(bus.read(0x0810), 0xAB);
    }

    #[test]
    fn test_overlapping_handlers_are_rejected() {
        let mut bus = NesBus::new(cartridge(1, false));
        bus.map(0x0000..=0x1FFF, Box::new(WorkRam::new())).unwrap();
        let err = bus
            .map(0x1000..=0x2FFF, Box::new(WorkRam::new()))
            .unwrap_err();
        assert_eq!(
            err,
            MapError::Overlap {
                new: 0x1000..=0x2FFF,
                existing: 0x0000..=0x1FFF
            }
        );
        assert_eq!(
            err.to_string(),
            "handler range $1000-$2FFF overlaps $0000-$1FFF"
        );
    }

    struct BankRegister {
        last: Rc<RefCell<Option<(u16, u8)>>>,
    }

    impl BusHandler for BankRegister {
        fn read(&mut self, _addr: u16) -> Option<u8> {
            None
        }

        fn write(&mut self, addr: u16, data: u8) {
            *self.last.borrow_mut() = Some((addr, data));
        }
    }

    #[test]
    fn test_write_only_handler_over_rom() {
        let last = Rc::new(RefCell::new(None));
        let config = BusConfig {
            strict_rom_writes: true,
        };
        let mut bus = NesBus::with_config(cartridge(1, false), config);
        bus.map(
            0x8000..=0xFFFF,
            Box::new(BankRegister { last: last.clone() }),
        )
        .unwrap();

        bus.write(0x8000, 0x03);
        assert_eq!(*last.borrow(), Some((0x8000, 0x03)));
        assert_eq!(bus.take_fault(), None);
        assert_eq!(bus.read(0x8003), 0x03);
    }
}
