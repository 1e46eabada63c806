use std::fmt;
use std::sync::Arc;

use crate::bus::{BusConfig, NesBus};
use crate::cartridge::Cartridge;
use crate::cpu::{Cpu, CpuError};
use crate::debug_flags;
use crate::disassembler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorError {
    /// `tick` was called before a cartridge was bound.
    NotInitialized,
    Cpu(CpuError),
}

impl fmt::Display for EmulatorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmulatorError::NotInitialized => write!(f, "no cartridge bound to the CPU bus"),
            EmulatorError::Cpu(err) => write!(f, "CPU halted: {}", err),
        }
    }
}

impl std::error::Error for EmulatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmulatorError::Cpu(err) => Some(err),
            EmulatorError::NotInitialized => None,
        }
    }
}

impl From<CpuError> for EmulatorError {
    fn from(err: CpuError) -> Self {
        EmulatorError::Cpu(err)
    }
}

/// Owns the CPU and, once a cartridge is bound, the bus it runs against.
pub struct Emulator {
    cpu: Cpu,
    bus: Option<NesBus>,
    bus_config: BusConfig,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        Self::with_bus_config(BusConfig::default())
    }

    pub fn with_bus_config(bus_config: BusConfig) -> Self {
        Emulator {
            cpu: Cpu::new(),
            bus: None,
            bus_config,
        }
    }

    /// Binds `cartridge` behind a fresh bus with work RAM and resets the CPU
    /// through the reset vector. Any previously bound cartridge is dropped.
    pub fn set_program(&mut self, cartridge: Arc<Cartridge>) {
        let mut bus = NesBus::with_work_ram(cartridge, self.bus_config);
        self.cpu.reset(&mut bus);
        log::debug!("CPU reset, PC=${:04X}", self.cpu.pc());
        self.bus = Some(bus);
    }

    /// Overrides the PC chosen by the reset vector.
    pub fn set_pc(&mut self, pc: u16) {
        self.cpu.set_pc(pc);
    }

    pub fn is_initialized(&self) -> bool {
        self.bus.is_some()
    }

    /// Executes one instruction and returns the cycles it took.
    pub fn tick(&mut self) -> Result<u8, EmulatorError> {
        let bus = self.bus.as_mut().ok_or(EmulatorError::NotInitialized)?;
        if debug_flags::trace_cpu() && log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", disassembler::trace_line(&self.cpu, bus));
        }
        Ok(self.cpu.step(bus)?)
    }

    /// Ticks up to `max_ticks` times and returns the cycles consumed.
    /// Stops at the first error, leaving the CPU on the faulting instruction.
    pub fn run(&mut self, max_ticks: u64) -> Result<u64, EmulatorError> {
        let mut cycles = 0u64;
        for _ in 0..max_ticks {
            match self.tick() {
                Ok(spent) => cycles += spent as u64,
                Err(err) => {
                    log::error!("Halting after {} cycles: {}", cycles, err);
                    return Err(err);
                }
            }
        }
        Ok(cycles)
    }

    pub fn nmi(&mut self) -> Result<(), EmulatorError> {
        let bus = self.bus.as_mut().ok_or(EmulatorError::NotInitialized)?;
        self.cpu.nmi(bus);
        Ok(())
    }

    pub fn irq(&mut self) -> Result<(), EmulatorError> {
        let bus = self.bus.as_mut().ok_or(EmulatorError::NotInitialized)?;
        self.cpu.irq(bus);
        Ok(())
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn bus(&self) -> Option<&NesBus> {
        self.bus.as_ref()
    }

    pub fn bus_mut(&mut self) -> Option<&mut NesBus> {
        self.bus.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{HEADER_LEN, PRG_BANK_LEN};
    use crate::cpu::CpuBus;

    // One 16 KiB bank: `program` at $C000 (mirrored at $8000), reset and
    // IRQ vectors pointing at it.
    fn cartridge(program: &[u8]) -> Arc<Cartridge> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 1, 0];
        data.resize(HEADER_LEN, 0);
        let mut prg = vec![0xEA; PRG_BANK_LEN];
        prg[..program.len()].copy_from_slice(program);
        prg[0x3FFC] = 0x00;
        prg[0x3FFD] = 0xC0;
        prg[0x3FFE] = 0x00;
        prg[0x3FFF] = 0xC1;
        data.extend(prg);
        Arc::new(Cartridge::load(data).unwrap())
    }

    #[test]
    fn test_tick_before_binding() {
        let mut emu = Emulator::new();
        assert!(!emu.is_initialized());
        assert_eq!(emu.tick(), Err(EmulatorError::NotInitialized));
        assert_eq!(emu.run(10), Err(EmulatorError::NotInitialized));
        assert_eq!(emu.nmi(), Err(EmulatorError::NotInitialized));
        assert_eq!(emu.cpu().pc(), 0);
    }

    #[test]
    fn test_set_program_resets_through_vector() {
        let mut emu = Emulator::new();
        emu.set_program(cartridge(&[]));
        let regs = emu.cpu().registers();
        assert_eq!(regs.pc, 0xC000);
        assert_eq!(regs.sp, 0xFD);
        assert_eq!(regs.p, 0x24);
        assert_eq!(emu.cpu().cycles(), 7);
    }

    #[test]
    fn test_runs_program_against_work_ram() {
        let program = [
            0xA2, 0x05, // LDX #$05
            0x8A, // TXA
            0x95, 0x10, // STA $10,X
            0xCA, // DEX
            0xD0, 0xFA, // BNE $C002
            0x02, // illegal
        ];
        let mut emu = Emulator::new();
        emu.set_program(cartridge(&program));

        let err = emu.run(100).unwrap_err();
        assert_eq!(
            err,
            EmulatorError::Cpu(CpuError::IllegalOpcode {
                addr: 0xC008,
                opcode: 0x02
            })
        );
        assert_eq!(emu.cpu().pc(), 0xC008);

        let bus = emu.bus_mut().unwrap();
        for x in 1..=5u16 {
            assert_eq!(bus.read(0x10 + x), x as u8);
            assert_eq!(bus.read(0x0810 + x), x as u8);
        }
    }

    #[test]
    fn test_run_returns_cycles() {
        let mut emu = Emulator::new();
        emu.set_program(cartridge(&[]));
        // Five NOPs from the filler
        assert_eq!(emu.run(5), Ok(10));
        assert_eq!(emu.cpu().pc(), 0xC005);
        assert_eq!(emu.cpu().cycles(), 17);
    }

    #[test]
    fn test_set_pc_overrides_reset_vector() {
        let mut emu = Emulator::new();
        emu.set_program(cartridge(&[0xA9, 0x7F]));
        emu.set_pc(0x8000);
        assert_eq!(emu.tick(), Ok(2));
        assert_eq!(emu.cpu().a(), 0x7F);
        assert_eq!(emu.cpu().pc(), 0x8002);
    }

    #[test]
    fn test_strict_rom_write_halts() {
        let config = BusConfig {
            strict_rom_writes: true,
        };
        let mut emu = Emulator::with_bus_config(config);
        emu.set_program(cartridge(&[0xA9, 0x01, 0x8D, 0x00, 0x80]));
        assert_eq!(
            emu.run(2),
            Err(EmulatorError::Cpu(CpuError::RomWrite {
                addr: 0x8000,
                value: 0x01
            }))
        );
    }

    #[test]
    fn test_nmi_enters_handler() {
        let mut emu = Emulator::new();
        let mut program = vec![0xEA; 0x3FFC];
        program[0x3FFA] = 0x00;
        program[0x3FFB] = 0xC2;
        emu.set_program(cartridge(&program));
        emu.nmi().unwrap();
        assert_eq!(emu.cpu().pc(), 0xC200);
        assert!(emu.cpu().status().i());
        assert_eq!(emu.cpu().sp(), 0xFA);
    }

    #[test]
    fn test_error_display() {
        let err = EmulatorError::from(CpuError::IllegalOpcode {
            addr: 0xC008,
            opcode: 0x02,
        });
        assert_eq!(err.to_string(), "CPU halted: illegal opcode 0x02 at $C008");
        assert_eq!(
            EmulatorError::NotInitialized.to_string(),
            "no cartridge bound to the CPU bus"
        );
    }
}
