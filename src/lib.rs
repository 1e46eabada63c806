//! MOS 6502 core for NES cartridges: iNES loading, a mapper-0 CPU bus, the
//! instruction engine and a disassembler sharing its decode table.

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod debug_flags;
pub mod disassembler;
pub mod emulator;
pub mod memory;

pub use bus::{BusConfig, BusHandler, NesBus};
pub use cartridge::{Cartridge, HeaderPolicy, LoadError, LoadOptions};
pub use cpu::{Cpu, CpuBus, CpuError, Registers, Status};
pub use emulator::{Emulator, EmulatorError};
