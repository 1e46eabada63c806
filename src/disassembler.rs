//! Static disassembly over the shared decode table.
//!
//! Unlike the executor, the disassembler never fails: a byte with no table
//! entry (or an instruction cut off by the end of the buffer) is emitted as
//! a single `.db $XX` line and decoding resumes at the next byte.

use std::fmt;

use crate::bus::PRG_WINDOW_START;
use crate::cartridge::Cartridge;
use crate::cpu::{opcodes, AddressingMode, Cpu, CpuBus, Opcode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u16,
    /// Opcode followed by its operand bytes; a lone byte for `.db` lines.
    pub bytes: Vec<u8>,
    pub opcode: Option<&'static Opcode>,
}

impl Instruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Assembly text without address or byte columns, e.g. `LDA ($40),Y`.
    pub fn text(&self) -> String {
        let Some(op) = self.opcode else {
            return format!(".db ${:02X}", self.bytes.first().copied().unwrap_or(0));
        };
        let name = op.mnemonic.name();
        let byte = self.bytes.get(1).copied().unwrap_or(0);
        let word = (self.bytes.get(2).copied().unwrap_or(0) as u16) << 8 | byte as u16;
        match op.mode {
            AddressingMode::Implied => name.to_string(),
            AddressingMode::Accumulator => format!("{} A", name),
            AddressingMode::Immediate => format!("{} #${:02X}", name, byte),
            AddressingMode::ZeroPage => format!("{} ${:02X}", name, byte),
            AddressingMode::ZeroPageX => format!("{} ${:02X},X", name, byte),
            AddressingMode::ZeroPageY => format!("{} ${:02X},Y", name, byte),
            AddressingMode::Absolute => format!("{} ${:04X}", name, word),
            AddressingMode::AbsoluteX => format!("{} ${:04X},X", name, word),
            AddressingMode::AbsoluteY => format!("{} ${:04X},Y", name, word),
            AddressingMode::Indirect => format!("{} (${:04X})", name, word),
            AddressingMode::IndexedIndirect => format!("{} (${:02X},X)", name, byte),
            AddressingMode::IndirectIndexed => format!("{} (${:02X}),Y", name, byte),
            AddressingMode::Relative => {
                let target = self
                    .address
                    .wrapping_add(2)
                    .wrapping_add(byte as i8 as u16);
                format!("{} ${:04X}", name, target)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hex: Vec<String> = self.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{:04X}  {:<8}  {}", self.address, hex.join(" "), self.text())
    }
}

/// Decodes the instruction at the start of `bytes`. `None` only for an empty slice.
pub fn decode(bytes: &[u8], address: u16) -> Option<Instruction> {
    let &first = bytes.first()?;
    let instruction = match opcodes::lookup(first) {
        Some(op) if bytes.len() >= op.len as usize => Instruction {
            address,
            bytes: bytes[..op.len as usize].to_vec(),
            opcode: Some(op),
        },
        _ => Instruction {
            address,
            bytes: vec![first],
            opcode: None,
        },
    };
    Some(instruction)
}

pub fn disassemble(bytes: &[u8], origin: u16) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut offset = 0;
    while let Some(instruction) = decode(&bytes[offset..], origin.wrapping_add(offset as u16)) {
        offset += instruction.len();
        out.push(instruction);
    }
    out
}

/// Lists the whole PRG ROM as it appears from $8000.
pub fn program_listing(cartridge: &Cartridge) -> Vec<Instruction> {
    disassemble(cartridge.prg_rom(), PRG_WINDOW_START)
}

/// One trace line for the instruction at the CPU's PC, followed by the
/// register state before it executes.
pub fn trace_line(cpu: &Cpu, bus: &mut dyn CpuBus) -> String {
    let pc = cpu.pc();
    let window: Vec<u8> = (0..3u16).map(|i| bus.read(pc.wrapping_add(i))).collect();
    let text = decode(&window, pc)
        .map(|instruction| instruction.to_string())
        .unwrap_or_default();
    let regs = cpu.registers();
    format!(
        "{:<40}A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
        text,
        regs.a,
        regs.x,
        regs.y,
        regs.p,
        regs.sp,
        cpu.cycles()
    )
}
