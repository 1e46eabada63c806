//! Addressing modes and effective-address resolution.

use super::{Cpu, CpuBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// JMP only. Reproduces the $xxFF page-wrap bug.
    Indirect,
    /// (zp,X)
    IndexedIndirect,
    /// (zp),Y
    IndirectIndexed,
    Relative,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> u8 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::IndexedIndirect
            | AddressingMode::IndirectIndexed
            | AddressingMode::Relative => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}

/// Where an instruction's operand lives once its addressing mode is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    Accumulator,
    /// Effective memory address. Immediate operands resolve to the address
    /// of the byte following the opcode.
    Memory { addr: u16, page_crossed: bool },
    /// Branch destination, already offset from the following instruction.
    Branch { target: u16, page_crossed: bool },
}

impl Operand {
    pub fn page_crossed(&self) -> bool {
        match *self {
            Operand::Memory { page_crossed, .. } | Operand::Branch { page_crossed, .. } => {
                page_crossed
            }
            _ => false,
        }
    }
}

fn read_word(bus: &mut dyn CpuBus, addr: u16) -> u16 {
    let low = bus.read(addr) as u16;
    let high = bus.read(addr.wrapping_add(1)) as u16;
    (high << 8) | low
}

/// Little-endian pointer stored in the zero page; the high byte wraps to $00.
fn read_zero_page_word(bus: &mut dyn CpuBus, zp: u8) -> u16 {
    let low = bus.read(zp as u16) as u16;
    let high = bus.read(zp.wrapping_add(1) as u16) as u16;
    (high << 8) | low
}

fn indexed(base: u16, index: u8) -> (u16, bool) {
    let addr = base.wrapping_add(index as u16);
    (addr, (base & 0xFF00) != (addr & 0xFF00))
}

impl Cpu {
    /// Resolves the operand of the instruction whose opcode sits at `pc`.
    ///
    /// Only reads the operand bytes and any pointers; registers are left
    /// untouched, so calling it twice against the same bus yields the same
    /// result.
    pub fn resolve(&self, bus: &mut dyn CpuBus, mode: AddressingMode, pc: u16) -> Operand {
        let operand_addr = pc.wrapping_add(1);
        match mode {
            AddressingMode::Implied => Operand::None,
            AddressingMode::Accumulator => Operand::Accumulator,
            AddressingMode::Immediate => Operand::Memory {
                addr: operand_addr,
                page_crossed: false,
            },
            AddressingMode::ZeroPage => Operand::Memory {
                addr: bus.read(operand_addr) as u16,
                page_crossed: false,
            },
            AddressingMode::ZeroPageX => Operand::Memory {
                addr: bus.read(operand_addr).wrapping_add(self.x) as u16,
                page_crossed: false,
            },
            AddressingMode::ZeroPageY => Operand::Memory {
                addr: bus.read(operand_addr).wrapping_add(self.y) as u16,
                page_crossed: false,
            },
            AddressingMode::Absolute => Operand::Memory {
                addr: read_word(bus, operand_addr),
                page_crossed: false,
            },
            AddressingMode::AbsoluteX => {
                let (addr, page_crossed) = indexed(read_word(bus, operand_addr), self.x);
                Operand::Memory { addr, page_crossed }
            }
            AddressingMode::AbsoluteY => {
                let (addr, page_crossed) = indexed(read_word(bus, operand_addr), self.y);
                Operand::Memory { addr, page_crossed }
            }
            AddressingMode::Indirect => {
                let vector = read_word(bus, operand_addr);
                let low = bus.read(vector) as u16;
                // The high byte never carries into the next page.
                let high_addr = (vector & 0xFF00) | (vector.wrapping_add(1) & 0x00FF);
                let high = bus.read(high_addr) as u16;
                Operand::Memory {
                    addr: (high << 8) | low,
                    page_crossed: false,
                }
            }
            AddressingMode::IndexedIndirect => {
                let zp = bus.read(operand_addr).wrapping_add(self.x);
                Operand::Memory {
                    addr: read_zero_page_word(bus, zp),
                    page_crossed: false,
                }
            }
            AddressingMode::IndirectIndexed => {
                let zp = bus.read(operand_addr);
                let (addr, page_crossed) = indexed(read_zero_page_word(bus, zp), self.y);
                Operand::Memory { addr, page_crossed }
            }
            AddressingMode::Relative => {
                let offset = bus.read(operand_addr) as i8;
                let next = pc.wrapping_add(2);
                let target = next.wrapping_add(offset as u16);
                Operand::Branch {
                    target,
                    page_crossed: (next & 0xFF00) != (target & 0xFF00),
                }
            }
        }
    }
}
