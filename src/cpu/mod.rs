pub mod addressing;
pub mod opcodes;
pub mod registers;
pub mod status;

use std::fmt;

pub use addressing::{AddressingMode, Operand};
pub use opcodes::{Mnemonic, Opcode, OPCODE_TABLE};
pub use registers::Registers;
pub use status::{Status, StatusFlags};


const STACK_PAGE: u16 = 0x0100;
const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Minimal bus interface the 6502 core needs.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Reports (and clears) a write the bus refused to absorb silently.
    fn take_fault(&mut self) -> Option<(u16, u8)> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// The byte at `addr` has no entry in the decode table. PC is left on it.
    IllegalOpcode { addr: u16, opcode: u8 },
    /// A strict bus rejected a write into read-only memory.
    RomWrite { addr: u16, value: u8 },
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CpuError::IllegalOpcode { addr, opcode } => {
                write!(f, "illegal opcode 0x{:02X} at ${:04X}", opcode, addr)
            }
            CpuError::RomWrite { addr, value } => {
                write!(f, "write of 0x{:02X} to read-only ${:04X}", value, addr)
            }
        }
    }
}

impl std::error::Error for CpuError {}

pub struct Cpu {
    pc: u16,
    sp: u8,
    a: u8,
    x: u8,
    y: u8,
    status: Status,
    cycles: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            pc: 0,
            sp: 0xFD,
            a: 0,
            x: 0,
            y: 0,
            status: Status::from_byte(0x24),
            cycles: 0,
        }
    }

    pub fn reset(&mut self, bus: &mut dyn CpuBus) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status = Status::from_byte(0x24);
        self.pc = read_vector(bus, RESET_VECTOR);
        self.cycles = 7;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn registers(&self) -> Registers {
        Registers {
            pc: self.pc,
            sp: self.sp,
            a: self.a,
            x: self.x,
            y: self.y,
            p: self.status.to_byte(),
        }
    }

    /// Decodes the instruction at `addr` without executing it.
    pub fn decode(
        &self,
        bus: &mut dyn CpuBus,
        addr: u16,
    ) -> Result<(&'static Opcode, Operand), CpuError> {
        let opcode = bus.read(addr);
        let entry = opcodes::lookup(opcode).ok_or(CpuError::IllegalOpcode { addr, opcode })?;
        Ok((entry, self.resolve(bus, entry.mode, addr)))
    }

    /// Executes one instruction and returns the cycles it consumed.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> Result<u8, CpuError> {
        let (entry, operand) = self.decode(bus, self.pc)?;

        self.pc = self.pc.wrapping_add(entry.len as u16);
        let mut cycles = entry.cycles + self.execute(bus, entry.mnemonic, operand);
        if entry.page_penalty && operand.page_crossed() {
            cycles += 1;
        }
        self.cycles += cycles as u64;

        if let Some((addr, value)) = bus.take_fault() {
            return Err(CpuError::RomWrite { addr, value });
        }
        Ok(cycles)
    }

    pub fn nmi(&mut self, bus: &mut dyn CpuBus) {
        self.interrupt(bus, NMI_VECTOR);
    }

    /// Maskable; ignored while I is set.
    pub fn irq(&mut self, bus: &mut dyn CpuBus) {
        if self.status.interrupt_disable {
            return;
        }
        self.interrupt(bus, IRQ_VECTOR);
    }

    fn interrupt(&mut self, bus: &mut dyn CpuBus, vector: u16) {
        self.push_word(bus, self.pc);
        self.push(bus, self.status.to_byte() & !StatusFlags::BREAK.bits());
        self.status.interrupt_disable = true;
        self.pc = read_vector(bus, vector);
        self.cycles += 7;
    }

    /// Runs the instruction semantics. Returns extra cycles beyond the
    /// table's base count (branches only).
    fn execute(&mut self, bus: &mut dyn CpuBus, mnemonic: Mnemonic, operand: Operand) -> u8 {
        match mnemonic {
            Mnemonic::Lda => {
                self.a = self.load(bus, operand);
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Ldx => {
                self.x = self.load(bus, operand);
                self.status.set_zero_negative(self.x);
            }
            Mnemonic::Ldy => {
                self.y = self.load(bus, operand);
                self.status.set_zero_negative(self.y);
            }
            Mnemonic::Sta => self.store(bus, operand, self.a),
            Mnemonic::Stx => self.store(bus, operand, self.x),
            Mnemonic::Sty => self.store(bus, operand, self.y),

            Mnemonic::Adc => {
                let value = self.load(bus, operand);
                self.adc(value);
            }
            Mnemonic::Sbc => {
                let value = self.load(bus, operand);
                self.sbc(value);
            }
            Mnemonic::And => {
                self.a &= self.load(bus, operand);
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Ora => {
                self.a |= self.load(bus, operand);
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Eor => {
                self.a ^= self.load(bus, operand);
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Bit => {
                let value = self.load(bus, operand);
                self.status.zero = self.a & value == 0;
                self.status.overflow = value & 0x40 != 0;
                self.status.negative = value & 0x80 != 0;
            }
            Mnemonic::Cmp => {
                let value = self.load(bus, operand);
                self.compare(self.a, value);
            }
            Mnemonic::Cpx => {
                let value = self.load(bus, operand);
                self.compare(self.x, value);
            }
            Mnemonic::Cpy => {
                let value = self.load(bus, operand);
                self.compare(self.y, value);
            }

            Mnemonic::Asl => self.modify(bus, operand, Self::asl),
            Mnemonic::Lsr => self.modify(bus, operand, Self::lsr),
            Mnemonic::Rol => self.modify(bus, operand, Self::rol),
            Mnemonic::Ror => self.modify(bus, operand, Self::ror),
            Mnemonic::Inc => self.modify(bus, operand, |cpu, value| {
                let result = value.wrapping_add(1);
                cpu.status.set_zero_negative(result);
                result
            }),
            Mnemonic::Dec => self.modify(bus, operand, |cpu, value| {
                let result = value.wrapping_sub(1);
                cpu.status.set_zero_negative(result);
                result
            }),

            Mnemonic::Inx => {
                self.x = self.x.wrapping_add(1);
                self.status.set_zero_negative(self.x);
            }
            Mnemonic::Iny => {
                self.y = self.y.wrapping_add(1);
                self.status.set_zero_negative(self.y);
            }
            Mnemonic::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.status.set_zero_negative(self.x);
            }
            Mnemonic::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.status.set_zero_negative(self.y);
            }

            Mnemonic::Tax => {
                self.x = self.a;
                self.status.set_zero_negative(self.x);
            }
            Mnemonic::Tay => {
                self.y = self.a;
                self.status.set_zero_negative(self.y);
            }
            Mnemonic::Txa => {
                self.a = self.x;
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Tya => {
                self.a = self.y;
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Tsx => {
                self.x = self.sp;
                self.status.set_zero_negative(self.x);
            }
            Mnemonic::Txs => self.sp = self.x,

            Mnemonic::Pha => self.push(bus, self.a),
            Mnemonic::Php => {
                let value = self.status.to_byte() | StatusFlags::BREAK.bits();
                self.push(bus, value);
            }
            Mnemonic::Pla => {
                self.a = self.pull(bus);
                self.status.set_zero_negative(self.a);
            }
            Mnemonic::Plp => {
                let value = self.pull(bus);
                self.restore_status(value);
            }

            Mnemonic::Bcc => return self.branch(operand, !self.status.carry),
            Mnemonic::Bcs => return self.branch(operand, self.status.carry),
            Mnemonic::Bne => return self.branch(operand, !self.status.zero),
            Mnemonic::Beq => return self.branch(operand, self.status.zero),
            Mnemonic::Bpl => return self.branch(operand, !self.status.negative),
            Mnemonic::Bmi => return self.branch(operand, self.status.negative),
            Mnemonic::Bvc => return self.branch(operand, !self.status.overflow),
            Mnemonic::Bvs => return self.branch(operand, self.status.overflow),

            Mnemonic::Jmp => {
                if let Operand::Memory { addr, .. } = operand {
                    self.pc = addr;
                }
            }
            Mnemonic::Jsr => {
                if let Operand::Memory { addr, .. } = operand {
                    // Return address is the last byte of the JSR itself.
                    let return_addr = self.pc.wrapping_sub(1);
                    self.push_word(bus, return_addr);
                    self.pc = addr;
                }
            }
            Mnemonic::Rts => {
                self.pc = self.pull_word(bus).wrapping_add(1);
            }
            Mnemonic::Rti => {
                let value = self.pull(bus);
                self.restore_status(value);
                self.pc = self.pull_word(bus);
            }
            Mnemonic::Brk => {
                // BRK skips a padding byte after the opcode.
                let return_pc = self.pc.wrapping_add(1);
                self.push_word(bus, return_pc);
                self.push(bus, self.status.to_byte() | StatusFlags::BREAK.bits());
                self.status.interrupt_disable = true;
                self.pc = read_vector(bus, IRQ_VECTOR);
            }

            Mnemonic::Clc => self.status.carry = false,
            Mnemonic::Sec => self.status.carry = true,
            Mnemonic::Cli => self.status.interrupt_disable = false,
            Mnemonic::Sei => self.status.interrupt_disable = true,
            Mnemonic::Cld => self.status.decimal = false,
            Mnemonic::Sed => self.status.decimal = true,
            Mnemonic::Clv => self.status.overflow = false,

            Mnemonic::Nop => {}
        }
        0
    }

    fn load(&self, bus: &mut dyn CpuBus, operand: Operand) -> u8 {
        match operand {
            Operand::Memory { addr, .. } => bus.read(addr),
            Operand::Accumulator => self.a,
            _ => 0,
        }
    }

    fn store(&self, bus: &mut dyn CpuBus, operand: Operand, value: u8) {
        if let Operand::Memory { addr, .. } = operand {
            bus.write(addr, value);
        }
    }

    /// Read-modify-write on either the accumulator or memory.
    fn modify(&mut self, bus: &mut dyn CpuBus, operand: Operand, op: impl FnOnce(&mut Self, u8) -> u8) {
        match operand {
            Operand::Accumulator => {
                let value = self.a;
                self.a = op(self, value);
            }
            Operand::Memory { addr, .. } => {
                let value = bus.read(addr);
                let result = op(self, value);
                bus.write(addr, result);
            }
            _ => {}
        }
    }

    fn branch(&mut self, operand: Operand, condition: bool) -> u8 {
        match operand {
            Operand::Branch { target, page_crossed } if condition => {
                self.pc = target;
                if page_crossed {
                    2
                } else {
                    1
                }
            }
            _ => 0,
        }
    }

    // Decimal mode is wired off on the NES CPU; D never changes the result.
    fn adc(&mut self, value: u8) {
        let carry = self.status.carry as u16;
        let result = self.a as u16 + value as u16 + carry;

        self.status.carry = result > 0xFF;
        self.status.overflow = (self.a ^ result as u8) & (value ^ result as u8) & 0x80 != 0;

        self.a = result as u8;
        self.status.set_zero_negative(self.a);
    }

    fn sbc(&mut self, value: u8) {
        // SBC is ADC with the one's complement of the operand
        self.adc(!value);
    }

    fn compare(&mut self, reg: u8, value: u8) {
        let result = reg.wrapping_sub(value);
        self.status.carry = reg >= value;
        self.status.set_zero_negative(result);
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.status.carry = value & 0x80 != 0;
        let result = value << 1;
        self.status.set_zero_negative(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.status.carry = value & 0x01 != 0;
        let result = value >> 1;
        self.status.set_zero_negative(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry = self.status.carry as u8;
        self.status.carry = value & 0x80 != 0;
        let result = (value << 1) | carry;
        self.status.set_zero_negative(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry = if self.status.carry { 0x80 } else { 0 };
        self.status.carry = value & 0x01 != 0;
        let result = (value >> 1) | carry;
        self.status.set_zero_negative(result);
        result
    }

    /// PLP/RTI: B is not a physical latch, so it keeps its current value.
    /// B only exists in pushed copies; the live register never holds it.
    fn restore_status(&mut self, value: u8) {
        self.status = Status::from_byte(value);
        self.status.break_command = false;
    }

    fn push(&mut self, bus: &mut dyn CpuBus, value: u8) {
        bus.write(STACK_PAGE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut dyn CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_PAGE | self.sp as u16)
    }

    fn push_word(&mut self, bus: &mut dyn CpuBus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pull_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = self.pull(bus) as u16;
        let high = self.pull(bus) as u16;
        (high << 8) | low
    }
}

fn read_vector(bus: &mut dyn CpuBus, vector: u16) -> u16 {
    let low = bus.read(vector) as u16;
    let high = bus.read(vector.wrapping_add(1)) as u16;
    (high << 8) | low
}
