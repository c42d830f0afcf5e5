//! The instruction set: decoding, encoding, and the flag words used by LOAD/STORE/JUMP (§4.D).
//!
//! Execution itself lives in [`crate::cpu`], which dispatches on the decoded [`Instruction`]
//! variant — a flat sum type rather than a polymorphic instruction-descriptor hierarchy, so
//! dispatch is a `match` on an opcode-derived tag instead of dynamic dispatch.

use crate::bits::{self, opcode};
use crate::error::Fault;

/// A fully decoded instruction. Every three-register ALU form has already had its destination
/// register extracted from `data >> 11` at decode time; [`Instruction::encode`] puts it back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    /// No-op.
    Nop,
    /// Clear `RUNNING`.
    Halt,
    /// `r3 <- r1 + r2 mod 2^32`; sets `OVERFLOW` iff the unsigned sum is `>= 2^32`.
    Add { r1: u8, r2: u8, r3: u8 },
    /// `r3 <- r1 - r2 mod 2^32`; sets `OVERFLOW` iff `r1 < r2` as unsigned.
    Sub { r1: u8, r2: u8, r3: u8 },
    /// `r3 <- r1 << (r2 & 0x1F)` (logical).
    LShift { r1: u8, r2: u8, r3: u8 },
    /// `r3 <- r1 >> (r2 & 0x1F)` (logical).
    RShift { r1: u8, r2: u8, r3: u8 },
    /// `comp_reg[c] <- (r1 == r2)`.
    Comp { r1: u8, r2: u8, c: u8 },
    /// `comp_reg[c] <- (r1 > r2)` (unsigned).
    CompGrt { r1: u8, r2: u8, c: u8 },
    /// `comp_reg[c] <- (r1 < r2)` (unsigned).
    CompLst { r1: u8, r2: u8, c: u8 },
    /// Copy a word or half-word from memory (or the instruction itself) into `reg`.
    Load {
        reg: u8,
        addr: u16,
        flags: CopyFlags,
    },
    /// Copy a word or half-word from `reg` (or the instruction itself) into memory.
    Store {
        reg: u8,
        addr: u16,
        flags: CopyFlags,
    },
    /// Conditionally offset the program counter.
    Jump {
        c: u8,
        amount: u16,
        flags: JumpFlags,
    },
    /// Emit a diagnostic line describing two registers and a memory word.
    Print { r1: u8, r2: u8, addr: u16 },
}

impl Instruction {
    /// Decodes a raw 32-bit instruction word per the bit layout in [`crate::bits`].
    ///
    /// Returns [`Fault::DecodingError`] if the opcode is not one of the recognized instructions.
    pub fn decode(word: u32) -> Result<Self, Fault> {
        let op = bits::OPCODE.get(word);
        let arg1 = bits::ARG1.get(word) as u8;
        let arg2 = bits::ARG2.get(word) as u8;
        let data = bits::DATA.get(word);
        let reg3 = (data >> bits::THIRD_REGISTER_SHIFT) as u8;

        Ok(match op {
            opcode::NOP => Instruction::Nop,
            opcode::HALT => Instruction::Halt,
            opcode::ADD => Instruction::Add {
                r1: arg1,
                r2: arg2,
                r3: reg3,
            },
            opcode::SUB => Instruction::Sub {
                r1: arg1,
                r2: arg2,
                r3: reg3,
            },
            opcode::LSHIFT => Instruction::LShift {
                r1: arg1,
                r2: arg2,
                r3: reg3,
            },
            opcode::RSHIFT => Instruction::RShift {
                r1: arg1,
                r2: arg2,
                r3: reg3,
            },
            opcode::COMP => Instruction::Comp {
                r1: arg1,
                r2: arg2,
                c: reg3,
            },
            opcode::COMPGRT => Instruction::CompGrt {
                r1: arg1,
                r2: arg2,
                c: reg3,
            },
            opcode::COMPLST => Instruction::CompLst {
                r1: arg1,
                r2: arg2,
                c: reg3,
            },
            opcode::LOAD => Instruction::Load {
                reg: arg1,
                addr: data as u16,
                flags: CopyFlags::from_bits(arg2),
            },
            opcode::STORE => Instruction::Store {
                reg: arg1,
                addr: data as u16,
                flags: CopyFlags::from_bits(arg2),
            },
            opcode::JUMP => Instruction::Jump {
                c: arg1,
                amount: data as u16,
                flags: JumpFlags::from_bits(arg2),
            },
            opcode::PRINT => Instruction::Print {
                r1: arg1,
                r2: arg2,
                addr: data as u16,
            },
            other => return Err(Fault::DecodingError { opcode: other }),
        })
    }

    /// Re-encodes this instruction back into a raw 32-bit word. Round-trips with
    /// [`Instruction::decode`] for every instruction and every valid argument tuple (§8).
    pub fn encode(&self) -> u32 {
        match *self {
            Instruction::Nop => encode_reg(opcode::NOP, 0, 0, 0),
            Instruction::Halt => encode_reg(opcode::HALT, 0, 0, 0),
            Instruction::Add { r1, r2, r3 } => encode_reg(opcode::ADD, r1, r2, r3),
            Instruction::Sub { r1, r2, r3 } => encode_reg(opcode::SUB, r1, r2, r3),
            Instruction::LShift { r1, r2, r3 } => encode_reg(opcode::LSHIFT, r1, r2, r3),
            Instruction::RShift { r1, r2, r3 } => encode_reg(opcode::RSHIFT, r1, r2, r3),
            Instruction::Comp { r1, r2, c } => encode_reg(opcode::COMP, r1, r2, c),
            Instruction::CompGrt { r1, r2, c } => encode_reg(opcode::COMPGRT, r1, r2, c),
            Instruction::CompLst { r1, r2, c } => encode_reg(opcode::COMPLST, r1, r2, c),
            Instruction::Load { reg, addr, flags } => {
                encode_data(opcode::LOAD, reg as u32, flags.bits() as u32, addr as u32)
            }
            Instruction::Store { reg, addr, flags } => {
                encode_data(opcode::STORE, reg as u32, flags.bits() as u32, addr as u32)
            }
            Instruction::Jump { c, amount, flags } => {
                encode_data(opcode::JUMP, c as u32, flags.bits() as u32, amount as u32)
            }
            Instruction::Print { r1, r2, addr } => {
                encode_data(opcode::PRINT, r1 as u32, r2 as u32, addr as u32)
            }
        }
    }
}

fn encode_data(op: u32, arg1: u32, arg2: u32, data: u32) -> u32 {
    let word = bits::OPCODE.set(0, op);
    let word = bits::ARG1.set(word, arg1);
    let word = bits::ARG2.set(word, arg2);
    bits::DATA.set(word, data)
}

fn encode_reg(op: u32, arg1: u8, arg2: u8, arg3: u8) -> u32 {
    encode_data(op, arg1 as u32, arg2 as u32, (arg3 as u32) << bits::THIRD_REGISTER_SHIFT)
}

/// The 5-bit LOAD/STORE copy-flag word (§4.D).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct CopyFlags(u8);

impl CopyFlags {
    pub const HALF: Self = Self(1 << bits::copy_flag::HALF_COPY);
    pub const FRM_SIG: Self = Self(1 << bits::copy_flag::SIG_SOURCE);
    pub const TO_SIG: Self = Self(1 << bits::copy_flag::SIG_DEST);
    pub const OVERWRITE: Self = Self(1 << bits::copy_flag::OVERWRITE);
    pub const IMMEDIATE: Self = Self(1 << bits::copy_flag::IMMEDIATE);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn half_copy(self) -> bool {
        self.0 & (1 << bits::copy_flag::HALF_COPY) != 0
    }

    pub fn sig_source(self) -> bool {
        self.0 & (1 << bits::copy_flag::SIG_SOURCE) != 0
    }

    pub fn sig_dest(self) -> bool {
        self.0 & (1 << bits::copy_flag::SIG_DEST) != 0
    }

    pub fn overwrite(self) -> bool {
        self.0 & (1 << bits::copy_flag::OVERWRITE) != 0
    }

    pub fn immediate(self) -> bool {
        self.0 & (1 << bits::copy_flag::IMMEDIATE) != 0
    }
}

impl std::ops::BitXor for CopyFlags {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl std::ops::BitXorAssign for CopyFlags {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

/// The 5-bit JUMP flag word (§4.D).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct JumpFlags(u8);

impl JumpFlags {
    pub const ON_HIGH: Self = Self(1 << bits::jump_flag::ON_HIGH);
    pub const DEC: Self = Self(1 << bits::jump_flag::DEC);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// The required state of `comp_reg[c]` for the jump to fire.
    pub fn on_high(self) -> bool {
        self.0 & (1 << bits::jump_flag::ON_HIGH) != 0
    }

    /// Whether the jump goes backward (`DEC`) rather than forward.
    pub fn dec(self) -> bool {
        self.0 & (1 << bits::jump_flag::DEC) != 0
    }
}

impl std::ops::BitXor for JumpFlags {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl std::ops::BitXorAssign for JumpFlags {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}
