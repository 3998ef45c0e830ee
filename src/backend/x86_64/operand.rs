//! Physical Operand Locations
//!
//! Where an abstract value lives once resolved: a register, a
//! frame-pointer-relative stack slot, an immediate, a rip-relative global
//! or string, or a computed memory operand (base + index * word size).

use super::regs::Reg;
use std::fmt;

/// Bytes per machine word; every IR value is word sized.
pub const WORD_SIZE: i64 = 8;

/// Round a non-negative byte count up to the stack alignment unit. Zero
/// rounds to one full paragraph, so every frame reserves at least 16 bytes.
pub fn round_up16(n: i64) -> i64 {
    if n == 0 {
        16
    } else {
        (n + 15) / 16 * 16
    }
}

/// Base of a computed memory operand
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemBase {
    Reg(Reg),
    /// Stack-resident array storage at a fixed frame offset
    Frame { offset: i64 },
}

/// Index of a computed memory operand
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemIndex {
    Reg(Reg),
    /// Compile-time index, folded into the displacement
    Imm(i64),
}

/// A resolved physical location
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(Reg),
    /// `offset(base)`, with `base` the frame or stack pointer
    Stack { base: Reg, offset: i64 },
    Imm(i64),
    /// A string constant, addressed rip-relative and loaded by address
    StrRef(String),
    /// A global reservation, addressed rip-relative
    Global(String),
    /// `base + index * WORD_SIZE`
    Mem { base: MemBase, index: MemIndex },
}

impl Operand {
    pub fn frame_slot(offset: i64) -> Operand {
        Operand::Stack {
            base: Reg::Rbp,
            offset,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Reg(_))
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    /// Physical registers this operand reads when used
    pub fn registers_in_use(&self) -> Vec<Reg> {
        match self {
            Operand::Reg(r) => vec![*r],
            Operand::Mem { base, index } => {
                let mut regs = Vec::new();
                if let MemBase::Reg(r) = base {
                    regs.push(*r);
                }
                if let MemIndex::Reg(r) = index {
                    regs.push(*r);
                }
                regs
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Stack { base, offset } => {
                if *offset == 0 {
                    write!(f, "({})", base)
                } else {
                    write!(f, "{}({})", offset, base)
                }
            }
            Operand::Imm(n) => write!(f, "${}", n),
            Operand::StrRef(label) => write!(f, "{}(%rip)", label),
            Operand::Global(name) => write!(f, "{}(%rip)", name),
            Operand::Mem { base, index } => match (base, index) {
                (MemBase::Reg(b), MemIndex::Reg(i)) => write!(f, "({},{},{})", b, i, WORD_SIZE),
                (MemBase::Reg(b), MemIndex::Imm(i)) => {
                    let disp = i * WORD_SIZE;
                    if disp == 0 {
                        write!(f, "({})", b)
                    } else {
                        write!(f, "{}({})", disp, b)
                    }
                }
                (MemBase::Frame { offset }, MemIndex::Reg(i)) => {
                    write!(f, "{}(%rbp,{},{})", offset, i, WORD_SIZE)
                }
                (MemBase::Frame { offset }, MemIndex::Imm(i)) => {
                    let disp = offset + i * WORD_SIZE;
                    if disp == 0 {
                        write!(f, "(%rbp)")
                    } else {
                        write!(f, "{}(%rbp)", disp)
                    }
                }
            },
        }
    }
}
