//! x86-64 Instruction Forms
//!
//! The instruction shapes the emitter produces: binary (source,
//! destination), unary, a handful of fixed-operand forms, control flow and
//! raw assembler directives. Rendering is AT&T syntax.

use super::operand::Operand;
use crate::ir::BinaryOp;
use std::fmt;

/// Condition codes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cc {
    E,
    Ne,
    L,
    Le,
    G,
    Ge,
}

impl Cc {
    /// The condition a comparison operator sets when it holds
    pub fn from_comparison(op: BinaryOp) -> Cc {
        match op {
            BinaryOp::Eq => Cc::E,
            BinaryOp::Neq => Cc::Ne,
            BinaryOp::Lt => Cc::L,
            BinaryOp::Leq => Cc::Le,
            BinaryOp::Gt => Cc::G,
            BinaryOp::Geq => Cc::Ge,
            other => panic!("not a comparison operator: {}", other),
        }
    }

    pub fn negate(self) -> Cc {
        match self {
            Cc::E => Cc::Ne,
            Cc::Ne => Cc::E,
            Cc::L => Cc::Ge,
            Cc::Le => Cc::G,
            Cc::G => Cc::Le,
            Cc::Ge => Cc::L,
        }
    }
}

impl fmt::Display for Cc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cc::E => "e",
            Cc::Ne => "ne",
            Cc::L => "l",
            Cc::Le => "le",
            Cc::G => "g",
            Cc::Ge => "ge",
        };
        write!(f, "{}", name)
    }
}

/// Two-operand instruction mnemonics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum X64BinOp {
    Movq,
    Addq,
    Subq,
    Imulq,
    Andq,
    Orq,
    Xorq,
    Cmpq,
    Leaq,
}

impl X64BinOp {
    /// The mnemonic for an arithmetic/logical IR operator
    pub fn from_ir_op(op: BinaryOp) -> X64BinOp {
        match op {
            BinaryOp::Add => X64BinOp::Addq,
            BinaryOp::Sub => X64BinOp::Subq,
            BinaryOp::Mul => X64BinOp::Imulq,
            BinaryOp::And => X64BinOp::Andq,
            BinaryOp::Or => X64BinOp::Orq,
            other => panic!("no direct x86-64 form for operator: {}", other),
        }
    }
}

impl fmt::Display for X64BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            X64BinOp::Movq => "movq",
            X64BinOp::Addq => "addq",
            X64BinOp::Subq => "subq",
            X64BinOp::Imulq => "imulq",
            X64BinOp::Andq => "andq",
            X64BinOp::Orq => "orq",
            X64BinOp::Xorq => "xorq",
            X64BinOp::Cmpq => "cmpq",
            X64BinOp::Leaq => "leaq",
        };
        write!(f, "{}", name)
    }
}

/// One-operand instruction mnemonics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum X64UnOp {
    Pushq,
    Popq,
    Negq,
    Idivq,
}

impl fmt::Display for X64UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            X64UnOp::Pushq => "pushq",
            X64UnOp::Popq => "popq",
            X64UnOp::Negq => "negq",
            X64UnOp::Idivq => "idivq",
        };
        write!(f, "{}", name)
    }
}

/// A single emitted line
#[derive(Clone, Debug, PartialEq)]
pub enum X64Instr {
    Binary {
        op: X64BinOp,
        src: Operand,
        dst: Operand,
    },
    Unary { op: X64UnOp, operand: Operand },
    /// `set<cc> %al`
    SetCc { cc: Cc },
    /// `movzbq %al, dst`
    MovZxByte { dst: Operand },
    /// Sign-extend %rax into %rdx:%rax before division
    Cqto,
    /// `xorl %eax, %eax`: zeroes the result/accumulator register; used
    /// for the entry method's exit code and before variadic externals
    ZeroEax,
    Jmp { target: String },
    Jcc { cc: Cc, target: String },
    Call { target: String },
    Ret,
    /// A raw assembler line: section directives, labels, alignment
    Directive(String),
}

impl X64Instr {
    pub fn mov(src: Operand, dst: Operand) -> X64Instr {
        X64Instr::Binary {
            op: X64BinOp::Movq,
            src,
            dst,
        }
    }

    pub fn label(name: &str) -> X64Instr {
        X64Instr::Directive(format!(".{}:", name))
    }
}

impl fmt::Display for X64Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X64Instr::Binary { op, src, dst } => write!(f, "\t{}\t{}, {}", op, src, dst),
            X64Instr::Unary { op, operand } => write!(f, "\t{}\t{}", op, operand),
            X64Instr::SetCc { cc } => write!(f, "\tset{}\t%al", cc),
            X64Instr::MovZxByte { dst } => write!(f, "\tmovzbq\t%al, {}", dst),
            X64Instr::Cqto => write!(f, "\tcqto"),
            X64Instr::ZeroEax => write!(f, "\txorl\t%eax, %eax"),
            X64Instr::Jmp { target } => write!(f, "\tjmp\t.{}", target),
            X64Instr::Jcc { cc, target } => write!(f, "\tj{}\t.{}", cc, target),
            X64Instr::Call { target } => write!(f, "\tcallq\t{}", target),
            X64Instr::Ret => write!(f, "\tretq"),
            X64Instr::Directive(line) => write!(f, "{}", line),
        }
    }
}
