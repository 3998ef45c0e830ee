//! IR Instructions
//!
//! The flat instruction set the backend lowers. Each instruction exposes
//! the abstract values it reads and, if any, the single value it writes;
//! liveness analysis and the value resolver are built on these accessors.

use super::value::IrValue;
use std::fmt;

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not over canonical 0/1 values
    Not,
    /// Two's complement negation
    Neg,
}

/// Binary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Gt,
    Leq,
    Geq,
}

impl BinaryOp {
    /// Operators whose result is a flag-producing comparison
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Leq | BinaryOp::Geq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "eq",
            BinaryOp::Neq => "neq",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Leq => "leq",
            BinaryOp::Geq => "geq",
        };
        write!(f, "{}", name)
    }
}

/// A single IR instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Marks the start of a method body; the emitter records the splice
    /// point for the retroactively patched prologue here.
    MethodBegin { name: String, is_main: bool },
    /// Marks the end of a method body; triggers prologue patching and
    /// epilogue emission.
    MethodEnd { is_main: bool },
    /// Logical renaming; also expresses loads/stores when either side is a
    /// computed memory address.
    Copy { dst: IrValue, src: IrValue },
    Unary {
        op: UnaryOp,
        dst: IrValue,
        operand: IrValue,
    },
    Binary {
        op: BinaryOp,
        dst: IrValue,
        lhs: IrValue,
        rhs: IrValue,
    },
    /// Jump to `false_target` when the condition is false; fall through
    /// otherwise.
    CondBranch {
        condition: IrValue,
        false_target: String,
    },
    Branch { target: String },
    CallWithResult {
        callee: String,
        imported: bool,
        args: Vec<IrValue>,
        dst: IrValue,
    },
    CallNoResult {
        callee: String,
        imported: bool,
        args: Vec<IrValue>,
    },
    Return { value: Option<IrValue> },
    /// base + index * word size -> a new addressable value
    GetAddress {
        dst: IrValue,
        base: IrValue,
        index: IrValue,
        length: Option<i64>,
    },
    /// Runtime check that `0 <= index < length` holds before an access
    BoundsCheck {
        index: IrValue,
        length: i64,
        check_id: usize,
    },
    /// Prologue only: reserve `size` bytes of global storage
    GlobalAlloc {
        name: String,
        size: i64,
        is_array: bool,
    },
    /// Prologue only: labelled string data
    StringAlloc { label: String, content: String },
}

impl Instruction {
    /// The values this instruction reads, with memory addresses expanded
    /// to include their base and index.
    pub fn reads(&self) -> Vec<&IrValue> {
        let mut out = Vec::new();
        match self {
            Instruction::Copy { src, dst } => {
                src.collect(&mut out);
                // storing through an address reads its components
                if let IrValue::MemAddr { base, index, .. } = dst {
                    base.collect(&mut out);
                    index.collect(&mut out);
                }
            }
            Instruction::Unary { operand, .. } => operand.collect(&mut out),
            Instruction::Binary { lhs, rhs, .. } => {
                lhs.collect(&mut out);
                rhs.collect(&mut out);
            }
            Instruction::CondBranch { condition, .. } => condition.collect(&mut out),
            Instruction::CallWithResult { args, .. } | Instruction::CallNoResult { args, .. } => {
                for arg in args {
                    arg.collect(&mut out);
                }
            }
            Instruction::Return { value: Some(value) } => value.collect(&mut out),
            Instruction::GetAddress { base, index, .. } => {
                base.collect(&mut out);
                index.collect(&mut out);
            }
            Instruction::BoundsCheck { index, .. } => index.collect(&mut out),
            _ => {}
        }
        out
    }

    /// The single value this instruction writes, if any.
    pub fn written(&self) -> Option<&IrValue> {
        match self {
            Instruction::Copy { dst, .. }
            | Instruction::Unary { dst, .. }
            | Instruction::Binary { dst, .. }
            | Instruction::CallWithResult { dst, .. }
            | Instruction::GetAddress { dst, .. } => Some(dst),
            _ => None,
        }
    }

    /// Every value this instruction mentions, reads and write alike.
    pub fn values(&self) -> Vec<&IrValue> {
        let mut out = self.reads();
        if let Some(dst) = self.written() {
            dst.collect(&mut out);
        }
        out
    }

    /// The mentioned values the register allocator cares about.
    pub fn allocatable_values(&self) -> Vec<&IrValue> {
        self.values()
            .into_iter()
            .filter(|v| v.is_register_allocatable())
            .collect()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::MethodBegin { name, .. } => write!(f, "define @{}", name),
            Instruction::MethodEnd { .. } => write!(f, "end"),
            Instruction::Copy { dst, src } => write!(f, "{} = {}", dst, src),
            Instruction::Unary { op, dst, operand } => {
                let name = match op {
                    UnaryOp::Not => "not",
                    UnaryOp::Neg => "neg",
                };
                write!(f, "{} = {} {}", dst, name, operand)
            }
            Instruction::Binary { op, dst, lhs, rhs } => {
                write!(f, "{} = {} {}, {}", dst, op, lhs, rhs)
            }
            Instruction::CondBranch {
                condition,
                false_target,
            } => write!(f, "if_false {} goto {}", condition, false_target),
            Instruction::Branch { target } => write!(f, "goto {}", target),
            Instruction::CallWithResult {
                callee, args, dst, ..
            } => {
                write!(f, "{} = call @{}(", dst, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Instruction::CallNoResult { callee, args, .. } => {
                write!(f, "call @{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Instruction::Return { value: Some(value) } => write!(f, "return {}", value),
            Instruction::Return { value: None } => write!(f, "return"),
            Instruction::GetAddress {
                dst, base, index, ..
            } => write!(f, "{} = getaddr {}, {}", dst, base, index),
            Instruction::BoundsCheck { index, length, .. } => {
                write!(f, "checkbounds {}, {}", index, length)
            }
            Instruction::GlobalAlloc { name, size, .. } => write!(f, "global {}, {}", name, size),
            Instruction::StringAlloc { label, content } => {
                write!(f, "string {} {:?}", label, content)
            }
        }
    }
}
