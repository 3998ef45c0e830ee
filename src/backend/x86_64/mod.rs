//! x86-64 Target Definitions
//!
//! Registers, physical operand locations and the instruction forms the
//! emitter produces, rendered in AT&T syntax.

pub mod instr;
pub mod operand;
pub mod regs;

pub use instr::{Cc, X64BinOp, X64Instr, X64UnOp};
pub use operand::{MemBase, MemIndex, Operand};
pub use regs::Reg;
