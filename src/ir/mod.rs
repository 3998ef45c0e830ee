//! Program IR
//!
//! This module defines the three-address intermediate representation the
//! backend consumes: abstract values, instructions, basic blocks, methods
//! and the program itself (a prologue of global/string reservations plus an
//! ordered list of methods).
//!
//! The IR is control-flow-graph shaped: every method exposes an entry block
//! and a distinguished exit block, and every block knows its successors.

pub mod block;
pub mod instr;
pub mod program;
pub mod value;

pub use block::{BasicBlock, BlockKind};
pub use instr::{BinaryOp, Instruction, UnaryOp};
pub use program::{Method, ProgramIr};
pub use value::IrValue;
