//! Methods and the Program
//!
//! A method owns its control-flow graph and the identities of its formal
//! parameters; the program owns an ordered prologue of global and string
//! reservations plus the method list. Both are immutable once built.

use super::block::BasicBlock;
use super::instr::Instruction;
use super::value::IrValue;
use std::collections::HashSet;

/// A compiled method
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    /// Formal parameters in declaration order, as `IrValue::Var`s
    pub params: Vec<IrValue>,
    /// All blocks; the entry block comes first
    pub blocks: Vec<BasicBlock>,
    pub entry: String,
    pub exit: String,
    /// The program's designated entry point
    pub is_main: bool,
}

impl Method {
    /// Look up a block by label. The graph is closed, so a missing label
    /// is an upstream contract violation.
    pub fn block(&self, label: &str) -> &BasicBlock {
        self.blocks
            .iter()
            .find(|b| b.label == label)
            .unwrap_or_else(|| panic!("no block labelled `{}` in @{}", label, self.name))
    }

    /// Stack-resident arrays referenced anywhere in the method, in first
    /// appearance order.
    pub fn stack_arrays(&self) -> Vec<&IrValue> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for block in &self.blocks {
            for instr in &block.instructions {
                for value in instr.values() {
                    if matches!(value, IrValue::StackArray { .. }) && seen.insert(value) {
                        out.push(value);
                    }
                }
            }
        }
        out
    }
}

/// A whole program: prologue allocations plus methods in program order
#[derive(Clone, Debug)]
pub struct ProgramIr {
    pub prologue: Vec<Instruction>,
    pub methods: Vec<Method>,
}

impl ProgramIr {
    pub fn method(&self, name: &str) -> &Method {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no method named @{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::BlockKind;

    #[test]
    fn test_stack_arrays_deduplicated() {
        let buf = IrValue::StackArray {
            name: "buf".to_string(),
            len: 4,
        };
        let method = Method {
            name: "f".to_string(),
            params: Vec::new(),
            blocks: vec![BasicBlock {
                label: "f_entry".to_string(),
                kind: BlockKind::NoBranch {
                    successor: "f_exit".to_string(),
                },
                instructions: vec![
                    Instruction::GetAddress {
                        dst: IrValue::MemAddr {
                            name: "a0".to_string(),
                            base: Box::new(buf.clone()),
                            index: Box::new(IrValue::Int(0)),
                        },
                        base: buf.clone(),
                        index: IrValue::Int(0),
                        length: Some(4),
                    },
                    Instruction::GetAddress {
                        dst: IrValue::MemAddr {
                            name: "a1".to_string(),
                            base: Box::new(buf.clone()),
                            index: Box::new(IrValue::Int(1)),
                        },
                        base: buf.clone(),
                        index: IrValue::Int(1),
                        length: Some(4),
                    },
                ],
            }],
            entry: "f_entry".to_string(),
            exit: "f_exit".to_string(),
            is_main: false,
        };
        assert_eq!(method.stack_arrays(), vec![&buf]);
    }
}
