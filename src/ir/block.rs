//! Basic Blocks
//!
//! A block is branch-free (single successor), branching (condition plus
//! true/false successors) or the method's exit marker. Blocks reference
//! each other by label; the trace scheduler turns the graph into one
//! linear instruction stream.

use super::instr::Instruction;
use super::value::IrValue;

/// How control leaves a block
#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    /// Unconditional flow to a single successor
    NoBranch { successor: String },
    /// Conditional flow: fall through to `true_target` when the condition
    /// holds, jump to `false_target` otherwise
    Branch {
        condition: IrValue,
        true_target: String,
        false_target: String,
    },
    /// The method's distinguished exit block
    Exit,
}

/// A labelled basic block holding its own instruction list
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub kind: BlockKind,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Successor labels in traversal order (true target first)
    pub fn successors(&self) -> Vec<&str> {
        match &self.kind {
            BlockKind::NoBranch { successor } => vec![successor.as_str()],
            BlockKind::Branch {
                true_target,
                false_target,
                ..
            } => vec![true_target.as_str(), false_target.as_str()],
            BlockKind::Exit => Vec::new(),
        }
    }

    /// The fall-through successor the trace scheduler chains into
    pub fn fallthrough(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::NoBranch { successor } => Some(successor.as_str()),
            BlockKind::Branch { true_target, .. } => Some(true_target.as_str()),
            BlockKind::Exit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_order() {
        let block = BasicBlock {
            label: "b0".to_string(),
            kind: BlockKind::Branch {
                condition: IrValue::Var("c".to_string()),
                true_target: "body".to_string(),
                false_target: "done".to_string(),
            },
            instructions: Vec::new(),
        };
        assert_eq!(block.successors(), vec!["body", "done"]);
        assert_eq!(block.fallthrough(), Some("body"));
    }
}
