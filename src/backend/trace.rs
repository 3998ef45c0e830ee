//! Trace Scheduler
//!
//! Linearizes a method's control-flow graph into one instruction stream.
//! Blocks are visited in reverse postorder; from each unscheduled block the
//! scheduler greedily follows fall-through successors, so a chain of blocks
//! needs no jumps at all. A chain ends when it reaches a block that is
//! already scheduled (the exit block is seeded as scheduled, so every path
//! into it becomes one explicit jump), and the exit block's instructions
//! are appended exactly once, as the final element of the trace.
//!
//! Liveness analysis and the emitter both walk the same trace, so an
//! instruction's position in the flattened stream is a stable program
//! point shared by both.

use crate::ir::{Instruction, Method};
use std::collections::HashSet;

/// One scheduled block: its label, whether it opens the trace, and its
/// instruction list (with any appended explicit jump).
#[derive(Clone, Debug)]
pub struct TraceBlock {
    pub label: String,
    pub is_entry: bool,
    pub instructions: Vec<Instruction>,
}

/// Reverse-postorder traversal of the reachable blocks, rooted at entry.
pub fn reverse_postorder(method: &Method) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut postorder = Vec::new();
    visit(method, &method.entry, &mut visited, &mut postorder);
    postorder.reverse();
    postorder
}

fn visit(method: &Method, label: &str, visited: &mut HashSet<String>, out: &mut Vec<String>) {
    if !visited.insert(label.to_string()) {
        return;
    }
    for succ in method.block(label).successors() {
        visit(method, succ, visited, out);
    }
    out.push(label.to_string());
}

/// Schedule a method's blocks into a single trace.
pub fn instruction_trace(method: &Method) -> Vec<TraceBlock> {
    let order = reverse_postorder(method);
    let mut traced: HashSet<String> = HashSet::new();
    traced.insert(method.exit.clone());

    let mut trace: Vec<TraceBlock> = Vec::new();
    for label in &order {
        if traced.contains(label) {
            continue;
        }
        let mut current = label.clone();
        loop {
            let block = method.block(&current);
            traced.insert(current.clone());
            trace.push(TraceBlock {
                label: current.clone(),
                is_entry: current == method.entry,
                instructions: block.instructions.clone(),
            });
            let next = match block.fallthrough() {
                Some(next) => next.to_string(),
                None => break,
            };
            if traced.contains(&next) {
                // fall-through target already placed (or it is the exit):
                // make the edge explicit and end the chain
                trace
                    .last_mut()
                    .expect("chain appended at least one block")
                    .instructions
                    .push(Instruction::Branch { target: next });
                break;
            }
            current = next;
        }
    }

    let exit = method.block(&method.exit);
    trace.push(TraceBlock {
        label: exit.label.clone(),
        is_entry: method.exit == method.entry,
        instructions: exit.instructions.clone(),
    });
    trace
}

/// The trace with block boundaries erased: the linear instruction stream
/// liveness analysis and the emitter index into.
pub fn flatten(method: &Method) -> Vec<Instruction> {
    instruction_trace(method)
        .into_iter()
        .flat_map(|block| block.instructions)
        .collect()
}
