//! Liveness Analysis and Live Intervals
//!
//! Computes, per method, which abstract values are live at every point of
//! the trace-flattened instruction stream, and condenses that into one
//! live interval per value: the smallest index range `[start, end)`
//! covering every point where the value is live. Intervals are a property
//! of the linearized stream, not the CFG: less precise than live ranges,
//! but what the linear scan allocator and the spill heuristics work with.
//!
//! # Algorithm
//!
//! Backward dataflow to a fixed point at block level:
//! - live_in[B] = use[B] ∪ (live_out[B] - def[B])
//! - live_out[B] = ∪ live_in[S] for all successors S of B
//!
//! then a backward walk over each scheduled block records the live set at
//! every instruction of the trace.

use crate::backend::trace;
use crate::ir::{Instruction, IrValue, Method, ProgramIr};
use im::HashSet as ImSet;
use std::collections::HashMap;

/// The live interval of one abstract value: the half-open range of flat
/// instruction indexes over which it is live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveInterval {
    pub value: IrValue,
    pub start: usize,
    pub end: usize,
}

impl LiveInterval {
    /// Whether the value is live at the given program point
    pub fn covers(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

/// Liveness results for a single method
#[derive(Clone, Debug)]
pub struct MethodLiveness {
    /// The trace-flattened instruction stream the indexes refer to
    pub flat: Vec<Instruction>,
    /// Live values immediately before each instruction
    pub live_sets: Vec<ImSet<IrValue>>,
    /// One interval per register-allocatable value
    pub intervals: HashMap<IrValue, LiveInterval>,
}

impl MethodLiveness {
    /// The interval of a value. A missing entry means the IR and the
    /// liveness tables disagree, which is fatal.
    pub fn interval(&self, value: &IrValue) -> &LiveInterval {
        self.intervals
            .get(value)
            .unwrap_or_else(|| panic!("no live interval for value {}", value))
    }

    /// Every allocatable value referenced by the instructions inside
    /// `value`'s live interval, in first-appearance order.
    pub fn values_in_interval_of(&self, value: &IrValue) -> Vec<IrValue> {
        let interval = self.interval(value);
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for instr in &self.flat[interval.start..interval.end] {
            for v in instr.allocatable_values() {
                if seen.insert(v.clone()) {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    /// Intervals sorted for the linear scan: by start point, with end
    /// point and value name as deterministic tie-breakers.
    pub fn sorted_intervals(&self) -> Vec<&LiveInterval> {
        let mut intervals: Vec<&LiveInterval> = self.intervals.values().collect();
        intervals.sort_by(|a, b| {
            (a.start, a.end, a.value.to_string()).cmp(&(b.start, b.end, b.value.to_string()))
        });
        intervals
    }
}

/// Per-method liveness tables for a whole program
#[derive(Clone, Debug)]
pub struct LiveIntervals {
    methods: HashMap<String, MethodLiveness>,
}

impl LiveIntervals {
    pub fn analyze(program: &ProgramIr) -> Self {
        let mut methods = HashMap::new();
        for method in &program.methods {
            methods.insert(method.name.clone(), analyze_method(method));
        }
        LiveIntervals { methods }
    }

    pub fn method(&self, name: &str) -> &MethodLiveness {
        self.methods
            .get(name)
            .unwrap_or_else(|| panic!("no liveness information for method @{}", name))
    }
}

/// Block-level liveness state
#[derive(Clone, Debug, Default)]
struct BlockLiveness {
    live_in: ImSet<IrValue>,
    live_out: ImSet<IrValue>,
    uses: ImSet<IrValue>,
    defs: ImSet<IrValue>,
}

fn analyze_method(method: &Method) -> MethodLiveness {
    let mut blocks: HashMap<String, BlockLiveness> = HashMap::new();
    for block in &method.blocks {
        let (uses, defs) = use_def(&block.instructions);
        blocks.insert(
            block.label.clone(),
            BlockLiveness {
                uses,
                defs,
                ..BlockLiveness::default()
            },
        );
    }

    // Fixed-point iteration, blocks in reverse for faster convergence
    let mut changed = true;
    while changed {
        changed = false;
        for block in method.blocks.iter().rev() {
            let mut new_live_out = ImSet::new();
            for succ in block.successors() {
                if let Some(info) = blocks.get(succ) {
                    new_live_out = new_live_out.union(info.live_in.clone());
                }
            }

            let info = blocks.get(&block.label).unwrap();
            let mut new_live_in = info.uses.clone();
            for value in new_live_out.iter() {
                if !info.defs.contains(value) {
                    new_live_in.insert(value.clone());
                }
            }

            let info = blocks.get_mut(&block.label).unwrap();
            if new_live_in != info.live_in || new_live_out != info.live_out {
                info.live_in = new_live_in;
                info.live_out = new_live_out;
                changed = true;
            }
        }
    }

    // Record the live set before every instruction of the trace
    let mut flat = Vec::new();
    let mut live_sets = Vec::new();
    for traced in trace::instruction_trace(method) {
        let mut live = blocks[&traced.label].live_out.clone();
        let mut block_sets = Vec::with_capacity(traced.instructions.len());
        for instr in traced.instructions.iter().rev() {
            if let Some(dst) = instr.written() {
                live.remove(dst);
            }
            for value in instr.reads() {
                if value.is_register_allocatable() {
                    live.insert(value.clone());
                }
            }
            block_sets.push(live.clone());
        }
        block_sets.reverse();
        live_sets.extend(block_sets);
        flat.extend(traced.instructions);
    }

    let intervals = compute_intervals(&flat, &live_sets);
    for interval in intervals.values() {
        assert!(
            interval.start <= interval.end,
            "malformed live interval for {}",
            interval.value
        );
    }

    MethodLiveness {
        flat,
        live_sets,
        intervals,
    }
}

/// Upward-exposed uses and definitions of a block
fn use_def(instructions: &[Instruction]) -> (ImSet<IrValue>, ImSet<IrValue>) {
    let mut uses = ImSet::new();
    let mut defs = ImSet::new();
    for instr in instructions {
        for value in instr.reads() {
            if value.is_register_allocatable() && !defs.contains(value) {
                uses.insert(value.clone());
            }
        }
        if let Some(dst) = instr.written() {
            if dst.is_register_allocatable() {
                defs.insert(dst.clone());
            }
        }
    }
    (uses, defs)
}

fn compute_intervals(
    flat: &[Instruction],
    live_sets: &[ImSet<IrValue>],
) -> HashMap<IrValue, LiveInterval> {
    // all allocatable values, in first-appearance order
    let mut seen = std::collections::HashSet::new();
    let mut values = Vec::new();
    for instr in flat {
        for value in instr.allocatable_values() {
            if seen.insert(value.clone()) {
                values.push(value.clone());
            }
        }
    }

    let mut intervals = HashMap::new();
    for value in values {
        let start = flat
            .iter()
            .position(|instr| instr.allocatable_values().contains(&&value))
            .expect("value collected from this stream");
        let end = match value {
            // addresses and global arrays stay usable up to their last
            // textual reference
            IrValue::MemAddr { .. } | IrValue::GlobalArray(_) => {
                let last = flat
                    .iter()
                    .rposition(|instr| instr.allocatable_values().contains(&&value))
                    .expect("value collected from this stream");
                last + 1
            }
            _ => {
                match live_sets.iter().rposition(|set| set.contains(&value)) {
                    Some(last) => last + 1,
                    // defined but never live: keep it for one point
                    None => start + 1,
                }
            }
        };
        // a value read before any write opens its interval at first touch
        let end = end.max(start + 1);
        intervals.insert(
            value.clone(),
            LiveInterval { value, start, end },
        );
    }
    intervals
}
