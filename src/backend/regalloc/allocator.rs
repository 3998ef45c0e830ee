//! Register Allocator
//!
//! Linear scan over live intervals. Intervals are walked in start order;
//! each value receives either a physical register from the front of the
//! ordered pool or the spill marker. When the pool is exhausted the active
//! interval with the furthest endpoint donates its register if it outlives
//! the new interval, otherwise the new interval itself is spilled.
//! Spilling never fails here; a spilled value is resolved to a stack slot
//! at emission time.

use super::liveness::{LiveInterval, LiveIntervals, MethodLiveness};
use crate::backend::x86_64::Reg;
use crate::ir::{IrValue, ProgramIr};
use im::HashSet as ImSet;
use std::collections::HashMap;

/// The allocation decision for one abstract value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    Register(Reg),
    Spilled,
}

/// Linear scan over one method's sorted intervals
fn linear_scan(liveness: &MethodLiveness) -> HashMap<IrValue, Allocation> {
    let mut available: Vec<Reg> = Reg::REGS_TO_ALLOCATE.to_vec();
    let mut active: Vec<&LiveInterval> = Vec::new();
    let mut allocation: HashMap<IrValue, Allocation> = HashMap::new();

    for interval in liveness.sorted_intervals() {
        // expire intervals that ended before this one starts
        active.sort_by_key(|i| i.end);
        while let Some(first) = active.first() {
            if first.end >= interval.start {
                break;
            }
            let expired = active.remove(0);
            if let Some(Allocation::Register(reg)) = allocation.get(&expired.value) {
                available.push(*reg);
            }
        }

        if available.is_empty() {
            // spill the active interval with the furthest endpoint
            let spill = *active.last().expect("pool exhausted implies active intervals");
            if spill.end > interval.end {
                let reg = match allocation[&spill.value] {
                    Allocation::Register(reg) => reg,
                    Allocation::Spilled => unreachable!("active interval without a register"),
                };
                allocation.insert(interval.value.clone(), Allocation::Register(reg));
                allocation.insert(spill.value.clone(), Allocation::Spilled);
                active.retain(|i| i.value != spill.value);
                active.push(interval);
                active.sort_by_key(|i| i.end);
            } else {
                allocation.insert(interval.value.clone(), Allocation::Spilled);
            }
        } else {
            let reg = available.remove(0);
            allocation.insert(interval.value.clone(), Allocation::Register(reg));
            active.push(interval);
            active.sort_by_key(|i| i.end);
        }
    }

    allocation
}

/// Owns the liveness tables and the per-method allocation decisions, and
/// derives the per-instruction live-register sets the calling convention
/// lowering consults.
pub struct RegisterAllocator {
    liveness: LiveIntervals,
    variable_to_register: HashMap<String, HashMap<IrValue, Allocation>>,
    live_registers: HashMap<String, Vec<ImSet<Reg>>>,
}

impl RegisterAllocator {
    pub fn new(program: &ProgramIr) -> Self {
        let liveness = LiveIntervals::analyze(program);

        let mut variable_to_register = HashMap::new();
        for method in &program.methods {
            variable_to_register.insert(
                method.name.clone(),
                linear_scan(liveness.method(&method.name)),
            );
        }

        let mut live_registers = HashMap::new();
        for method in &program.methods {
            let method_liveness = liveness.method(&method.name);
            let allocation = &variable_to_register[&method.name];
            let mut per_instruction = Vec::with_capacity(method_liveness.flat.len());
            for index in 0..method_liveness.flat.len() {
                let mut regs = ImSet::new();
                for interval in method_liveness.intervals.values() {
                    // globals never occupy a register across an instruction
                    if interval.value.is_global() || !interval.covers(index) {
                        continue;
                    }
                    if let Some(Allocation::Register(reg)) = allocation.get(&interval.value) {
                        regs.insert(*reg);
                    }
                }
                per_instruction.push(regs);
            }
            live_registers.insert(method.name.clone(), per_instruction);
        }

        RegisterAllocator {
            liveness,
            variable_to_register,
            live_registers,
        }
    }

    pub fn method_liveness(&self, method: &str) -> &MethodLiveness {
        self.liveness.method(method)
    }

    /// The allocation table of a method
    pub fn allocation(&self, method: &str) -> &HashMap<IrValue, Allocation> {
        self.variable_to_register
            .get(method)
            .unwrap_or_else(|| panic!("no allocation for method @{}", method))
    }

    pub fn allocation_of(&self, method: &str, value: &IrValue) -> Option<Allocation> {
        self.allocation(method).get(value).copied()
    }

    /// Physical registers live across the instruction at `index` of the
    /// method's flattened stream
    pub fn live_registers_at(&self, method: &str, index: usize) -> ImSet<Reg> {
        self.live_registers
            .get(method)
            .and_then(|sets| sets.get(index))
            .cloned()
            .unwrap_or_default()
    }

    /// Callee-saved registers the method's allocation actually uses, in
    /// the fixed save order
    pub fn used_callee_saved(&self, method: &str) -> Vec<Reg> {
        let allocation = self.allocation(method);
        Reg::CALLEE_SAVED
            .iter()
            .copied()
            .filter(|reg| {
                allocation
                    .values()
                    .any(|a| matches!(a, Allocation::Register(r) if r == reg))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, BinaryOp, BlockKind, Instruction, Method};

    fn var(name: &str) -> IrValue {
        IrValue::Var(name.to_string())
    }

    fn single_block_method(name: &str, body: Vec<Instruction>) -> Method {
        let entry = format!("{}_entry", name);
        let exit = format!("{}_exit", name);
        let mut instructions = vec![Instruction::MethodBegin {
            name: name.to_string(),
            is_main: false,
        }];
        instructions.extend(body);
        Method {
            name: name.to_string(),
            params: Vec::new(),
            blocks: vec![
                BasicBlock {
                    label: entry.clone(),
                    kind: BlockKind::NoBranch {
                        successor: exit.clone(),
                    },
                    instructions,
                },
                BasicBlock {
                    label: exit.clone(),
                    kind: BlockKind::Exit,
                    instructions: vec![Instruction::MethodEnd { is_main: false }],
                },
            ],
            entry,
            exit,
            is_main: false,
        }
    }

    fn program_of(method: Method) -> ProgramIr {
        ProgramIr {
            prologue: Vec::new(),
            methods: vec![method],
        }
    }

    #[test]
    fn test_disjoint_intervals_share_nothing_live() {
        let method = single_block_method(
            "f",
            vec![
                Instruction::Copy {
                    dst: var("a"),
                    src: IrValue::Int(1),
                },
                Instruction::Copy {
                    dst: var("b"),
                    src: IrValue::Int(2),
                },
                Instruction::Binary {
                    op: BinaryOp::Add,
                    dst: var("c"),
                    lhs: var("a"),
                    rhs: var("b"),
                },
                Instruction::Return {
                    value: Some(var("c")),
                },
            ],
        );
        let allocator = RegisterAllocator::new(&program_of(method));
        let allocation = allocator.allocation("f");

        // overlapping values must not share a register
        let a = allocation[&var("a")];
        let b = allocation[&var("b")];
        assert!(matches!(a, Allocation::Register(_)));
        assert!(matches!(b, Allocation::Register(_)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_pool_exhaustion_degrades_to_spill() {
        // more simultaneously-live values than the pool holds
        let n = Reg::REGS_TO_ALLOCATE.len() + 3;
        let mut body = Vec::new();
        for i in 0..n {
            body.push(Instruction::Copy {
                dst: var(&format!("v{}", i)),
                src: IrValue::Int(i as i64),
            });
        }
        // use them all at the end so every interval spans the block
        for i in 0..n {
            body.push(Instruction::Binary {
                op: BinaryOp::Add,
                dst: var("acc"),
                lhs: var("acc"),
                rhs: var(&format!("v{}", i)),
            });
        }
        let method = single_block_method("g", body);
        let allocator = RegisterAllocator::new(&program_of(method));
        let allocation = allocator.allocation("g");

        let spills = allocation
            .values()
            .filter(|a| matches!(a, Allocation::Spilled))
            .count();
        assert!(spills > 0, "register pressure should force spills");
        // every value still gets a decision
        for i in 0..n {
            assert!(allocation.contains_key(&var(&format!("v{}", i))));
        }
    }

    #[test]
    fn test_pool_taken_in_fixed_order() {
        let method = single_block_method(
            "h",
            vec![
                Instruction::Copy {
                    dst: var("a"),
                    src: IrValue::Int(1),
                },
                Instruction::Return {
                    value: Some(var("a")),
                },
            ],
        );
        let allocator = RegisterAllocator::new(&program_of(method));
        assert_eq!(
            allocator.allocation_of("h", &var("a")),
            Some(Allocation::Register(Reg::REGS_TO_ALLOCATE[0]))
        );
    }

    #[test]
    fn test_live_registers_at_use_site() {
        let method = single_block_method(
            "k",
            vec![
                Instruction::Copy {
                    dst: var("a"),
                    src: IrValue::Int(1),
                },
                Instruction::Binary {
                    op: BinaryOp::Add,
                    dst: var("b"),
                    lhs: var("a"),
                    rhs: IrValue::Int(1),
                },
                Instruction::Return {
                    value: Some(var("b")),
                },
            ],
        );
        let allocator = RegisterAllocator::new(&program_of(method));
        // at the add (flat index 2), %a's register is live
        let live = allocator.live_registers_at("k", 2);
        let a_reg = match allocator.allocation_of("k", &var("a")) {
            Some(Allocation::Register(reg)) => reg,
            other => panic!("unexpected allocation {:?}", other),
        };
        assert!(live.contains(&a_reg));
    }
}
