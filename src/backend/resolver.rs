//! Value Resolver
//!
//! Turns abstract IR values into concrete physical locations while a
//! method is being emitted. The resolver owns all per-method location
//! state: the register and stack-slot maps derived from the allocation
//! decision, the initial locations of incoming arguments, the monotone
//! stack-offset counter, and the temporary save slots used by the calling
//! convention lowering.
//!
//! Resolution can have side effects: materializing an argument on first
//! touch, loading a global array base, or evicting a register when an
//! instruction needs more simultaneously-live registers than it has
//! (spill-on-conflict). Those effects are returned as preparatory
//! instructions that must be emitted immediately before the instruction
//! under resolution.
//!
//! `prepare_for_method` is a hard precondition before resolving any value
//! of a method: offsets and spill bookkeeping are append-only and
//! order-dependent within a method.

use super::regalloc::{Allocation, RegisterAllocator};
use super::x86_64::operand::{round_up16, MemBase, MemIndex, Operand, WORD_SIZE};
use super::x86_64::{Reg, X64Instr};
use crate::ir::{IrValue, Method};
use std::collections::{HashMap, HashSet};

pub struct ValueResolver<'a> {
    allocator: &'a RegisterAllocator,
    /// Current method name; set by `prepare_for_method`
    method: String,
    /// Values currently resident in a register
    register_mapped: HashMap<IrValue, Reg>,
    /// Values currently resident in a frame slot
    stack_offsets: HashMap<IrValue, i64>,
    /// Not-yet-materialized arguments and where the prologue parked them
    initial_arg_locations: HashMap<IrValue, Operand>,
    /// Per-register save slots handed out by `resolve_next_stack_location`
    temp_save_locations: HashMap<Reg, i64>,
    /// Monotone negative offset from the frame pointer; never reused
    current_stack_offset: i64,
    /// Side-effect instructions of the resolution in progress
    prep: Vec<X64Instr>,
}

impl<'a> ValueResolver<'a> {
    pub fn new(allocator: &'a RegisterAllocator) -> Self {
        ValueResolver {
            allocator,
            method: String::new(),
            register_mapped: HashMap::new(),
            stack_offsets: HashMap::new(),
            initial_arg_locations: HashMap::new(),
            temp_save_locations: HashMap::new(),
            current_stack_offset: 0,
            prep: Vec::new(),
        }
    }

    /// Reset all location state for a method. Must be called before any
    /// value of the method is resolved.
    pub fn prepare_for_method(&mut self, method: &Method) {
        self.method = method.name.clone();
        self.register_mapped.clear();
        self.stack_offsets.clear();
        self.initial_arg_locations.clear();
        self.temp_save_locations.clear();
        self.current_stack_offset = 0;
        self.prep.clear();

        self.map_parameters(method);
        self.map_locals(method);
        self.map_stack_arrays(method);
    }

    /// Park each incoming argument in a register the allocation left
    /// unused, falling back to fresh stack slots once those run out. The
    /// first `min(k, 6)` argument registers are excluded so the parking
    /// moves cannot clobber arguments not yet read.
    fn map_parameters(&mut self, method: &Method) {
        let allocation = self.allocator.allocation(&method.name);
        let assigned: HashSet<Reg> = allocation
            .values()
            .filter_map(|a| match a {
                Allocation::Register(reg) => Some(*reg),
                Allocation::Spilled => None,
            })
            .collect();
        let incoming = &Reg::ARG_REGISTERS[..method.params.len().min(Reg::N_ARG_REGISTERS)];
        let unused: Vec<Reg> = Reg::REGS_TO_ALLOCATE
            .iter()
            .copied()
            .filter(|reg| !incoming.contains(reg) && !assigned.contains(reg))
            .collect();

        for (index, param) in method.params.iter().enumerate() {
            let destination = if index < unused.len() {
                Operand::Reg(unused[index])
            } else {
                Operand::frame_slot(self.push_stack())
            };
            self.initial_arg_locations.insert(param.clone(), destination);
        }
    }

    /// Apply the allocation decision: register-allocated values go into
    /// the register map, spilled values get a stack slot. A spilled
    /// parameter whose initial location is already a stack slot keeps it.
    fn map_locals(&mut self, method: &Method) {
        let liveness = self.allocator.method_liveness(&method.name);
        for interval in liveness.sorted_intervals() {
            let value = &interval.value;
            match value {
                IrValue::Var(_) | IrValue::GlobalArray(_) => {
                    match self.allocator.allocation_of(&method.name, value) {
                        Some(Allocation::Register(reg)) => {
                            self.register_mapped.insert(value.clone(), reg);
                        }
                        Some(Allocation::Spilled) | None => {
                            let offset = match self.initial_arg_locations.get(value) {
                                Some(Operand::Stack { offset, .. }) => *offset,
                                _ => self.push_stack(),
                            };
                            self.stack_offsets.insert(value.clone(), offset);
                        }
                    }
                }
                // addresses are composed at each use; nothing to map
                IrValue::MemAddr { .. } => {}
                other => panic!("unexpected value in live intervals: {}", other),
            }
        }
    }

    /// Reserve one contiguous block per stack-resident array, 16-byte
    /// aligned, and snap the offset counter past it.
    fn map_stack_arrays(&mut self, method: &Method) {
        for array in method.stack_arrays() {
            if let IrValue::StackArray { len, .. } = array {
                let offset = -round_up16(self.push_stack_n(*len as i64).abs());
                self.stack_offsets.insert(array.clone(), offset);
                self.current_stack_offset = offset;
            }
        }
    }

    fn push_stack(&mut self) -> i64 {
        self.current_stack_offset -= WORD_SIZE;
        self.current_stack_offset
    }

    fn push_stack_n(&mut self, n: i64) -> i64 {
        self.current_stack_offset -= WORD_SIZE * n;
        self.current_stack_offset
    }

    /// Lowest frame offset issued so far; the emitter rounds this into
    /// the final frame size once the method is fully resolved.
    pub fn current_stack_offset(&self) -> i64 {
        self.current_stack_offset
    }

    /// Resolve a value to its current physical location. The returned
    /// preparatory instructions must be emitted before the instruction
    /// that uses the operand.
    pub fn resolve(&mut self, value: &IrValue) -> (Operand, Vec<X64Instr>) {
        self.prep.clear();
        let operand = self.resolve_internal(value);
        (operand, std::mem::take(&mut self.prep))
    }

    fn resolve_internal(&mut self, value: &IrValue) -> Operand {
        if self.initial_arg_locations.contains_key(value) {
            return self.localize_argument(value);
        }
        match value {
            IrValue::Int(n) => Operand::Imm(*n),
            IrValue::Str(label) => Operand::StrRef(label.clone()),
            IrValue::MemAddr { .. } => self.resolve_memory_address(value),
            IrValue::GlobalScalar(name) => Operand::Global(name.clone()),
            _ => {
                if let Some(offset) = self.stack_offsets.get(value) {
                    Operand::frame_slot(*offset)
                } else if let Some(reg) = self.register_mapped.get(value) {
                    Operand::Reg(*reg)
                } else {
                    panic!("no physical location for value {}", value)
                }
            }
        }
    }

    /// First touch of a formal parameter: copy it from where the method
    /// prologue parked it into its allocated location. Later references
    /// take the fast path through the ordinary maps.
    fn localize_argument(&mut self, value: &IrValue) -> Operand {
        let initial = self
            .initial_arg_locations
            .remove(value)
            .expect("checked by caller");
        let localized = self.resolve_internal(value);
        if localized != initial {
            self.prep.push(X64Instr::mov(initial, localized.clone()));
        }
        localized
    }

    /// Compose a memory operand from a base and an index. Both must end up
    /// in registers (or the index folded as an immediate), never sharing
    /// one; a global base is first loaded into a register, since a
    /// rip-relative operand cannot carry an index.
    fn resolve_memory_address(&mut self, value: &IrValue) -> Operand {
        let (base, index) = match value {
            IrValue::MemAddr { base, index, .. } => (base.as_ref(), index.as_ref()),
            _ => unreachable!("caller matched a memory address"),
        };

        let mut index_operand = self.resolve_internal(index);
        let index_needs_register = matches!(
            index_operand,
            Operand::Stack { .. } | Operand::Mem { .. }
        ) || (base.is_global() && !index_operand.is_register());

        let mut index_register = None;
        if index_needs_register {
            let mut avoid = Vec::new();
            if let Some(reg) = self.register_mapped.get(base) {
                avoid.push(*reg);
            }
            let reg = self.evict_register_for(index, &avoid);
            index_register = Some(reg);
            index_operand = Operand::Reg(reg);
        }

        if let IrValue::StackArray { .. } = base {
            let offset = *self
                .stack_offsets
                .get(base)
                .unwrap_or_else(|| panic!("stack array {} has no frame block", base));
            return Operand::Mem {
                base: MemBase::Frame { offset },
                index: Self::as_mem_index(&index_operand),
            };
        }

        let base_operand = self.resolve_internal(base);
        let base_register = match base_operand {
            Operand::Reg(reg) => reg,
            Operand::Stack { .. } => {
                let avoid: Vec<Reg> = index_register.into_iter().collect();
                self.evict_register_for(base, &avoid)
            }
            other => panic!("value {} cannot serve as an indexed base: {}", base, other),
        };

        if let IrValue::GlobalArray(name) = base {
            self.prep.push(X64Instr::mov(
                Operand::Global(name.clone()),
                Operand::Reg(base_register),
            ));
        }

        Operand::Mem {
            base: MemBase::Reg(base_register),
            index: Self::as_mem_index(&index_operand),
        }
    }

    fn as_mem_index(operand: &Operand) -> MemIndex {
        match operand {
            Operand::Reg(reg) => MemIndex::Reg(*reg),
            Operand::Imm(n) => MemIndex::Imm(*n),
            other => panic!("operand cannot index a memory access: {}", other),
        }
    }

    /// Spill-on-conflict: free a register for `value` and remap the value
    /// into it. The donor is the candidate holding the fewest values
    /// referenced inside `value`'s live interval, ties broken by pool
    /// order; everything it holds is stored to fresh stack slots first.
    fn evict_register_for(&mut self, value: &IrValue, avoid: &[Reg]) -> Reg {
        let values_in_interval: Vec<IrValue> = match value {
            // constants carry no interval; any candidate register works
            IrValue::Int(_) => Vec::new(),
            _ => self
                .allocator
                .method_liveness(&self.method)
                .values_in_interval_of(value),
        };

        let mut occupants: HashMap<Reg, Vec<IrValue>> = HashMap::new();
        for reg in Reg::REGS_TO_ALLOCATE {
            occupants.insert(*reg, Vec::new());
        }
        for candidate in values_in_interval {
            if let Some(reg) = self.register_mapped.get(&candidate) {
                occupants.get_mut(reg).expect("pool register").push(candidate);
            }
        }

        let mut donor: Option<(Reg, usize)> = None;
        for reg in Reg::REGS_TO_ALLOCATE {
            if avoid.contains(reg) {
                continue;
            }
            let count = occupants[reg].len();
            if donor.map_or(true, |(_, best)| count < best) {
                donor = Some((*reg, count));
            }
        }
        let (donor, _) = donor.unwrap_or_else(|| {
            panic!("register pool exhausted while resolving {}", value)
        });

        let mut evicted = occupants.remove(&donor).expect("pool register");
        evicted.sort_by_key(|v| v.to_string());
        for evictee in evicted {
            let slot = self.push_stack();
            let old = self.resolve_internal(&evictee);
            self.prep.push(X64Instr::mov(old, Operand::frame_slot(slot)));
            let freed = self.register_mapped.remove(&evictee);
            assert_eq!(freed, Some(donor), "evictee was not resident in the donor");
            assert!(
                !self.stack_offsets.contains_key(&evictee),
                "evictee {} already has a stack slot",
                evictee
            );
            self.stack_offsets.insert(evictee, slot);
        }

        let old = self.resolve_internal(value);
        self.prep
            .push(X64Instr::mov(old, Operand::Reg(donor)));
        self.register_mapped.remove(value);
        self.stack_offsets.remove(value);
        self.register_mapped.insert(value.clone(), donor);
        donor
    }

    /// The save slot for a physical register, allocated on first request
    /// and reused for the rest of the method.
    pub fn resolve_next_stack_location(&mut self, reg: Reg) -> Operand {
        if let Some(offset) = self.temp_save_locations.get(&reg) {
            return Operand::frame_slot(*offset);
        }
        let offset = self.push_stack();
        self.temp_save_locations.insert(reg, offset);
        Operand::frame_slot(offset)
    }

    /// A fresh, never-reused scratch stack slot.
    pub fn push_stack_no_save(&mut self) -> Operand {
        let offset = self.push_stack();
        Operand::frame_slot(offset)
    }

    /// Where the method prologue parked a parameter.
    pub fn initial_argument_location(&self, param: &IrValue) -> Operand {
        self.initial_arg_locations
            .get(param)
            .cloned()
            .unwrap_or_else(|| panic!("parameter {} has no initial location", param))
    }

    pub fn is_stack_mapped(&self, value: &IrValue) -> bool {
        self.stack_offsets.contains_key(value)
    }

    /// Values that still await first-touch materialization (used by the
    /// prologue's argument parking moves).
    pub fn has_unresolved_argument(&self, value: &IrValue) -> bool {
        self.initial_arg_locations.contains_key(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, BinaryOp, BlockKind, Instruction, ProgramIr};

    fn var(name: &str) -> IrValue {
        IrValue::Var(name.to_string())
    }

    fn method_with(name: &str, params: Vec<IrValue>, body: Vec<Instruction>) -> Method {
        let entry = format!("{}_entry", name);
        let exit = format!("{}_exit", name);
        let mut instructions = vec![Instruction::MethodBegin {
            name: name.to_string(),
            is_main: false,
        }];
        instructions.extend(body);
        Method {
            name: name.to_string(),
            params,
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
    fn test_resolution_is_idempotent() {
        let program = program_of(method_with(
            "f",
            Vec::new(),
            vec![
                Instruction::Copy {
                    dst: var("a"),
                    src: IrValue::Int(1),
                },
                Instruction::Return {
                    value: Some(var("a")),
                },
            ],
        ));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let (first, _) = resolver.resolve(&var("a"));
        let (second, prep) = resolver.resolve(&var("a"));
        assert_eq!(first, second);
        assert!(prep.is_empty());
    }

    #[test]
    fn test_constants_resolve_to_immediates() {
        let program = program_of(method_with("f", Vec::new(), Vec::new()));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let (op, prep) = resolver.resolve(&IrValue::Int(42));
        assert_eq!(op, Operand::Imm(42));
        assert!(prep.is_empty());
    }

    #[test]
    fn test_argument_materialized_on_first_touch() {
        let program = program_of(method_with(
            "f",
            vec![var("x")],
            vec![
                Instruction::Binary {
                    op: BinaryOp::Add,
                    dst: var("y"),
                    lhs: var("x"),
                    rhs: IrValue::Int(1),
                },
                Instruction::Return {
                    value: Some(var("y")),
                },
            ],
        ));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let initial = resolver.initial_argument_location(&var("x"));
        assert!(resolver.has_unresolved_argument(&var("x")));

        let (localized, prep) = resolver.resolve(&var("x"));
        assert!(!resolver.has_unresolved_argument(&var("x")));
        if localized == initial {
            assert!(prep.is_empty());
        } else {
            assert_eq!(prep, vec![X64Instr::mov(initial, localized.clone())]);
        }

        // second touch: stable, no further moves
        let (again, prep) = resolver.resolve(&var("x"));
        assert_eq!(again, localized);
        assert!(prep.is_empty());
    }

    #[test]
    fn test_frame_grows_monotonically() {
        let program = program_of(method_with("f", Vec::new(), Vec::new()));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let a = resolver.push_stack_no_save();
        let b = resolver.push_stack_no_save();
        let (Operand::Stack { offset: oa, .. }, Operand::Stack { offset: ob, .. }) = (a, b) else {
            panic!("expected stack slots");
        };
        assert!(ob < oa, "offsets must never be reused");
        assert!(resolver.current_stack_offset() <= ob);
    }

    #[test]
    fn test_save_slots_reused_per_register() {
        let program = program_of(method_with("f", Vec::new(), Vec::new()));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let first = resolver.resolve_next_stack_location(Reg::Rdx);
        let second = resolver.resolve_next_stack_location(Reg::Rdx);
        let other = resolver.resolve_next_stack_location(Reg::Rcx);
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_stack_array_block_is_aligned_and_disjoint() {
        let buf = IrValue::StackArray {
            name: "buf".to_string(),
            len: 3,
        };
        let addr = IrValue::MemAddr {
            name: "a0".to_string(),
            base: Box::new(buf.clone()),
            index: Box::new(IrValue::Int(0)),
        };
        let program = program_of(method_with(
            "f",
            Vec::new(),
            vec![Instruction::GetAddress {
                dst: addr,
                base: buf.clone(),
                index: IrValue::Int(0),
                length: Some(3),
            }],
        ));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        assert!(resolver.is_stack_mapped(&buf));
        let offset = resolver.current_stack_offset();
        assert_eq!(offset % 16, 0, "array block must be 16-byte aligned");
        assert!(offset <= -(3 * WORD_SIZE));
    }

    #[test]
    fn test_global_base_forces_register_composition() {
        // a constant index cannot ride on a global base: the base is
        // loaded into a register and the index is granted one too
        let arr = IrValue::GlobalArray("tbl".to_string());
        let addr = IrValue::MemAddr {
            name: "a0".to_string(),
            base: Box::new(arr.clone()),
            index: Box::new(IrValue::Int(2)),
        };
        let program = program_of(method_with(
            "f",
            Vec::new(),
            vec![
                Instruction::GetAddress {
                    dst: addr.clone(),
                    base: arr.clone(),
                    index: IrValue::Int(2),
                    length: Some(8),
                },
                Instruction::Copy {
                    dst: var("out"),
                    src: addr.clone(),
                },
                Instruction::Return {
                    value: Some(var("out")),
                },
            ],
        ));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        let (operand, prep) = resolver.resolve(&addr);
        let Operand::Mem { base, index } = operand else {
            panic!("expected a composed memory operand");
        };
        let MemBase::Reg(base_reg) = base else {
            panic!("global array base must be register-resident");
        };
        let MemIndex::Reg(index_reg) = index else {
            panic!("index must be granted a register on a global base");
        };
        // base and index never share a register
        assert_ne!(base_reg, index_reg);
        // the index was materialized and the base loaded from the globals
        assert!(prep.iter().any(|i| matches!(
            i,
            X64Instr::Binary { src: Operand::Imm(2), dst: Operand::Reg(r), .. }
                if *r == index_reg
        )));
        assert!(prep.iter().any(|i| matches!(
            i,
            X64Instr::Binary { src: Operand::Global(name), dst: Operand::Reg(r), .. }
                if name == "tbl" && *r == base_reg
        )));
    }

    #[test]
    fn test_eviction_stores_before_remapping() {
        // force the donor register to be occupied: the value in it must be
        // stored to a fresh slot before the index claims the register
        let idx = var("i");
        let arr = IrValue::GlobalArray("tbl".to_string());
        let addr = IrValue::MemAddr {
            name: "a0".to_string(),
            base: Box::new(arr.clone()),
            index: Box::new(idx.clone()),
        };
        // crowd the pool: eleven values stay live across the address
        // composition, and the index itself outlives them all, so the
        // allocator leaves it spilled
        let mut body = Vec::new();
        for n in 0..Reg::REGS_TO_ALLOCATE.len() {
            body.push(Instruction::Copy {
                dst: var(&format!("v{}", n)),
                src: IrValue::Int(n as i64),
            });
        }
        body.push(Instruction::Copy {
            dst: idx.clone(),
            src: IrValue::Int(1),
        });
        body.push(Instruction::GetAddress {
            dst: addr.clone(),
            base: arr.clone(),
            index: idx.clone(),
            length: Some(8),
        });
        body.push(Instruction::Copy {
            dst: var("out"),
            src: addr.clone(),
        });
        for n in 0..Reg::REGS_TO_ALLOCATE.len() {
            body.push(Instruction::Binary {
                op: BinaryOp::Add,
                dst: var("sink"),
                lhs: var(&format!("v{}", n)),
                rhs: var(&format!("v{}", n)),
            });
        }
        // late second use keeps the address, its base and its index live
        // past every crowding value
        body.push(Instruction::Copy {
            dst: var("late"),
            src: addr.clone(),
        });
        body.push(Instruction::Return {
            value: Some(var("out")),
        });
        let program = program_of(method_with("f", Vec::new(), body));
        let allocator = RegisterAllocator::new(&program);
        let mut resolver = ValueResolver::new(&allocator);
        resolver.prepare_for_method(&program.methods[0]);

        // the crowd holds every pool register, so the index is spilled
        assert!(resolver.is_stack_mapped(&idx), "index should start spilled");

        let (operand, prep) = resolver.resolve(&addr);
        let Operand::Mem { index: MemIndex::Reg(index_reg), .. } = operand else {
            panic!("spilled index must be granted a register");
        };
        // some occupant was stored to the stack before the index moved in
        let store_position = prep.iter().position(|i| matches!(
            i,
            X64Instr::Binary { src: Operand::Reg(r), dst: Operand::Stack { .. }, .. }
                if *r == index_reg
        ));
        let load_position = prep.iter().position(|i| matches!(
            i,
            X64Instr::Binary { src: Operand::Stack { .. }, dst: Operand::Reg(r), .. }
                if *r == index_reg
        ));
        assert!(store_position.is_some(), "donor contents must be saved");
        assert!(load_position.is_some(), "index must be reloaded into the donor");
        assert!(store_position < load_position);

        // the index now resolves to the donor register, stably
        let (first, rest) = resolver.resolve(&idx);
        assert_eq!(first, Operand::Reg(index_reg));
        assert!(rest.is_empty());
    }
}
