//! Assembly Writer
//!
//! Per-instruction-kind lowering. The writer carries exactly one piece of
//! cross-instruction state: the operator of the immediately preceding
//! comparison, which the next conditional branch may fuse into a single
//! conditional jump. Any other instruction, and any block label, clears it.
//!
//! Method prologues are patched retroactively: the splice point is
//! recorded when the method begins, and the frame setup is inserted there
//! once the method end marker reveals the final frame size.

use crate::backend::regalloc::RegisterAllocator;
use crate::backend::resolver::ValueResolver;
use crate::backend::trace;
use crate::backend::x86_64::operand::{round_up16, Operand, WORD_SIZE};
use crate::backend::x86_64::{Cc, Reg, X64BinOp, X64Instr, X64UnOp};
use crate::ir::{BinaryOp, Instruction, IrValue, Method, ProgramIr, UnaryOp};
use std::fmt;

/// The emitted program: prologue lines, one stream per method, epilogue.
pub struct X86Program {
    prologue: Vec<X64Instr>,
    methods: Vec<Vec<X64Instr>>,
    epilogue: Vec<X64Instr>,
}

impl fmt::Display for X86Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.prologue {
            writeln!(f, "{}", line)?;
        }
        for method in &self.methods {
            writeln!(f)?;
            for line in method {
                writeln!(f, "{}", line)?;
            }
        }
        writeln!(f)?;
        for line in &self.epilogue {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Emit a whole program as assembly text.
pub fn write_program(program: &ProgramIr, allocator: &RegisterAllocator) -> String {
    AsmWriter::new(program, allocator).emit().to_string()
}

struct WriterContext {
    /// Operator of the immediately preceding comparison, if still fusable
    last_comparison: Option<BinaryOp>,
    /// Where the patched prologue is spliced into the current method
    prologue_index: usize,
    text_emitted: bool,
}

struct AsmWriter<'a> {
    program: &'a ProgramIr,
    allocator: &'a RegisterAllocator,
    resolver: ValueResolver<'a>,
    body: Vec<X64Instr>,
    ctx: WriterContext,
    /// Index of the instruction under emission in the method's flattened
    /// stream; shared with the liveness tables
    flat_index: usize,
    current_method: String,
}

impl<'a> AsmWriter<'a> {
    fn new(program: &'a ProgramIr, allocator: &'a RegisterAllocator) -> Self {
        AsmWriter {
            program,
            allocator,
            resolver: ValueResolver::new(allocator),
            body: Vec::new(),
            ctx: WriterContext {
                last_comparison: None,
                prologue_index: 0,
                text_emitted: false,
            },
            flat_index: 0,
            current_method: String::new(),
        }
    }

    fn emit(mut self) -> X86Program {
        let program = self.program;
        let prologue = emit_program_prologue(program);
        let mut methods = Vec::new();
        for method in &program.methods {
            methods.push(self.emit_method(method));
        }
        X86Program {
            prologue,
            methods,
            epilogue: vec![X64Instr::Directive(".subsections_via_symbols".to_string())],
        }
    }

    fn emit_method(&mut self, method: &Method) -> Vec<X64Instr> {
        self.current_method = method.name.clone();
        self.body = Vec::new();
        self.flat_index = 0;
        self.ctx.last_comparison = None;
        self.ctx.prologue_index = 0;
        self.resolver.prepare_for_method(method);

        for block in trace::instruction_trace(method) {
            if !block.is_entry {
                self.body.push(X64Instr::label(&block.label));
                self.ctx.last_comparison = None;
            }
            for instr in &block.instructions {
                self.emit_instruction(method, instr);
                self.flat_index += 1;
            }
        }
        std::mem::take(&mut self.body)
    }

    /// Resolve a value and emit its preparatory instructions in place.
    fn resolve_emitted(&mut self, value: &IrValue) -> Operand {
        let (operand, prep) = self.resolver.resolve(value);
        self.body.extend(prep);
        operand
    }

    fn emit_instruction(&mut self, method: &Method, instr: &Instruction) {
        // the pending comparison survives only into the very next
        // instruction; whoever needs it takes it here
        let fused = self.ctx.last_comparison.take();

        match instr {
            Instruction::MethodBegin { name, is_main } => {
                if !self.ctx.text_emitted {
                    self.body.push(X64Instr::Directive(".text".to_string()));
                    self.ctx.text_emitted = true;
                }
                if *is_main {
                    self.body.push(X64Instr::Directive(".globl _main".to_string()));
                    self.body.push(X64Instr::Directive(".p2align 4, 0x90".to_string()));
                    self.body.push(X64Instr::Directive("_main:".to_string()));
                } else {
                    self.body.push(X64Instr::Directive(format!("{}:", name)));
                }
                self.ctx.prologue_index = self.body.len();
                self.save_method_args(method);
            }
            Instruction::MethodEnd { is_main } => self.emit_method_end(*is_main),
            Instruction::Copy { dst, src } => self.emit_copy(dst, src),
            Instruction::Unary { op, dst, operand } => self.emit_unary(*op, dst, operand),
            Instruction::Binary { op, dst, lhs, rhs } => {
                if op.is_comparison() {
                    self.emit_comparison(*op, dst, lhs, rhs);
                } else if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
                    self.emit_div_mod(*op, dst, lhs, rhs);
                } else {
                    self.emit_arithmetic(*op, dst, lhs, rhs);
                }
            }
            Instruction::CondBranch {
                condition,
                false_target,
            } => self.emit_cond_branch(condition, false_target, fused),
            Instruction::Branch { target } => self.body.push(X64Instr::Jmp {
                target: target.clone(),
            }),
            Instruction::CallWithResult {
                callee,
                imported,
                args,
                dst,
            } => self.emit_call(callee, *imported, args, Some(dst)),
            Instruction::CallNoResult {
                callee,
                imported,
                args,
            } => self.emit_call(callee, *imported, args, None),
            Instruction::Return { value } => {
                if let Some(value) = value {
                    let operand = self.resolve_emitted(value);
                    self.body
                        .push(X64Instr::mov(operand, Operand::Reg(Reg::RETURN_REG)));
                }
            }
            // the address is composed by the resolver at each use site
            Instruction::GetAddress { .. } => {}
            Instruction::BoundsCheck {
                index,
                length,
                check_id,
            } => self.emit_bounds_check(index, *length, *check_id),
            other @ (Instruction::GlobalAlloc { .. } | Instruction::StringAlloc { .. }) => {
                panic!("prologue instruction reached the emitter: {}", other)
            }
        }
    }

    /// Park every incoming argument in its initial location: the first six
    /// from the argument registers, the rest from the caller's frame.
    fn save_method_args(&mut self, method: &Method) {
        for (index, param) in method.params.iter().enumerate() {
            let dst = self.resolver.initial_argument_location(param);
            if index < Reg::N_ARG_REGISTERS {
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::ARG_REGISTERS[index]), dst));
            } else {
                // above the saved frame pointer and return address
                let src = Operand::Stack {
                    base: Reg::Rbp,
                    offset: (index as i64 - 5) * WORD_SIZE + WORD_SIZE,
                };
                self.body
                    .push(X64Instr::mov(src, Operand::Reg(Reg::COPY_TEMP)));
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst));
            }
        }
    }

    /// Patch the prologue at the recorded splice point, then unwind it.
    fn emit_method_end(&mut self, is_main: bool) {
        let frame = round_up16(-self.resolver.current_stack_offset());
        let saves = self.allocator.used_callee_saved(&self.current_method);

        let mut patch = vec![
            X64Instr::Unary {
                op: X64UnOp::Pushq,
                operand: Operand::Reg(Reg::Rbp),
            },
            X64Instr::mov(Operand::Reg(Reg::Rsp), Operand::Reg(Reg::Rbp)),
            X64Instr::Binary {
                op: X64BinOp::Subq,
                src: Operand::Imm(frame),
                dst: Operand::Reg(Reg::Rsp),
            },
        ];
        for reg in &saves {
            patch.push(X64Instr::Unary {
                op: X64UnOp::Pushq,
                operand: Operand::Reg(*reg),
            });
        }
        let at = self.ctx.prologue_index;
        self.body.splice(at..at, patch);

        for reg in saves.iter().rev() {
            self.body.push(X64Instr::Unary {
                op: X64UnOp::Popq,
                operand: Operand::Reg(*reg),
            });
        }
        self.body.push(X64Instr::Binary {
            op: X64BinOp::Addq,
            src: Operand::Imm(frame),
            dst: Operand::Reg(Reg::Rsp),
        });
        self.body.push(X64Instr::Unary {
            op: X64UnOp::Popq,
            operand: Operand::Reg(Reg::Rbp),
        });
        if is_main {
            self.body.push(X64Instr::ZeroEax);
        }
        self.body.push(X64Instr::Ret);
    }

    /// A copy is emitted only when source and destination disagree, and
    /// never as a memory-to-memory move.
    fn emit_copy(&mut self, dst: &IrValue, src: &IrValue) {
        let src_op = self.resolve_emitted(src);
        let dst_op = self.resolve_emitted(dst);
        if src_op == dst_op {
            return;
        }
        if matches!(src_op, Operand::StrRef(_)) {
            // strings are loaded by address
            if dst_op.is_register() {
                self.body.push(X64Instr::Binary {
                    op: X64BinOp::Leaq,
                    src: src_op,
                    dst: dst_op,
                });
            } else {
                self.body.push(X64Instr::Binary {
                    op: X64BinOp::Leaq,
                    src: src_op,
                    dst: Operand::Reg(Reg::COPY_TEMP),
                });
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op));
            }
        } else if src_op.is_register() || src_op.is_immediate() || dst_op.is_register() {
            self.body.push(X64Instr::mov(src_op, dst_op));
        } else {
            self.body
                .push(X64Instr::mov(src_op, Operand::Reg(Reg::COPY_TEMP)));
            self.body
                .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op));
        }
    }

    fn emit_unary(&mut self, op: UnaryOp, dst: &IrValue, operand: &IrValue) {
        match op {
            UnaryOp::Neg => {
                let operand_op = self.resolve_emitted(operand);
                self.body
                    .push(X64Instr::mov(operand_op, Operand::Reg(Reg::COPY_TEMP)));
                self.body.push(X64Instr::Unary {
                    op: X64UnOp::Negq,
                    operand: Operand::Reg(Reg::COPY_TEMP),
                });
                let dst_op = self.resolve_emitted(dst);
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op));
            }
            UnaryOp::Not => {
                let operand_op = self.resolve_emitted(operand);
                self.body
                    .push(X64Instr::mov(operand_op, Operand::Reg(Reg::COPY_TEMP)));
                let dst_op = self.resolve_emitted(dst);
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op.clone()));
                self.body.push(X64Instr::Binary {
                    op: X64BinOp::Xorq,
                    src: Operand::Imm(1),
                    dst: dst_op,
                });
            }
        }
    }

    /// Load the first operand into the scratch register, apply the
    /// operator against the second, store to the destination.
    fn emit_arithmetic(&mut self, op: BinaryOp, dst: &IrValue, lhs: &IrValue, rhs: &IrValue) {
        let lhs_op = self.resolve_emitted(lhs);
        self.body
            .push(X64Instr::mov(lhs_op, Operand::Reg(Reg::COPY_TEMP)));
        let rhs_op = self.resolve_emitted(rhs);
        self.body.push(X64Instr::Binary {
            op: X64BinOp::from_ir_op(op),
            src: rhs_op,
            dst: Operand::Reg(Reg::COPY_TEMP),
        });
        let dst_op = self.resolve_emitted(dst);
        self.body
            .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op));
    }

    /// Signed division: dividend in %rax, sign-extended; the quotient or
    /// remainder lands in the destination. %rdx is preserved around the
    /// operation unless the destination is %rdx itself.
    fn emit_div_mod(&mut self, op: BinaryOp, dst: &IrValue, lhs: &IrValue, rhs: &IrValue) {
        let dst_op = self.resolve_emitted(dst);
        let preserve_rdx = dst_op != Operand::Reg(Reg::Rdx);
        if preserve_rdx {
            let slot = self.resolver.resolve_next_stack_location(Reg::Rdx);
            self.body.push(X64Instr::mov(Operand::Reg(Reg::Rdx), slot));
        }

        let lhs_op = self.resolve_emitted(lhs);
        self.body
            .push(X64Instr::mov(lhs_op, Operand::Reg(Reg::Rax)));
        let rhs_op = self.resolve_emitted(rhs);
        // an immediate cannot feed idivq, and a divisor resident in %rdx
        // is about to be clobbered by the sign extension
        let divisor = if rhs_op.is_immediate() || rhs_op == Operand::Reg(Reg::Rdx) {
            self.body
                .push(X64Instr::mov(rhs_op, Operand::Reg(Reg::COPY_TEMP)));
            Operand::Reg(Reg::COPY_TEMP)
        } else {
            rhs_op
        };
        self.body.push(X64Instr::Cqto);
        self.body.push(X64Instr::Unary {
            op: X64UnOp::Idivq,
            operand: divisor,
        });

        let result = if op == BinaryOp::Mod { Reg::Rdx } else { Reg::Rax };
        self.body
            .push(X64Instr::mov(Operand::Reg(result), dst_op));
        if preserve_rdx {
            let slot = self.resolver.resolve_next_stack_location(Reg::Rdx);
            self.body.push(X64Instr::mov(slot, Operand::Reg(Reg::Rdx)));
        }
    }

    /// Compare into the scratch register, set the flag byte, widen, store;
    /// the operator is recorded for fusion with an adjacent branch.
    fn emit_comparison(&mut self, op: BinaryOp, dst: &IrValue, lhs: &IrValue, rhs: &IrValue) {
        self.ctx.last_comparison = Some(op);
        let lhs_op = self.resolve_emitted(lhs);
        self.body
            .push(X64Instr::mov(lhs_op, Operand::Reg(Reg::COPY_TEMP)));
        let rhs_op = self.resolve_emitted(rhs);
        self.body.push(X64Instr::Binary {
            op: X64BinOp::Cmpq,
            src: rhs_op,
            dst: Operand::Reg(Reg::COPY_TEMP),
        });
        self.body.push(X64Instr::SetCc {
            cc: Cc::from_comparison(op),
        });
        self.body.push(X64Instr::MovZxByte {
            dst: Operand::Reg(Reg::COPY_TEMP),
        });
        let dst_op = self.resolve_emitted(dst);
        self.body
            .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), dst_op));
    }

    /// The branch tests "is the condition false". With a fusable
    /// comparison pending, that is a single inverted conditional jump;
    /// otherwise the resolved condition is compared against zero.
    fn emit_cond_branch(&mut self, condition: &IrValue, target: &str, fused: Option<BinaryOp>) {
        let cond_op = self.resolve_emitted(condition);
        if let Some(op) = fused {
            self.body.push(X64Instr::Jcc {
                cc: Cc::from_comparison(op).negate(),
                target: target.to_string(),
            });
            return;
        }
        if cond_op.is_immediate() {
            self.body
                .push(X64Instr::mov(cond_op, Operand::Reg(Reg::COPY_TEMP)));
            self.body.push(X64Instr::Binary {
                op: X64BinOp::Cmpq,
                src: Operand::Imm(0),
                dst: Operand::Reg(Reg::COPY_TEMP),
            });
        } else {
            self.body.push(X64Instr::Binary {
                op: X64BinOp::Cmpq,
                src: Operand::Imm(0),
                dst: cond_op,
            });
        }
        self.body.push(X64Instr::Jcc {
            cc: Cc::E,
            target: target.to_string(),
        });
    }

    /// `0 <= index < length`, each half guarded by a done-label with an
    /// unconditional fault exit on failure.
    fn emit_bounds_check(&mut self, index: &IrValue, length: i64, check_id: usize) {
        let resolved = self.resolve_emitted(index);
        let index_op = if resolved.is_immediate() {
            self.body
                .push(X64Instr::mov(resolved, Operand::Reg(Reg::COPY_TEMP)));
            Operand::Reg(Reg::COPY_TEMP)
        } else {
            resolved
        };

        let non_negative = format!("index_non_negative_check_done_{}", check_id);
        let within_length = format!("index_less_than_array_length_check_done_{}", check_id);

        self.body.push(X64Instr::Binary {
            op: X64BinOp::Cmpq,
            src: Operand::Imm(0),
            dst: index_op.clone(),
        });
        self.body.push(X64Instr::Jcc {
            cc: Cc::Ge,
            target: non_negative.clone(),
        });
        self.emit_fault_exit();
        self.body.push(X64Instr::label(&non_negative));

        self.body.push(X64Instr::Binary {
            op: X64BinOp::Cmpq,
            src: Operand::Imm(length),
            dst: index_op,
        });
        self.body.push(X64Instr::Jcc {
            cc: Cc::L,
            target: within_length.clone(),
        });
        self.emit_fault_exit();
        self.body.push(X64Instr::label(&within_length));
    }

    fn emit_fault_exit(&mut self) {
        self.body
            .push(X64Instr::mov(Operand::Imm(-1), Operand::Reg(Reg::Rdi)));
        self.body.push(X64Instr::Call {
            target: "_exit".to_string(),
        });
    }

    fn call_target(&self, callee: &str, imported: bool) -> String {
        if imported {
            format!("_{}", callee)
        } else if self.program.method(callee).is_main {
            "_main".to_string()
        } else {
            callee.to_string()
        }
    }

    fn emit_call(
        &mut self,
        callee: &str,
        imported: bool,
        args: &[IrValue],
        dst: Option<&IrValue>,
    ) {
        let pre_result = dst.map(|d| self.resolve_emitted(d));
        self.caller_save(pre_result.as_ref());
        self.schedule_arguments(args);
        if imported {
            // variadic externals expect a zeroed accumulator
            self.body.push(X64Instr::ZeroEax);
        }
        self.body.push(X64Instr::Call {
            target: self.call_target(callee, imported),
        });
        if let Some(d) = dst {
            // argument staging may have remapped the destination; resolve
            // it afresh before moving the result out of %rax
            let post = self.resolve_emitted(d);
            self.body
                .push(X64Instr::mov(Operand::Reg(Reg::Rax), post));
        }
        self.restore_stack_arguments(args.len());
        let post_result = dst.map(|d| self.resolve_emitted(d));
        self.caller_restore(post_result.as_ref());
    }

    /// Store every live caller-saved register to its save slot, except the
    /// one about to receive the call's result.
    fn caller_save(&mut self, exclude: Option<&Operand>) {
        let live = self
            .allocator
            .live_registers_at(&self.current_method, self.flat_index);
        for reg in Reg::CALLER_SAVED {
            if !live.contains(reg) {
                continue;
            }
            if matches!(exclude, Some(Operand::Reg(r)) if r == reg) {
                continue;
            }
            let slot = self.resolver.resolve_next_stack_location(*reg);
            self.body.push(X64Instr::mov(Operand::Reg(*reg), slot));
        }
    }

    fn caller_restore(&mut self, exclude: Option<&Operand>) {
        let live = self
            .allocator
            .live_registers_at(&self.current_method, self.flat_index);
        for reg in Reg::CALLER_SAVED {
            if !live.contains(reg) {
                continue;
            }
            if matches!(exclude, Some(Operand::Reg(r)) if r == reg) {
                continue;
            }
            let slot = self.resolver.resolve_next_stack_location(*reg);
            self.body.push(X64Instr::mov(slot, Operand::Reg(*reg)));
        }
    }

    /// Stage all arguments per the calling convention: overflow arguments
    /// into a 16-byte-aligned stack region, the first six into argument
    /// registers, placed highest index first so no placed argument is
    /// overwritten by a later move.
    fn schedule_arguments(&mut self, args: &[IrValue]) {
        let k = args.len();
        let n_regs = k.min(Reg::N_ARG_REGISTERS);

        if k > Reg::N_ARG_REGISTERS {
            let space = round_up16((k - Reg::N_ARG_REGISTERS) as i64 * WORD_SIZE);
            self.body.push(X64Instr::Binary {
                op: X64BinOp::Subq,
                src: Operand::Imm(space),
                dst: Operand::Reg(Reg::Rsp),
            });
        }
        for (position, arg) in args.iter().enumerate().skip(Reg::N_ARG_REGISTERS) {
            let slot = Operand::Stack {
                base: Reg::Rsp,
                offset: (position - Reg::N_ARG_REGISTERS) as i64 * WORD_SIZE,
            };
            let operand = self.resolve_emitted(arg);
            if matches!(operand, Operand::StrRef(_)) {
                self.body.push(X64Instr::Binary {
                    op: X64BinOp::Leaq,
                    src: operand,
                    dst: Operand::Reg(Reg::COPY_TEMP),
                });
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), slot));
            } else if matches!(arg, IrValue::StackArray { .. } | IrValue::MemAddr { .. })
                || self.resolver.is_stack_mapped(arg)
            {
                self.body
                    .push(X64Instr::mov(operand, Operand::Reg(Reg::COPY_TEMP)));
                self.body
                    .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), slot));
            } else {
                self.body.push(X64Instr::mov(operand, slot));
            }
        }

        // register arguments: resolve first without emitting, then check
        // for conflicts with later target registers
        let mut resolved = Vec::with_capacity(n_regs);
        let mut preps = Vec::with_capacity(n_regs);
        for arg in &args[..n_regs] {
            let (operand, prep) = self.resolver.resolve(arg);
            resolved.push(operand);
            preps.push(prep);
        }

        let mut staged = vec![false; n_regs];
        let mut prep_emitted = vec![false; n_regs];
        for i in 0..n_regs {
            let later_targets = &Reg::ARG_REGISTERS[i + 1..n_regs];
            let conflicts = resolved[i]
                .registers_in_use()
                .iter()
                .any(|r| later_targets.contains(r));
            if conflicts {
                let prep = std::mem::take(&mut preps[i]);
                self.body.extend(prep);
                prep_emitted[i] = true;
                let cache = self.resolver.push_stack_no_save();
                self.stage_to_slot(&resolved[i], &cache);
                resolved[i] = cache;
                staged[i] = true;
            }
        }

        let mut deferred = Vec::new();
        for i in (0..n_regs).rev() {
            let target = Operand::Reg(Reg::ARG_REGISTERS[i]);
            let mv = if matches!(resolved[i], Operand::StrRef(_)) {
                X64Instr::Binary {
                    op: X64BinOp::Leaq,
                    src: resolved[i].clone(),
                    dst: target,
                }
            } else {
                X64Instr::mov(resolved[i].clone(), target)
            };
            if staged[i] {
                deferred.push(mv);
            } else {
                if !prep_emitted[i] {
                    let prep = std::mem::take(&mut preps[i]);
                    self.body.extend(prep);
                }
                self.body.push(mv);
            }
        }
        self.body.extend(deferred);
    }

    fn stage_to_slot(&mut self, src: &Operand, slot: &Operand) {
        if matches!(src, Operand::Mem { .. }) {
            self.body
                .push(X64Instr::mov(src.clone(), Operand::Reg(Reg::COPY_TEMP)));
            self.body
                .push(X64Instr::mov(Operand::Reg(Reg::COPY_TEMP), slot.clone()));
        } else {
            self.body.push(X64Instr::mov(src.clone(), slot.clone()));
        }
    }

    fn restore_stack_arguments(&mut self, arg_count: usize) {
        if arg_count > Reg::N_ARG_REGISTERS {
            let space = round_up16((arg_count - Reg::N_ARG_REGISTERS) as i64 * WORD_SIZE);
            self.body.push(X64Instr::Binary {
                op: X64BinOp::Addq,
                src: Operand::Imm(space),
                dst: Operand::Reg(Reg::Rsp),
            });
        }
    }
}

fn emit_program_prologue(program: &ProgramIr) -> Vec<X64Instr> {
    let mut out = vec![X64Instr::Directive(".data".to_string())];
    for instr in &program.prologue {
        match instr {
            Instruction::StringAlloc { label, content } => {
                out.push(X64Instr::Directive(format!("{}:", label)));
                out.push(X64Instr::Directive(format!("\t.string {:?}", content)));
            }
            Instruction::GlobalAlloc { name, size, .. } => {
                out.push(X64Instr::Directive(format!(
                    "\t.comm {},{},{}",
                    name, size, WORD_SIZE
                )));
            }
            other => panic!("unexpected instruction in program prologue: {}", other),
        }
    }
    out
}
