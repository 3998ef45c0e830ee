//! IR Builder
//!
//! Shapes a parsed program into the control-flow-graph IR the backend
//! consumes: classifies operands against the declared globals, strings and
//! stack arrays, rewrites address destinations into memory-address values,
//! mangles block labels to be unique program-wide, synthesizes each
//! method's entry and exit blocks, and validates the result.

use super::parser::{Item, RawBlock, RawInstr, RawMethod, RawProgram, RawValue};
use crate::ir::{BasicBlock, BlockKind, Instruction, IrValue, Method, ProgramIr};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Rejections the builder can issue. These are user errors in the input
/// text, not backend invariant violations.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildError {
    DuplicateDeclaration { name: String },
    DuplicateMethod { name: String },
    DuplicateLabel { method: String, label: String },
    ReservedLabel { method: String, label: String },
    UnknownLabel { method: String, label: String },
    UnknownCallee { method: String, name: String },
    UnknownGlobal { method: String, name: String },
    UnknownStringLabel { method: String, name: String },
    InvalidArrayUse { method: String, name: String },
    InvalidIndex { method: String, name: String },
    AddressRedefined { method: String, name: String },
    MissingTerminator { method: String, label: String },
    BranchFallsOffMethod { method: String, label: String },
    MissingMain,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateDeclaration { name } => {
                write!(f, "`{}` is declared more than once", name)
            }
            BuildError::DuplicateMethod { name } => {
                write!(f, "method @{} is defined more than once", name)
            }
            BuildError::DuplicateLabel { method, label } => {
                write!(f, "duplicate label `{}` in @{}", label, method)
            }
            BuildError::ReservedLabel { method, label } => {
                write!(f, "label `{}` in @{} is reserved", label, method)
            }
            BuildError::UnknownLabel { method, label } => {
                write!(f, "branch to unknown label `{}` in @{}", label, method)
            }
            BuildError::UnknownCallee { method, name } => write!(
                f,
                "call to `{}` in @{}: neither defined nor imported",
                name, method
            ),
            BuildError::UnknownGlobal { method, name } => {
                write!(f, "unknown global @{} referenced in @{}", name, method)
            }
            BuildError::UnknownStringLabel { method, name } => {
                write!(f, "unknown string constant `{}` referenced in @{}", name, method)
            }
            BuildError::InvalidArrayUse { method, name } => write!(
                f,
                "array `{}` may only be the base of a getaddr in @{}",
                name, method
            ),
            BuildError::InvalidIndex { method, name } => write!(
                f,
                "`{}` cannot index an address in @{}",
                name, method
            ),
            BuildError::AddressRedefined { method, name } => {
                write!(f, "address value %{} redefined in @{}", name, method)
            }
            BuildError::MissingTerminator { method, label } => write!(
                f,
                "block `{}` in @{} falls off the end of the method",
                label, method
            ),
            BuildError::BranchFallsOffMethod { method, label } => write!(
                f,
                "conditional branch in block `{}` of @{} has no fall-through block",
                label, method
            ),
            BuildError::MissingMain => write!(f, "no @main method defined"),
        }
    }
}

/// Declarations visible to every method
struct ProgramContext<'src> {
    imports: HashSet<&'src str>,
    /// name -> is_array
    globals: HashMap<&'src str, bool>,
    strings: HashSet<&'src str>,
    method_names: HashSet<&'src str>,
}

/// Build the program IR from a parsed program.
pub fn build_program(raw: &RawProgram<'_>) -> Result<ProgramIr, BuildError> {
    let mut ctx = ProgramContext {
        imports: HashSet::new(),
        globals: HashMap::new(),
        strings: HashSet::new(),
        method_names: HashSet::new(),
    };
    let mut prologue = Vec::new();

    for item in &raw.items {
        match item {
            Item::Import(name) => {
                ctx.imports.insert(*name);
            }
            Item::Global { name, size } => {
                if ctx.globals.contains_key(name) || ctx.strings.contains(name) {
                    return Err(BuildError::DuplicateDeclaration {
                        name: name.to_string(),
                    });
                }
                prologue.push(Instruction::GlobalAlloc {
                    name: name.to_string(),
                    size: *size,
                    is_array: false,
                });
                ctx.globals.insert(*name, false);
            }
            Item::Array { name, len } => {
                if ctx.globals.contains_key(name) || ctx.strings.contains(name) {
                    return Err(BuildError::DuplicateDeclaration {
                        name: name.to_string(),
                    });
                }
                prologue.push(Instruction::GlobalAlloc {
                    name: name.to_string(),
                    size: len * 8,
                    is_array: true,
                });
                ctx.globals.insert(*name, true);
            }
            Item::StringConst { label, value } => {
                if ctx.strings.contains(label) || ctx.globals.contains_key(label) {
                    return Err(BuildError::DuplicateDeclaration {
                        name: label.to_string(),
                    });
                }
                prologue.push(Instruction::StringAlloc {
                    label: label.to_string(),
                    content: value.clone(),
                });
                ctx.strings.insert(*label);
            }
            Item::Method(method) => {
                if !ctx.method_names.insert(method.name) {
                    return Err(BuildError::DuplicateMethod {
                        name: method.name.to_string(),
                    });
                }
            }
        }
    }

    if !ctx.method_names.contains("main") {
        return Err(BuildError::MissingMain);
    }

    let mut check_id = 0usize;
    let mut methods = Vec::new();
    for item in &raw.items {
        if let Item::Method(method) = item {
            methods.push(build_method(method, &ctx, &mut check_id)?);
        }
    }

    Ok(ProgramIr { prologue, methods })
}

struct MethodBuilder<'a, 'src> {
    ctx: &'a ProgramContext<'src>,
    name: &'src str,
    stack_arrays: HashMap<&'src str, u64>,
    addresses: HashMap<&'src str, IrValue>,
}

impl<'a, 'src> MethodBuilder<'a, 'src> {
    fn err_array(&self, name: &str) -> BuildError {
        BuildError::InvalidArrayUse {
            method: self.name.to_string(),
            name: name.to_string(),
        }
    }

    /// Classify a general operand. Arrays are rejected here; only a
    /// getaddr base may name one.
    fn value(&self, raw: &RawValue<'src>) -> Result<IrValue, BuildError> {
        match raw {
            RawValue::Int(n) => Ok(IrValue::Int(*n)),
            RawValue::Var(name) => {
                if let Some(addr) = self.addresses.get(name) {
                    Ok(addr.clone())
                } else if self.stack_arrays.contains_key(name) {
                    Err(self.err_array(name))
                } else {
                    Ok(IrValue::Var(name.to_string()))
                }
            }
            RawValue::Global(name) => match self.ctx.globals.get(name) {
                Some(false) => Ok(IrValue::GlobalScalar(name.to_string())),
                Some(true) => Err(self.err_array(name)),
                None => Err(BuildError::UnknownGlobal {
                    method: self.name.to_string(),
                    name: name.to_string(),
                }),
            },
            RawValue::Label(name) => {
                if self.ctx.strings.contains(name) {
                    Ok(IrValue::Str(name.to_string()))
                } else {
                    Err(BuildError::UnknownStringLabel {
                        method: self.name.to_string(),
                        name: name.to_string(),
                    })
                }
            }
        }
    }

    /// A getaddr base: a stack-resident or global array.
    fn base(&self, raw: &RawValue<'src>) -> Result<IrValue, BuildError> {
        match raw {
            RawValue::Var(name) => match self.stack_arrays.get(name) {
                Some(len) => Ok(IrValue::StackArray {
                    name: name.to_string(),
                    len: *len,
                }),
                None => Err(self.err_array(name)),
            },
            RawValue::Global(name) => match self.ctx.globals.get(name) {
                Some(true) => Ok(IrValue::GlobalArray(name.to_string())),
                Some(false) => Err(self.err_array(name)),
                None => Err(BuildError::UnknownGlobal {
                    method: self.name.to_string(),
                    name: name.to_string(),
                }),
            },
            other => Err(self.err_array(&format!("{:?}", other))),
        }
    }

    /// An address index: an integer constant or a plain virtual register.
    fn index(&self, raw: &RawValue<'src>) -> Result<IrValue, BuildError> {
        match raw {
            RawValue::Int(n) => Ok(IrValue::Int(*n)),
            RawValue::Var(name)
                if !self.addresses.contains_key(name)
                    && !self.stack_arrays.contains_key(name) =>
            {
                Ok(IrValue::Var(name.to_string()))
            }
            other => Err(BuildError::InvalidIndex {
                method: self.name.to_string(),
                name: format!("{:?}", other),
            }),
        }
    }

    fn dst(&self, name: &'src str) -> Result<IrValue, BuildError> {
        self.value(&RawValue::Var(name))
    }
}

fn build_method<'src>(
    raw: &RawMethod<'src>,
    ctx: &ProgramContext<'src>,
    check_id: &mut usize,
) -> Result<Method, BuildError> {
    let name = raw.name;
    let is_main = name == "main";

    let mut labels = HashSet::new();
    for block in &raw.blocks {
        if block.label == "entry" || block.label == "exit" {
            return Err(BuildError::ReservedLabel {
                method: name.to_string(),
                label: block.label.to_string(),
            });
        }
        if !labels.insert(block.label) {
            return Err(BuildError::DuplicateLabel {
                method: name.to_string(),
                label: block.label.to_string(),
            });
        }
    }

    let mut builder = MethodBuilder {
        ctx,
        name,
        stack_arrays: HashMap::new(),
        addresses: HashMap::new(),
    };

    // collect stack arrays first: address bases refer to them
    for block in &raw.blocks {
        for instr in &block.instrs {
            if let RawInstr::StackDecl { name: array, len } = instr {
                if builder.stack_arrays.insert(*array, *len as u64).is_some()
                    || raw.params.contains(array)
                {
                    return Err(BuildError::DuplicateDeclaration {
                        name: array.to_string(),
                    });
                }
            }
        }
    }

    // then the address destinations, so later references classify as
    // memory-address values
    for block in &raw.blocks {
        for instr in &block.instrs {
            if let RawInstr::GetAddr {
                dst, base, index, ..
            } = instr
            {
                let address = IrValue::MemAddr {
                    name: dst.to_string(),
                    base: Box::new(builder.base(base)?),
                    index: Box::new(builder.index(index)?),
                };
                if raw.params.contains(dst) || builder.stack_arrays.contains_key(dst) {
                    return Err(BuildError::AddressRedefined {
                        method: name.to_string(),
                        name: dst.to_string(),
                    });
                }
                if builder.addresses.insert(*dst, address).is_some() {
                    return Err(BuildError::AddressRedefined {
                        method: name.to_string(),
                        name: dst.to_string(),
                    });
                }
            }
        }
    }

    let mangle = |label: &str| format!("{}_{}", name, label);
    let entry_label = format!("{}_entry", name);
    let exit_label = format!("{}_exit", name);

    let mut blocks = vec![BasicBlock {
        label: entry_label.clone(),
        kind: BlockKind::NoBranch {
            successor: mangle(raw.blocks[0].label),
        },
        instructions: vec![Instruction::MethodBegin {
            name: name.to_string(),
            is_main,
        }],
    }];

    for (position, block) in raw.blocks.iter().enumerate() {
        let (instructions, kind) = build_block(
            raw, block, position, &builder, &labels, &mangle, &exit_label, check_id,
        )?;
        blocks.push(BasicBlock {
            label: mangle(block.label),
            kind,
            instructions,
        });
    }

    blocks.push(BasicBlock {
        label: exit_label.clone(),
        kind: BlockKind::Exit,
        instructions: vec![Instruction::MethodEnd { is_main }],
    });

    Ok(Method {
        name: name.to_string(),
        params: raw
            .params
            .iter()
            .map(|p| IrValue::Var(p.to_string()))
            .collect(),
        blocks,
        entry: entry_label,
        exit: exit_label,
        is_main,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_block<'src>(
    raw: &RawMethod<'src>,
    block: &RawBlock<'src>,
    position: usize,
    builder: &MethodBuilder<'_, 'src>,
    labels: &HashSet<&'src str>,
    mangle: &dyn Fn(&str) -> String,
    exit_label: &str,
    check_id: &mut usize,
) -> Result<(Vec<Instruction>, BlockKind), BuildError> {
    let method = raw.name;
    let check_target = |target: &str| -> Result<(), BuildError> {
        if labels.contains(target) {
            Ok(())
        } else {
            Err(BuildError::UnknownLabel {
                method: method.to_string(),
                label: target.to_string(),
            })
        }
    };

    let mut instructions = Vec::new();
    let mut kind = None;

    for instr in &block.instrs {
        match instr {
            // collected in the scans above; reserves frame space only
            RawInstr::StackDecl { .. } => {}
            RawInstr::Copy { dst, src } => instructions.push(Instruction::Copy {
                dst: builder.dst(dst)?,
                src: builder.value(src)?,
            }),
            RawInstr::GlobalSet { name: global, src } => instructions.push(Instruction::Copy {
                dst: builder.value(&RawValue::Global(*global))?,
                src: builder.value(src)?,
            }),
            RawInstr::Unary { dst, op, operand } => instructions.push(Instruction::Unary {
                op: *op,
                dst: builder.dst(dst)?,
                operand: builder.value(operand)?,
            }),
            RawInstr::Binary { dst, op, lhs, rhs } => instructions.push(Instruction::Binary {
                op: *op,
                dst: builder.dst(dst)?,
                lhs: builder.value(lhs)?,
                rhs: builder.value(rhs)?,
            }),
            RawInstr::Call { dst, callee, args } => {
                let imported = builder.ctx.imports.contains(callee);
                if !imported && !builder.ctx.method_names.contains(callee) {
                    return Err(BuildError::UnknownCallee {
                        method: method.to_string(),
                        name: callee.to_string(),
                    });
                }
                let args = args
                    .iter()
                    .map(|arg| builder.value(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match dst {
                    Some(dst) => instructions.push(Instruction::CallWithResult {
                        callee: callee.to_string(),
                        imported,
                        args,
                        dst: builder.dst(dst)?,
                    }),
                    None => instructions.push(Instruction::CallNoResult {
                        callee: callee.to_string(),
                        imported,
                        args,
                    }),
                }
            }
            RawInstr::GetAddr {
                dst,
                base,
                index,
                length,
            } => instructions.push(Instruction::GetAddress {
                dst: builder.addresses[dst].clone(),
                base: builder.base(base)?,
                index: builder.index(index)?,
                length: *length,
            }),
            RawInstr::CheckBounds { index, length } => {
                instructions.push(Instruction::BoundsCheck {
                    index: builder.value(index)?,
                    length: *length,
                    check_id: *check_id,
                });
                *check_id += 1;
            }
            RawInstr::IfFalse { condition, target } => {
                check_target(target)?;
                let next = raw.blocks.get(position + 1).ok_or_else(|| {
                    BuildError::BranchFallsOffMethod {
                        method: method.to_string(),
                        label: block.label.to_string(),
                    }
                })?;
                let false_target = mangle(target);
                kind = Some(BlockKind::Branch {
                    condition: builder.value(condition)?,
                    true_target: mangle(next.label),
                    false_target: false_target.clone(),
                });
                instructions.push(Instruction::CondBranch {
                    condition: builder.value(condition)?,
                    false_target,
                });
            }
            RawInstr::Goto { target } => {
                check_target(target)?;
                // the jump itself is the trace scheduler's business
                kind = Some(BlockKind::NoBranch {
                    successor: mangle(target),
                });
            }
            RawInstr::Return { value } => {
                kind = Some(BlockKind::NoBranch {
                    successor: exit_label.to_string(),
                });
                instructions.push(Instruction::Return {
                    value: value.as_ref().map(|v| builder.value(v)).transpose()?,
                });
            }
        }
    }

    let kind = match kind {
        Some(kind) => kind,
        None => match raw.blocks.get(position + 1) {
            Some(next) => BlockKind::NoBranch {
                successor: mangle(next.label),
            },
            None => {
                return Err(BuildError::MissingTerminator {
                    method: method.to_string(),
                    label: block.label.to_string(),
                })
            }
        },
    };

    Ok((instructions, kind))
}
