//! x86-64 Register Definitions
//!
//! The register set and the classes the backend carves it into, following
//! the System V AMD64 ABI. `R10` is the scratch copy register and is held
//! out of the allocatable pool entirely; `RSP`/`RBP` delimit the frame.

use std::fmt;

/// x86-64 general purpose registers (64-bit)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rsp,
    Rbp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    /// Allocation order of the register pool. Argument registers come
    /// last and in reverse argument order, so the values allocated first
    /// (parameters, whose intervals open the method) land in non-argument
    /// registers and parameter materialization needs minimal shuffling.
    pub const REGS_TO_ALLOCATE: &'static [Reg] = &[
        Reg::R11,
        Reg::R12,
        Reg::R13,
        Reg::R14,
        Reg::R15,
        Reg::Rdx,
        Reg::Rcx,
        Reg::R9,
        Reg::R8,
        Reg::Rsi,
        Reg::Rdi,
    ];

    /// Argument registers in parameter order
    pub const ARG_REGISTERS: &'static [Reg] = &[
        Reg::Rdi,
        Reg::Rsi,
        Reg::Rdx,
        Reg::Rcx,
        Reg::R8,
        Reg::R9,
    ];

    /// How many arguments travel in registers
    pub const N_ARG_REGISTERS: usize = 6;

    /// Registers a call may clobber
    pub const CALLER_SAVED: &'static [Reg] = &[
        Reg::R10,
        Reg::R11,
        Reg::Rdi,
        Reg::Rsi,
        Reg::Rdx,
        Reg::Rcx,
        Reg::R8,
        Reg::R9,
        Reg::Rax,
    ];

    /// Registers a callee must preserve (of the allocatable pool)
    pub const CALLEE_SAVED: &'static [Reg] = &[Reg::R12, Reg::R13, Reg::R14, Reg::R15];

    /// Scratch register for copies and operand routing; never allocated
    pub const COPY_TEMP: Reg = Reg::R10;

    /// Return value register
    pub const RETURN_REG: Reg = Reg::Rax;

    pub fn is_caller_saved(self) -> bool {
        Self::CALLER_SAVED.contains(&self)
    }

    pub fn is_callee_saved(self) -> bool {
        Self::CALLEE_SAVED.contains(&self)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        };
        write!(f, "%{}", name)
    }
}
