//! Mocha Compiler Backend
//!
//! Turns the linear three-address program IR into x86-64 assembly text.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Program IR  │──▶│ Liveness +   │──▶│ Trace        │──▶│ Code Emitter │
//! │ (CFG form)  │   │ Linear Scan  │   │ Scheduler    │   │ + Resolver   │
//! └─────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! # Modules
//!
//! - `regalloc`: liveness analysis and live-interval linear scan
//! - `trace`: control-flow-graph linearization
//! - `resolver`: abstract value → physical location resolution
//! - `x86_64`: target registers, operands and instruction forms
//! - `emit`: per-instruction lowering and assembly text output

pub mod emit;
pub mod regalloc;
pub mod resolver;
pub mod trace;
pub mod x86_64;

pub use emit::write_program;
pub use regalloc::{Allocation, RegisterAllocator};
pub use resolver::ValueResolver;
