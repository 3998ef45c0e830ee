//! Mocha
//!
//! The native backend of a teaching compiler: a linear three-address IR
//! goes in, x86-64 assembly text comes out. The interesting work lives in
//! the backend: live-interval register allocation, value resolution with
//! on-demand spilling, trace scheduling and calling-convention lowering;
//! the frontend is a thin loader for a textual form of the IR.

pub mod backend;
pub mod cli;
pub mod frontend;
pub mod ir;
pub mod pipeline;

pub use pipeline::{compile, compile_and_report, CompileError, CompileOutput};
