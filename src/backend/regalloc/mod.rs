//! Register Allocation
//!
//! Liveness analysis feeding a live-interval-based linear scan. The
//! allocator decides, per method, which abstract values live in which
//! physical registers and which are spilled; the value resolver turns
//! those decisions into concrete operands during emission.

pub mod allocator;
pub mod liveness;

pub use allocator::{Allocation, RegisterAllocator};
pub use liveness::{LiveInterval, LiveIntervals, MethodLiveness};
