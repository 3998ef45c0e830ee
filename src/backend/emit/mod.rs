//! Assembly Emission
//!
//! Walks each method's scheduled instruction trace and lowers every IR
//! instruction kind to x86-64, producing the final assembly text: a
//! `.data` section for globals and string constants, one labelled
//! instruction stream per method, and the end-of-object marker.

mod writer;

#[cfg(test)]
mod tests;

pub use writer::{write_program, X86Program};
