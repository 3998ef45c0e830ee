//! Textual IR Frontend
//!
//! Loads the backend's input contract from `.ir` text: a lexer and parser
//! for the three-address surface syntax, and a builder that shapes the
//! parsed form into the control-flow-graph program IR. This stands in for
//! the out-of-scope language frontend; it is a loader, not a compiler
//! frontend.

pub mod build;
pub mod lexer;
pub mod parser;
pub mod report;

use chumsky::prelude::SimpleSpan;

pub type Span = SimpleSpan<usize>;
pub type Spanned<T> = (T, Span);

pub use build::{build_program, BuildError};
pub use lexer::{lexer, Token};
pub use parser::{program_parser, Item, RawBlock, RawInstr, RawMethod, RawProgram, RawValue};
pub use report::{report_diagnostics, Diagnostic};
