//! Mocha Compiler Pipeline
//!
//! End-to-end compilation from IR text to x86-64 assembly text.
//!
//! # Pipeline Stages
//!
//! ```text
//! IR Source (&str)
//!     │
//!     ▼ lexer
//! Tokens (Vec<Spanned<Token>>)
//!     │
//!     ▼ parser
//! Raw program (RawProgram)
//!     │
//!     ▼ build
//! Program IR (ProgramIr) - CFG form
//!     │
//!     ▼ liveness + linear scan
//! Allocation decision (RegisterAllocator)
//!     │
//!     ▼ emit
//! Assembly (String)
//! ```

use crate::backend::{write_program, RegisterAllocator};
use crate::frontend::{
    build_program, lexer, program_parser, report_diagnostics, BuildError, Diagnostic,
};
use chumsky::prelude::*;
use std::fmt;

/// Compilation error types
#[derive(Debug)]
pub enum CompileError {
    /// Lexer errors (tokenization failed)
    Lex(Vec<Diagnostic>),
    /// Parser errors (syntax errors)
    Parse(Vec<Diagnostic>),
    /// IR builder rejections (malformed program)
    Build(BuildError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(diagnostics) => {
                write!(f, "{} lexer error(s)", diagnostics.len())
            }
            CompileError::Parse(diagnostics) => {
                write!(f, "{} parse error(s)", diagnostics.len())
            }
            CompileError::Build(error) => write!(f, "build error: {}", error),
        }
    }
}

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated assembly as text
    pub asm: String,
}

fn to_diagnostics<T: fmt::Display>(errors: Vec<Rich<'_, T>>) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|error| Diagnostic {
            message: error.to_string(),
            span: error.span().start..error.span().end,
        })
        .collect()
}

/// Compile IR text to assembly
///
/// This is the main entry point for the compiler pipeline.
///
/// # Example
///
/// ```
/// use mocha::pipeline::compile;
///
/// let source = "define @main() { body: %x = add 1, 2 \n return %x }";
/// let output = compile(source).unwrap();
/// assert!(output.asm.contains("_main:"));
/// ```
pub fn compile(source: &str) -> Result<CompileOutput, CompileError> {
    // Stage 1: Lexical analysis
    let tokens = lexer()
        .parse(source)
        .into_result()
        .map_err(|errors| CompileError::Lex(to_diagnostics(errors)))?;

    // Stage 2: Parsing
    let eoi = (source.len()..source.len()).into();
    let token_stream = tokens.as_slice().map(eoi, |(t, s)| (t, s));
    let raw = program_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errors| CompileError::Parse(to_diagnostics(errors)))?;

    // Stage 3: Build the CFG-shaped program IR
    let program = build_program(&raw).map_err(CompileError::Build)?;

    // Stage 4: Liveness and register allocation
    let allocator = RegisterAllocator::new(&program);

    // Stage 5: Emit assembly text
    let asm = write_program(&program, &allocator);

    Ok(CompileOutput { asm })
}

/// Compile and report errors with source context
///
/// Convenience wrapper that prints pretty error messages when compilation
/// fails.
#[allow(clippy::result_unit_err)]
pub fn compile_and_report(filename: &str, source: &str) -> Result<String, ()> {
    match compile(source) {
        Ok(output) => Ok(output.asm),
        Err(CompileError::Lex(diagnostics)) => {
            report_diagnostics(filename, source, "lexer", &diagnostics);
            Err(())
        }
        Err(CompileError::Parse(diagnostics)) => {
            report_diagnostics(filename, source, "parse", &diagnostics);
            Err(())
        }
        Err(CompileError::Build(error)) => {
            eprintln!("error in {}: {}", filename, error);
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_minimal_main() {
        let source = r#"
            define @main() {
            body:
                return 0
            }
        "#;

        let result = compile(source);
        assert!(result.is_ok(), "Compilation failed: {:?}", result.err());

        let output = result.unwrap();
        assert!(output.asm.contains(".text"));
        assert!(output.asm.contains(".globl _main"));
        assert!(output.asm.contains("_main:"));
        assert!(output.asm.contains("\tretq"));
        assert!(output.asm.contains(".subsections_via_symbols"));
    }

    #[test]
    fn test_compile_add_function() {
        let source = r#"
            define @add(x, y) {
            body:
                %s = add %x, %y
                return %s
            }

            define @main() {
            body:
                %r = call @add(20, 22)
                return %r
            }
        "#;

        let result = compile(source);
        assert!(result.is_ok(), "Compilation failed: {:?}", result.err());

        let output = result.unwrap();
        assert!(output.asm.contains("add:"));
        assert!(output.asm.contains("\taddq"));
        assert!(output.asm.contains("\tcallq\tadd"));
    }

    #[test]
    fn test_compile_globals_and_strings() {
        let source = r#"
            import printf
            global counter, 8
            string str_0 "done\n"

            define @main() {
            body:
                %c = @counter
                call @printf(str_0, %c)
                return 0
            }
        "#;

        let output = compile(source).unwrap();
        assert!(output.asm.contains(".data"));
        assert!(output.asm.contains("\t.comm counter,8,8"));
        assert!(output.asm.contains("str_0:"));
        assert!(output.asm.contains("\t.string \"done\\n\""));
        assert!(output.asm.contains("\tcallq\t_printf"));
        // string arguments travel by address
        assert!(output.asm.contains("\tleaq\tstr_0(%rip)"));
    }

    #[test]
    fn test_compile_loop_with_branch() {
        let source = r#"
            define @main() {
            head:
                %c = lt %i, 10
                if_false %c goto done
            body:
                %i = add %i, 1
                goto head
            done:
                return %i
            }
        "#;

        let output = compile(source).unwrap();
        assert!(output.asm.contains(".main_done:"));
        // the fused branch jumps on the inverted comparison
        assert!(output.asm.contains("\tjge\t.main_done"));
        // the back edge is an explicit jump
        assert!(output.asm.contains("\tjmp\t.main_head"));
    }

    #[test]
    fn test_compile_parse_error() {
        let source = "define @main( { body: return }";
        let result = compile(source);
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_compile_build_error() {
        let source = "define @main() { body: goto nowhere }";
        let result = compile(source);
        assert!(matches!(result, Err(CompileError::Build(_))));
    }
}
