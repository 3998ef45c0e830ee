// Pretty error reporting with source highlighting using ariadne

use ariadne::{Color, Label, Report, ReportKind, Source};
use std::ops::Range;

/// A located message, detached from the chumsky error types so lexer and
/// parser errors report the same way.
#[derive(Debug)]
pub struct Diagnostic {
    pub message: String,
    pub span: Range<usize>,
}

/// Report a batch of diagnostics with source highlighting
pub fn report_diagnostics(filename: &str, source: &str, stage: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let report = Report::build(ReportKind::Error, diagnostic.span.clone())
            .with_message(format!("{} error", stage))
            .with_label(
                Label::new(diagnostic.span.clone())
                    .with_message(&diagnostic.message)
                    .with_color(Color::Red),
            )
            .finish();
        report
            .eprint(Source::from(source))
            .expect("Failed to print error report");

        eprintln!(
            "  --> {}:{}",
            filename,
            get_line_col(source, diagnostic.span.start)
        );
    }
}

fn get_line_col(source: &str, offset: usize) -> String {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.chars().enumerate() {
        if i == offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    format!("{}:{}", line, col)
}
