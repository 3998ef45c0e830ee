use super::{Span, Spanned};
use crate::ir::BinaryOp;
use chumsky::prelude::*;
use std::fmt;

/// Tokens of the textual IR
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'src> {
    Num(i64),
    Ident(&'src str),
    Str(String),
    Ctrl(char),
    BinOp(BinaryOp),
    // Keywords
    Import,
    Global,
    Array,
    StringKw,
    Define,
    Stack,
    Call,
    Return,
    Goto,
    IfFalse,
    GetAddr,
    CheckBounds,
    Not,
    Neg,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Ctrl(c) => write!(f, "{c}"),
            Token::BinOp(op) => write!(f, "{op}"),
            Token::Import => write!(f, "import"),
            Token::Global => write!(f, "global"),
            Token::Array => write!(f, "array"),
            Token::StringKw => write!(f, "string"),
            Token::Define => write!(f, "define"),
            Token::Stack => write!(f, "stack"),
            Token::Call => write!(f, "call"),
            Token::Return => write!(f, "return"),
            Token::Goto => write!(f, "goto"),
            Token::IfFalse => write!(f, "if_false"),
            Token::GetAddr => write!(f, "getaddr"),
            Token::CheckBounds => write!(f, "checkbounds"),
            Token::Not => write!(f, "not"),
            Token::Neg => write!(f, "neg"),
        }
    }
}

// Lexer
pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<Rich<'src, char, Span>>> {
    // A parser for (optionally negative) integers
    let num = just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Num);

    // A parser for string literals with the usual escapes
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('\\').to('\\'),
        just('"').to('"'),
    )));
    let string = none_of("\\\"")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .map(Token::Str);

    // A parser for control characters
    let ctrl = one_of("(){}[],:=%@").map(Token::Ctrl);

    // A parser for identifiers and keywords
    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated()
                .collect::<String>(),
        )
        .to_slice()
        .map(|ident: &str| match ident {
            "import" => Token::Import,
            "global" => Token::Global,
            "array" => Token::Array,
            "string" => Token::StringKw,
            "define" => Token::Define,
            "stack" => Token::Stack,
            "call" => Token::Call,
            "return" => Token::Return,
            "goto" => Token::Goto,
            "if_false" => Token::IfFalse,
            "getaddr" => Token::GetAddr,
            "checkbounds" => Token::CheckBounds,
            "not" => Token::Not,
            "neg" => Token::Neg,
            "add" => Token::BinOp(BinaryOp::Add),
            "sub" => Token::BinOp(BinaryOp::Sub),
            "mul" => Token::BinOp(BinaryOp::Mul),
            "div" => Token::BinOp(BinaryOp::Div),
            "mod" => Token::BinOp(BinaryOp::Mod),
            "and" => Token::BinOp(BinaryOp::And),
            "or" => Token::BinOp(BinaryOp::Or),
            "eq" => Token::BinOp(BinaryOp::Eq),
            "neq" => Token::BinOp(BinaryOp::Neq),
            "lt" => Token::BinOp(BinaryOp::Lt),
            "gt" => Token::BinOp(BinaryOp::Gt),
            "leq" => Token::BinOp(BinaryOp::Leq),
            "geq" => Token::BinOp(BinaryOp::Geq),
            _ => Token::Ident(ident),
        });

    let token = num.or(string).or(ctrl).or(ident);

    // `;` starts a line comment, assembler style
    let comment = just(';')
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    token
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(comment.repeated())
        .padded()
        // If we encounter an error, skip and attempt to lex the next character as a token instead
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}
