use super::lexer::Token;
use super::Span;
use crate::ir::{BinaryOp, UnaryOp};
use chumsky::{input::ValueInput, prelude::*};

/// A parsed program, before CFG shaping
#[derive(Clone, Debug, PartialEq)]
pub struct RawProgram<'src> {
    pub items: Vec<Item<'src>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item<'src> {
    Import(&'src str),
    Global { name: &'src str, size: i64 },
    Array { name: &'src str, len: i64 },
    StringConst { label: &'src str, value: String },
    Method(RawMethod<'src>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawMethod<'src> {
    pub name: &'src str,
    pub params: Vec<&'src str>,
    pub blocks: Vec<RawBlock<'src>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawBlock<'src> {
    pub label: &'src str,
    pub instrs: Vec<RawInstr<'src>>,
}

/// An operand as written: classification happens in the builder
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue<'src> {
    Int(i64),
    /// `%name`
    Var(&'src str),
    /// `@name`
    Global(&'src str),
    /// bare identifier: a string-constant label (call arguments only)
    Label(&'src str),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawInstr<'src> {
    Copy {
        dst: &'src str,
        src: RawValue<'src>,
    },
    Unary {
        dst: &'src str,
        op: UnaryOp,
        operand: RawValue<'src>,
    },
    Binary {
        dst: &'src str,
        op: BinaryOp,
        lhs: RawValue<'src>,
        rhs: RawValue<'src>,
    },
    Call {
        dst: Option<&'src str>,
        callee: &'src str,
        args: Vec<RawValue<'src>>,
    },
    GetAddr {
        dst: &'src str,
        base: RawValue<'src>,
        index: RawValue<'src>,
        length: Option<i64>,
    },
    /// `@name = value`: store to a global scalar
    GlobalSet {
        name: &'src str,
        src: RawValue<'src>,
    },
    CheckBounds {
        index: RawValue<'src>,
        length: i64,
    },
    StackDecl {
        name: &'src str,
        len: i64,
    },
    IfFalse {
        condition: RawValue<'src>,
        target: &'src str,
    },
    Goto {
        target: &'src str,
    },
    Return {
        value: Option<RawValue<'src>>,
    },
}

/// Right-hand side of an assignment, before the destination is attached
#[derive(Clone, Debug)]
enum Rhs<'src> {
    Value(RawValue<'src>),
    Unary {
        op: UnaryOp,
        operand: RawValue<'src>,
    },
    Binary {
        op: BinaryOp,
        lhs: RawValue<'src>,
        rhs: RawValue<'src>,
    },
    Call {
        callee: &'src str,
        args: Vec<RawValue<'src>>,
    },
    GetAddr {
        base: RawValue<'src>,
        index: RawValue<'src>,
        length: Option<i64>,
    },
}

// Program parser
pub fn program_parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, RawProgram<'src>, extra::Err<Rich<'tokens, Token<'src>, Span>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let ident = select! { Token::Ident(name) => name };
    let num = select! { Token::Num(n) => n };

    let var = just(Token::Ctrl('%')).ignore_then(ident);
    let value = choice((
        num.map(RawValue::Int),
        var.clone().map(RawValue::Var),
        just(Token::Ctrl('@')).ignore_then(ident).map(RawValue::Global),
    ));
    // bare identifiers name string constants; only call arguments take them
    let arg_value = value.clone().or(ident.map(RawValue::Label));

    let args = arg_value
        .separated_by(just(Token::Ctrl(',')))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::Ctrl('(')), just(Token::Ctrl(')')));

    let call = just(Token::Call)
        .ignore_then(just(Token::Ctrl('@')).ignore_then(ident))
        .then(args);

    let rhs = choice((
        select! { Token::BinOp(op) => op }
            .then(value.clone())
            .then_ignore(just(Token::Ctrl(',')))
            .then(value.clone())
            .map(|((op, lhs), rhs)| Rhs::Binary { op, lhs, rhs }),
        just(Token::Not).ignore_then(value.clone()).map(|operand| Rhs::Unary {
            op: UnaryOp::Not,
            operand,
        }),
        just(Token::Neg).ignore_then(value.clone()).map(|operand| Rhs::Unary {
            op: UnaryOp::Neg,
            operand,
        }),
        call.clone().map(|(callee, args)| Rhs::Call { callee, args }),
        just(Token::GetAddr)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Ctrl(',')))
            .then(value.clone())
            .then(just(Token::Ctrl(',')).ignore_then(num).or_not())
            .map(|((base, index), length)| Rhs::GetAddr {
                base,
                index,
                length,
            }),
        value.clone().map(Rhs::Value),
    ));

    let assign = var
        .then_ignore(just(Token::Ctrl('=')))
        .then(rhs)
        .map(|(dst, rhs)| match rhs {
            Rhs::Value(src) => RawInstr::Copy { dst, src },
            Rhs::Unary { op, operand } => RawInstr::Unary { dst, op, operand },
            Rhs::Binary { op, lhs, rhs } => RawInstr::Binary { dst, op, lhs, rhs },
            Rhs::Call { callee, args } => RawInstr::Call {
                dst: Some(dst),
                callee,
                args,
            },
            Rhs::GetAddr {
                base,
                index,
                length,
            } => RawInstr::GetAddr {
                dst,
                base,
                index,
                length,
            },
        });

    let body_instr = choice((
        assign,
        just(Token::Ctrl('@'))
            .ignore_then(ident)
            .then_ignore(just(Token::Ctrl('=')))
            .then(value.clone())
            .map(|(name, src)| RawInstr::GlobalSet { name, src }),
        call.map(|(callee, args)| RawInstr::Call {
            dst: None,
            callee,
            args,
        }),
        just(Token::CheckBounds)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Ctrl(',')))
            .then(num)
            .map(|(index, length)| RawInstr::CheckBounds { index, length }),
        just(Token::Stack)
            .ignore_then(ident)
            .then(num.delimited_by(just(Token::Ctrl('[')), just(Token::Ctrl(']'))))
            .map(|(name, len)| RawInstr::StackDecl { name, len }),
    ));

    let terminator = choice((
        just(Token::IfFalse)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Goto))
            .then(ident)
            .map(|(condition, target)| RawInstr::IfFalse { condition, target }),
        just(Token::Goto)
            .ignore_then(ident)
            .map(|target| RawInstr::Goto { target }),
        just(Token::Return)
            .ignore_then(value.or_not())
            .map(|value| RawInstr::Return { value }),
    ));

    let block = ident
        .then_ignore(just(Token::Ctrl(':')))
        .then(body_instr.repeated().collect::<Vec<_>>())
        .then(terminator.or_not())
        .map(|((label, mut instrs), terminator)| {
            if let Some(terminator) = terminator {
                instrs.push(terminator);
            }
            RawBlock { label, instrs }
        });

    let params = ident
        .separated_by(just(Token::Ctrl(',')))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::Ctrl('(')), just(Token::Ctrl(')')));

    let method = just(Token::Define)
        .ignore_then(just(Token::Ctrl('@')).ignore_then(ident))
        .then(params)
        .then(
            block
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::Ctrl('{')), just(Token::Ctrl('}'))),
        )
        .map(|((name, params), blocks)| RawMethod {
            name,
            params,
            blocks,
        })
        .labelled("method");

    let item = choice((
        just(Token::Import).ignore_then(ident).map(Item::Import),
        just(Token::Global)
            .ignore_then(ident)
            .then_ignore(just(Token::Ctrl(',')))
            .then(num)
            .map(|(name, size)| Item::Global { name, size }),
        just(Token::Array)
            .ignore_then(ident)
            .then(num.delimited_by(just(Token::Ctrl('[')), just(Token::Ctrl(']'))))
            .map(|(name, len)| Item::Array { name, len }),
        just(Token::StringKw)
            .ignore_then(ident)
            .then(select! { Token::Str(s) => s })
            .map(|(label, value)| Item::StringConst { label, value }),
        method.map(Item::Method),
    ));

    item.repeated()
        .collect::<Vec<_>>()
        .map(|items| RawProgram { items })
        .then_ignore(end())
        .boxed()
}
