//! Parser for covexpr expressions
//!
//! The grammar produces a raw tree of numbers, names and operators. Names are
//! then resolved against the builtin set (constants, datasets, aggregates,
//! `shift`) and checked for arity, producing a surface::Expr. Both stages
//! report failures as a `ParseError` carrying the byte offset of the problem.
//!
//! Every later stage walks the tree recursively, so the grammar caps both
//! parenthesis/call nesting and tree depth at `MAX_DEPTH`.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, opt, peek, preceded, separated, terminated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stateful, Stream};
use winnow::token::{one_of, take_while};

use crate::ast::surface::Expr;
use crate::ast::{Aggregate, BinOp, Constant, Dataset, SHIFT};

/// Deepest expression tree, and deepest parenthesis or call nesting, accepted.
pub const MAX_DEPTH: usize = 128;

const TOO_DEEP: &str = "nesting limit";

/// Input stream; the state is the current parenthesis/call nesting.
type Input<'i> = Stateful<LocatingSlice<&'i str>, usize>;
type PResult<T> = winnow::ModalResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input is empty or only whitespace
    Empty,
    /// The grammar could not continue at `offset`
    Unexpected,
    /// A complete expression was followed by more input
    TrailingInput,
    /// A name that is not a constant, dataset or function
    UnknownIdentifier,
    /// A known name used with the wrong number of arguments
    Arity,
    /// Nesting or operator chaining deeper than `MAX_DEPTH`
    TooDeep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {}, offset {})",
            self.message, self.line, self.column, self.offset
        )
    }
}

impl std::error::Error for ParseError {}

/// Parse an expression from a string
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    if input.trim().is_empty() {
        return Err(build_parse_error(
            ParseErrorKind::Empty,
            "empty expression".to_string(),
            input,
            0,
        ));
    }

    let mut stream = Stateful {
        input: LocatingSlice::new(input),
        state: 0,
    };
    let raw = match terminated(expr, ws).parse_next(&mut stream) {
        Ok(raw) => raw,
        Err(e) => {
            let offset = input.len().saturating_sub(stream.eof_offset());
            let (kind, message) = if is_too_deep(&e) {
                (
                    ParseErrorKind::TooDeep,
                    format!("expression nested deeper than {MAX_DEPTH} levels"),
                )
            } else {
                (
                    ParseErrorKind::Unexpected,
                    describe_failure(&e, &input[offset..]),
                )
            };
            return Err(build_parse_error(kind, message, input, offset));
        }
    };

    if stream.eof_offset() > 0 {
        let offset = input.len() - stream.eof_offset();
        return Err(build_parse_error(
            ParseErrorKind::TrailingInput,
            format!("unexpected trailing input {}", found(&input[offset..])),
            input,
            offset,
        ));
    }

    resolve(raw, input)
}

fn build_parse_error(
    kind: ParseErrorKind,
    message: String,
    input: &str,
    offset: usize,
) -> ParseError {
    let (line, column) = offset_to_line_column(input, offset);
    ParseError {
        kind,
        message,
        offset,
        line,
        column,
    }
}

fn offset_to_line_column(input: &str, offset: usize) -> (usize, usize) {
    let bounded = offset.min(input.len());
    let mut line = 1usize;
    let mut column = 1usize;

    for ch in input[..bounded].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

fn describe_failure(err: &ErrMode<ContextError>, rest: &str) -> String {
    let expected = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx.context().find_map(|c| match c {
            StrContext::Expected(value) => Some(value.to_string()),
            _ => None,
        }),
        ErrMode::Incomplete(_) => None,
    };

    match expected {
        Some(expected) => format!("expected {expected}, found {}", found(rest)),
        None => format!("unexpected {}", found(rest)),
    }
}

fn is_too_deep(err: &ErrMode<ContextError>) -> bool {
    match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx
            .context()
            .any(|c| matches!(c, StrContext::Label(label) if *label == TOO_DEEP)),
        ErrMode::Incomplete(_) => false,
    }
}

fn too_deep() -> ErrMode<ContextError> {
    let mut err = ContextError::new();
    err.push(StrContext::Label(TOO_DEEP));
    ErrMode::Cut(err)
}

fn found(rest: &str) -> String {
    match rest.chars().next() {
        Some(c) => format!("'{c}'"),
        None => "end of input".to_string(),
    }
}

// ============ Raw syntax (before name resolution) ============

#[derive(Debug, Clone, PartialEq)]
enum Raw {
    Number(i64),
    /// `name` when `args` is None, `name(args...)` otherwise
    Name {
        name: String,
        offset: usize,
        args: Option<Vec<Raw>>,
        depth: usize,
    },
    BinaryOp {
        lhs: Box<Raw>,
        op: BinOp,
        rhs: Box<Raw>,
        depth: usize,
    },
}

impl Raw {
    /// Height of the tree rooted here, a leaf being 1
    fn depth(&self) -> usize {
        match self {
            Raw::Number(_) => 1,
            Raw::Name { depth, .. } | Raw::BinaryOp { depth, .. } => *depth,
        }
    }

    fn binary(lhs: Raw, op: BinOp, rhs: Raw) -> Raw {
        let depth = 1 + lhs.depth().max(rhs.depth());
        Raw::BinaryOp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
            depth,
        }
    }
}

// ============ Grammar (handles precedence) ============

fn expr(input: &mut Input<'_>) -> PResult<Raw> {
    binary_chain(input, term, add_op)
}

fn add_op(input: &mut Input<'_>) -> PResult<BinOp> {
    alt(('+'.value(BinOp::Add), '-'.value(BinOp::Sub))).parse_next(input)
}

fn term(input: &mut Input<'_>) -> PResult<Raw> {
    binary_chain(input, factor, mul_op)
}

fn mul_op(input: &mut Input<'_>) -> PResult<BinOp> {
    alt(('*'.value(BinOp::Mul), '/'.value(BinOp::Div))).parse_next(input)
}

/// `operand (operator operand)*`, folded to the left.
///
/// Folding one node at a time lets a long chain fail at the operator that
/// pushes the tree past `MAX_DEPTH` instead of building it first.
fn binary_chain<'i>(
    input: &mut Input<'i>,
    operand: fn(&mut Input<'i>) -> PResult<Raw>,
    operator: fn(&mut Input<'i>) -> PResult<BinOp>,
) -> PResult<Raw> {
    let mut acc = operand(input)?;
    loop {
        let before = input.checkpoint();
        let op = match preceded(ws, operator).parse_next(input) {
            Ok(op) => op,
            Err(ErrMode::Backtrack(_)) => {
                input.reset(&before);
                return Ok(acc);
            }
            Err(e) => return Err(e),
        };
        let rhs = cut_err(operand).parse_next(input)?;
        let node = Raw::binary(acc, op, rhs);
        if node.depth() > MAX_DEPTH {
            input.reset(&before);
            return Err(too_deep());
        }
        acc = node;
    }
}

fn factor(input: &mut Input<'_>) -> PResult<Raw> {
    preceded(ws, alt((paren_expr, number, name))).parse_next(input)
}

fn paren_expr(input: &mut Input<'_>) -> PResult<Raw> {
    preceded('(', nested(cut_err(terminated(expr, (ws, close_paren))))).parse_next(input)
}

/// Run `parser` one nesting level deeper, failing once `MAX_DEPTH` is reached
fn nested<'i, O>(
    mut parser: impl Parser<Input<'i>, O, ErrMode<ContextError>>,
) -> impl Parser<Input<'i>, O, ErrMode<ContextError>> {
    move |input: &mut Input<'i>| {
        if input.state >= MAX_DEPTH {
            return Err(too_deep());
        }
        input.state += 1;
        let result = parser.parse_next(input);
        input.state -= 1;
        result
    }
}

fn close_paren(input: &mut Input<'_>) -> PResult<()> {
    ')'.context(StrContext::Expected(StrContextValue::CharLiteral(')')))
        .void()
        .parse_next(input)
}

/// Integer literal with an optional sign glued to the digits: `42`, `-7`
fn number(input: &mut Input<'_>) -> PResult<Raw> {
    preceded(
        peek((opt(one_of(['+', '-'])), digit1)),
        cut_err(
            (opt(one_of(['+', '-'])), digit1)
                .take()
                .try_map(|s: &str| s.parse::<i64>())
                .context(StrContext::Expected(StrContextValue::Description(
                    "integer literal within 64-bit range",
                ))),
        ),
    )
    .map(Raw::Number)
    .parse_next(input)
}

/// Bare identifier or call: `day`, `cases(day - 7)`
fn name(input: &mut Input<'_>) -> PResult<Raw> {
    let (name, span) = ident.with_span().parse_next(input)?;
    let args = opt(preceded((ws, '('), nested(cut_err(call_args)))).parse_next(input)?;
    let depth = 1 + args
        .iter()
        .flatten()
        .map(Raw::depth)
        .max()
        .unwrap_or(0);
    if depth > MAX_DEPTH {
        return Err(too_deep());
    }
    Ok(Raw::Name {
        name,
        offset: span.start,
        args,
        depth,
    })
}

fn call_args(input: &mut Input<'_>) -> PResult<Vec<Raw>> {
    terminated(separated(1.., expr, (ws, ',')), (ws, close_paren)).parse_next(input)
}

fn ident(input: &mut Input<'_>) -> PResult<String> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

fn ws(input: &mut Input<'_>) -> PResult<()> {
    multispace0.void().parse_next(input)
}

// ============ Name resolution ============

enum Builtin {
    Constant(Constant),
    Dataset(Dataset),
    Aggregate(Aggregate),
    Shift,
}

fn lookup_builtin(name: &str) -> Option<Builtin> {
    if let Some(c) = Constant::from_name(name) {
        return Some(Builtin::Constant(c));
    }
    if let Some(d) = Dataset::from_name(name) {
        return Some(Builtin::Dataset(d));
    }
    if let Some(a) = Aggregate::from_name(name) {
        return Some(Builtin::Aggregate(a));
    }
    (name == SHIFT).then_some(Builtin::Shift)
}

fn resolve(raw: Raw, source: &str) -> Result<Expr, ParseError> {
    match raw {
        Raw::Number(n) => Ok(Expr::Number(n)),
        Raw::BinaryOp { lhs, op, rhs, .. } => {
            Ok(resolve(*lhs, source)?.binop(op, resolve(*rhs, source)?))
        }
        Raw::Name {
            name, offset, args, ..
        } => resolve_name(&name, offset, args, source),
    }
}

fn resolve_name(
    name: &str,
    offset: usize,
    args: Option<Vec<Raw>>,
    source: &str,
) -> Result<Expr, ParseError> {
    let Some(builtin) = lookup_builtin(name) else {
        return Err(build_parse_error(
            ParseErrorKind::UnknownIdentifier,
            format!("unknown identifier '{name}'"),
            source,
            offset,
        ));
    };
    let arity_error = |expected: &str, got: usize| {
        build_parse_error(
            ParseErrorKind::Arity,
            format!("'{name}' expects {expected}, got {got}"),
            source,
            offset,
        )
    };

    let args = match args {
        Some(args) => args
            .into_iter()
            .map(|a| resolve(a, source))
            .collect::<Result<Vec<_>, _>>()?,
        None => {
            return match builtin {
                Builtin::Constant(c) => Ok(Expr::Constant(c)),
                Builtin::Dataset(_) => Err(arity_error("one or two arguments", 0)),
                Builtin::Aggregate(_) => Err(arity_error("one argument", 0)),
                Builtin::Shift => Err(arity_error("two arguments", 0)),
            };
        }
    };

    match builtin {
        Builtin::Constant(_) => Err(arity_error("no arguments", args.len())),
        Builtin::Dataset(dataset) => {
            let args = match <[Expr; 1]>::try_from(args) {
                Ok([index]) => return Ok(Expr::access(dataset, index)),
                Err(args) => args,
            };
            match <[Expr; 2]>::try_from(args) {
                Ok([start, end]) => Ok(Expr::range(dataset, start, end)),
                Err(args) => Err(arity_error("one or two arguments", args.len())),
            }
        }
        Builtin::Aggregate(func) => match <[Expr; 1]>::try_from(args) {
            Ok([range]) => Ok(Expr::aggregate(func, range)),
            Err(args) => Err(arity_error("one argument", args.len())),
        },
        Builtin::Shift => match <[Expr; 2]>::try_from(args) {
            Ok([range, offset]) => Ok(Expr::shift(range, offset)),
            Err(args) => Err(arity_error("two arguments", args.len())),
        },
    }
}

// ============ Sanity Tests ============
// Most testing is done via integration tests in tests/integration.rs
