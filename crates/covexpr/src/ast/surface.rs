//! Surface AST - what the parser produces
//!
//! Names and arities are already resolved, so every node here is a known
//! builtin. Types are not checked yet: `max(5)` is a valid surface tree and
//! only fails when typecheck builds the typed tree from it.

use super::{Aggregate, BinOp, Constant, Dataset};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal: `7`, `-3`
    Number(i64),

    /// Zero-argument name: `population`, `day`, `first`, `last`
    Constant(Constant),

    /// One-argument dataset read: `cases(day - 7)`
    Access(Dataset, Box<Expr>),

    /// Two-argument dataset slice: `cases(first, last)`
    Range(Dataset, Box<Expr>, Box<Expr>),

    /// Reduction: `max(...)`, `min(...)`, `sum(...)`, `average(...)`
    Aggregate(Aggregate, Box<Expr>),

    /// `shift(range, offset)`
    Shift(Box<Expr>, Box<Expr>),

    /// Binary operation: `a + b`, `a / b`
    BinaryOp(Box<Expr>, BinOp, Box<Expr>),
}

impl Expr {
    pub fn access(dataset: Dataset, index: Expr) -> Self {
        Expr::Access(dataset, Box::new(index))
    }

    pub fn range(dataset: Dataset, start: Expr, end: Expr) -> Self {
        Expr::Range(dataset, Box::new(start), Box::new(end))
    }

    pub fn aggregate(func: Aggregate, range: Expr) -> Self {
        Expr::Aggregate(func, Box::new(range))
    }

    pub fn shift(range: Expr, offset: Expr) -> Self {
        Expr::Shift(Box::new(range), Box::new(offset))
    }

    pub fn binop(self, op: BinOp, rhs: Expr) -> Self {
        Expr::BinaryOp(Box::new(self), op, Box::new(rhs))
    }
}
