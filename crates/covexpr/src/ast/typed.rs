//! Typed AST - what eval consumes
//!
//! The tree is split by static type: a `ScalarExpr` always evaluates to a
//! number and an `ArrayExpr` always evaluates to a sequence. Children are
//! stored with the type their parent requires, so an ill-typed tree cannot
//! be represented. Build these through the checked constructors on [`Expr`]
//! (see `typecheck`), which report mismatches as `TypeError`.

use serde::Serialize;

use super::{Aggregate, BinOp, Constant, Dataset};

/// Static type of an expression, fixed when the node is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExprType {
    Scalar,
    Array,
}

impl std::fmt::Display for ExprType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprType::Scalar => write!(f, "scalar"),
            ExprType::Array => write!(f, "array"),
        }
    }
}

/// A type-checked expression of either type.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Scalar(ScalarExpr),
    Array(ArrayExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    Number(i64),
    Constant(Constant),
    /// `cases(i)`: one element of a series
    Access {
        dataset: Dataset,
        index: Box<ScalarExpr>,
    },
    /// `max(range)`: reduction of an array
    Aggregate {
        func: Aggregate,
        range: Box<ArrayExpr>,
    },
    Binop {
        op: BinOp,
        lhs: Box<ScalarExpr>,
        rhs: Box<ScalarExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayExpr {
    /// `cases(a, b)`: a slice of a series, end exclusive
    Range {
        dataset: Dataset,
        start: Box<ScalarExpr>,
        end: Box<ScalarExpr>,
    },
    /// `shift(range, offset)`
    Shift {
        range: Box<ArrayExpr>,
        offset: Box<ScalarExpr>,
    },
    Binop {
        op: BinOp,
        operands: ArrayOperands,
    },
}

/// Operands of an array-typed binary operation, in written order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOperands {
    /// Elementwise combination of two arrays of equal length
    ArrayArray(Box<ArrayExpr>, Box<ArrayExpr>),
    /// Scalar on the left, broadcast over the array on the right
    ScalarArray(Box<ScalarExpr>, Box<ArrayExpr>),
    /// Array on the left, scalar broadcast on the right
    ArrayScalar(Box<ArrayExpr>, Box<ScalarExpr>),
}

impl Expr {
    pub fn expr_type(&self) -> ExprType {
        match self {
            Expr::Scalar(_) => ExprType::Scalar,
            Expr::Array(_) => ExprType::Array,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarExpr> {
        match self {
            Expr::Scalar(e) => Some(e),
            Expr::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayExpr> {
        match self {
            Expr::Array(e) => Some(e),
            Expr::Scalar(_) => None,
        }
    }
}

impl From<ScalarExpr> for Expr {
    fn from(e: ScalarExpr) -> Self {
        Expr::Scalar(e)
    }
}

impl From<ArrayExpr> for Expr {
    fn from(e: ArrayExpr) -> Self {
        Expr::Array(e)
    }
}
