//! Build the typed tree from the surface tree
//!
//! Every node is built through a checked constructor on typed::Expr. A
//! constructor inspects the static type of its children and fails with a
//! `TypeError` before anything is evaluated. Children are built bottom-up,
//! so the first mismatch aborts the whole build and no partial tree escapes.

use thiserror::Error;

use crate::ast::surface::Expr as SurfaceExpr;
use crate::ast::typed::{ArrayExpr, ArrayOperands, Expr, ExprType, ScalarExpr};
use crate::ast::{Aggregate, BinOp, Constant, Dataset};

/// Node kinds that place a type requirement on a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    DataAccess,
    DataRange,
    Aggregate,
    Shift,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::DataAccess => "data access",
            NodeKind::DataRange => "data range",
            NodeKind::Aggregate => "aggregate",
            NodeKind::Shift => "shift",
        };
        write!(f, "{s}")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TypeError {
    pub node: NodeKind,
    pub expected: ExprType,
    pub found: ExprType,
    pub message: String,
}

impl TypeError {
    fn mismatch(node: NodeKind, what: &str, expected: ExprType, found: ExprType) -> Self {
        TypeError {
            node,
            expected,
            found,
            message: format!("{what} must be {} {expected}, found {found}", article(expected)),
        }
    }
}

fn article(t: ExprType) -> &'static str {
    match t {
        ExprType::Scalar => "a",
        ExprType::Array => "an",
    }
}

/// Type-check a surface tree, producing the typed tree eval consumes
pub fn typecheck(expr: &SurfaceExpr) -> Result<Expr, TypeError> {
    match expr {
        SurfaceExpr::Number(n) => Ok(Expr::number(*n)),
        SurfaceExpr::Constant(c) => Ok(Expr::constant(*c)),
        SurfaceExpr::Access(dataset, index) => Expr::data_access(*dataset, typecheck(index)?),
        SurfaceExpr::Range(dataset, start, end) => {
            Expr::data_range(*dataset, typecheck(start)?, typecheck(end)?)
        }
        SurfaceExpr::Aggregate(func, range) => Expr::aggregate(*func, typecheck(range)?),
        SurfaceExpr::Shift(range, offset) => Expr::shift(typecheck(range)?, typecheck(offset)?),
        SurfaceExpr::BinaryOp(lhs, op, rhs) => Ok(Expr::binop(*op, typecheck(lhs)?, typecheck(rhs)?)),
    }
}

// ============ Checked constructors ============

impl Expr {
    pub fn number(value: i64) -> Self {
        Expr::Scalar(ScalarExpr::Number(value))
    }

    pub fn constant(constant: Constant) -> Self {
        Expr::Scalar(ScalarExpr::Constant(constant))
    }

    /// `dataset(index)`: index must be a scalar
    pub fn data_access(dataset: Dataset, index: Expr) -> Result<Self, TypeError> {
        let index = index.into_scalar(NodeKind::DataAccess, "index to data access")?;
        Ok(Expr::Scalar(ScalarExpr::Access {
            dataset,
            index: Box::new(index),
        }))
    }

    /// `dataset(start, end)`: both bounds must be scalars
    pub fn data_range(dataset: Dataset, start: Expr, end: Expr) -> Result<Self, TypeError> {
        let start = start.into_scalar(NodeKind::DataRange, "starting index to data range")?;
        let end = end.into_scalar(NodeKind::DataRange, "ending index to data range")?;
        Ok(Expr::Array(ArrayExpr::Range {
            dataset,
            start: Box::new(start),
            end: Box::new(end),
        }))
    }

    /// `func(range)`: range must be an array
    pub fn aggregate(func: Aggregate, range: Expr) -> Result<Self, TypeError> {
        let what = format!("argument to {}", func.name());
        let range = range.into_array(NodeKind::Aggregate, &what)?;
        Ok(Expr::Scalar(ScalarExpr::Aggregate {
            func,
            range: Box::new(range),
        }))
    }

    /// `shift(range, offset)`: an array then a scalar
    pub fn shift(range: Expr, offset: Expr) -> Result<Self, TypeError> {
        let range = range.into_array(NodeKind::Shift, "first argument to shift")?;
        let offset = offset.into_scalar(NodeKind::Shift, "second argument to shift")?;
        Ok(Expr::Array(ArrayExpr::Shift {
            range: Box::new(range),
            offset: Box::new(offset),
        }))
    }

    /// Any combination is accepted; the result is an array if either side is.
    pub fn binop(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (Expr::Scalar(l), Expr::Scalar(r)) => Expr::Scalar(ScalarExpr::Binop {
                op,
                lhs: Box::new(l),
                rhs: Box::new(r),
            }),
            (Expr::Array(l), Expr::Array(r)) => Expr::Array(ArrayExpr::Binop {
                op,
                operands: ArrayOperands::ArrayArray(Box::new(l), Box::new(r)),
            }),
            (Expr::Scalar(l), Expr::Array(r)) => Expr::Array(ArrayExpr::Binop {
                op,
                operands: ArrayOperands::ScalarArray(Box::new(l), Box::new(r)),
            }),
            (Expr::Array(l), Expr::Scalar(r)) => Expr::Array(ArrayExpr::Binop {
                op,
                operands: ArrayOperands::ArrayScalar(Box::new(l), Box::new(r)),
            }),
        }
    }

    fn into_scalar(self, node: NodeKind, what: &str) -> Result<ScalarExpr, TypeError> {
        match self {
            Expr::Scalar(e) => Ok(e),
            Expr::Array(_) => Err(TypeError::mismatch(
                node,
                what,
                ExprType::Scalar,
                ExprType::Array,
            )),
        }
    }

    fn into_array(self, node: NodeKind, what: &str) -> Result<ArrayExpr, TypeError> {
        match self {
            Expr::Array(e) => Ok(e),
            Expr::Scalar(_) => Err(TypeError::mismatch(
                node,
                what,
                ExprType::Array,
                ExprType::Scalar,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn check(input: &str) -> Result<Expr, TypeError> {
        typecheck(&parse(input).unwrap())
    }

    #[test]
    fn static_types() {
        assert_eq!(check("1").unwrap().expr_type(), ExprType::Scalar);
        assert_eq!(check("cases(day)").unwrap().expr_type(), ExprType::Scalar);
        assert_eq!(check("cases(0, 3)").unwrap().expr_type(), ExprType::Array);
        assert_eq!(check("sum(cases(0, 3))").unwrap().expr_type(), ExprType::Scalar);
        assert_eq!(check("shift(cases(0, 3), 1)").unwrap().expr_type(), ExprType::Array);
    }

    #[test]
    fn binop_type_is_array_if_either_side_is() {
        assert_eq!(check("1 + 2").unwrap().expr_type(), ExprType::Scalar);
        assert_eq!(check("3 * cases(0, 3)").unwrap().expr_type(), ExprType::Array);
        assert_eq!(check("cases(0, 3) / 3").unwrap().expr_type(), ExprType::Array);
        assert_eq!(
            check("cases(0, 3) - deaths(0, 3)").unwrap().expr_type(),
            ExprType::Array
        );
    }

    #[test]
    fn aggregate_rejects_scalar() {
        let err = check("max(5)").unwrap_err();
        assert_eq!(err.node, NodeKind::Aggregate);
        assert_eq!(err.expected, ExprType::Array);
        assert_eq!(err.found, ExprType::Scalar);
        assert_eq!(err.to_string(), "argument to max must be an array, found scalar");
    }

    #[test]
    fn shift_argument_types() {
        let err = check("shift(5, 1)").unwrap_err();
        assert_eq!(err.node, NodeKind::Shift);
        assert_eq!(err.expected, ExprType::Array);

        let err = check("shift(cases(0, 2), cases(0, 2))").unwrap_err();
        assert_eq!(err.node, NodeKind::Shift);
        assert_eq!(err.expected, ExprType::Scalar);
    }

    #[test]
    fn indices_must_be_scalar() {
        let err = check("cases(cases(0, 2))").unwrap_err();
        assert_eq!(err.node, NodeKind::DataAccess);

        let err = check("deaths(0, cases(0, 2))").unwrap_err();
        assert_eq!(err.node, NodeKind::DataRange);
        assert!(err.message.starts_with("ending index"));
    }

    #[test]
    fn nested_error_fails_whole_build() {
        let err = check("1 + (2 * max(day))").unwrap_err();
        assert_eq!(err.node, NodeKind::Aggregate);
    }
}
