//! Display for covexpr ASTs
//!
//! Both trees print in a canonical single-line form that parses back to the
//! same tree. Nested binary operations are always parenthesized.

use std::fmt::{self, Display};

use crate::ast::surface::Expr as SurfaceExpr;
use crate::ast::typed::{ArrayExpr, ArrayOperands, Expr, ScalarExpr};
use crate::ast::{Aggregate, BinOp, Constant, Dataset, SHIFT};

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        };
        write!(f, "{}", s)
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============ Surface tree ============

impl Display for SurfaceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceExpr::Number(n) => write!(f, "{}", n),
            SurfaceExpr::Constant(c) => write!(f, "{}", c),
            SurfaceExpr::Access(dataset, index) => write!(f, "{}({})", dataset, index),
            SurfaceExpr::Range(dataset, start, end) => {
                write!(f, "{}({}, {})", dataset, start, end)
            }
            SurfaceExpr::Aggregate(func, range) => write!(f, "{}({})", func, range),
            SurfaceExpr::Shift(range, offset) => write!(f, "{}({}, {})", SHIFT, range, offset),
            SurfaceExpr::BinaryOp(lhs, op, rhs) => {
                write_operand(f, lhs, matches!(**lhs, SurfaceExpr::BinaryOp(..)))?;
                write!(f, " {} ", op)?;
                write_operand(f, rhs, matches!(**rhs, SurfaceExpr::BinaryOp(..)))
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &dyn Display, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", operand)
    } else {
        write!(f, "{}", operand)
    }
}

// ============ Typed tree ============

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Scalar(e) => write!(f, "{}", e),
            Expr::Array(e) => write!(f, "{}", e),
        }
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpr::Number(n) => write!(f, "{}", n),
            ScalarExpr::Constant(c) => write!(f, "{}", c),
            ScalarExpr::Access { dataset, index } => write!(f, "{}({})", dataset, index),
            ScalarExpr::Aggregate { func, range } => write!(f, "{}({})", func, range),
            ScalarExpr::Binop { op, lhs, rhs } => {
                write_operand(f, lhs, lhs.is_binop())?;
                write!(f, " {} ", op)?;
                write_operand(f, rhs, rhs.is_binop())
            }
        }
    }
}

impl Display for ArrayExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayExpr::Range {
                dataset,
                start,
                end,
            } => write!(f, "{}({}, {})", dataset, start, end),
            ArrayExpr::Shift { range, offset } => write!(f, "{}({}, {})", SHIFT, range, offset),
            ArrayExpr::Binop { op, operands } => {
                let (lhs, lhs_parens, rhs, rhs_parens): (&dyn Display, bool, &dyn Display, bool) =
                    match operands {
                        ArrayOperands::ArrayArray(l, r) => {
                            (&**l, l.is_binop(), &**r, r.is_binop())
                        }
                        ArrayOperands::ScalarArray(l, r) => {
                            (&**l, l.is_binop(), &**r, r.is_binop())
                        }
                        ArrayOperands::ArrayScalar(l, r) => {
                            (&**l, l.is_binop(), &**r, r.is_binop())
                        }
                    };
                write_operand(f, lhs, lhs_parens)?;
                write!(f, " {} ", op)?;
                write_operand(f, rhs, rhs_parens)
            }
        }
    }
}

impl ScalarExpr {
    fn is_binop(&self) -> bool {
        matches!(self, ScalarExpr::Binop { .. })
    }
}

impl ArrayExpr {
    fn is_binop(&self) -> bool {
        matches!(self, ArrayExpr::Binop { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;
    use crate::typecheck::typecheck;

    #[test]
    fn test_display_simple() {
        let expr = parse("cases(day)/population*100000").unwrap();
        assert_eq!(expr.to_string(), "(cases(day) / population) * 100000");
    }

    #[test]
    fn test_display_calls() {
        let expr = parse("max( shift( newcases(first,last) , 7 ) )").unwrap();
        assert_eq!(expr.to_string(), "max(shift(newcases(first, last), 7))");
    }

    #[test]
    fn test_display_negative_literal() {
        let expr = parse("3 - -5").unwrap();
        assert_eq!(expr.to_string(), "3 - -5");
    }

    #[test]
    fn typed_display_matches_surface() {
        let queries = [
            "(cases(day) - cases(day - 7)) / 7 / population * 100000",
            "3 * cases(0, 3)",
            "cases(0, 3) - shift(cases(0, 3), 1)",
            "average(deaths(day - 7, day))",
        ];
        for q in queries {
            let surface = parse(q).unwrap();
            let typed = typecheck(&surface).unwrap();
            assert_eq!(typed.to_string(), surface.to_string(), "for: {q}");
        }
    }

    #[test]
    fn test_display_preserves_semantics() {
        let queries = [
            "1 - (2 - 3)",
            "(1 - 2) - 3",
            "2 * (day + 1)",
            "newcases(day) / max(newcases(first, last)) * 100",
        ];
        for q in queries {
            let expr = parse(q).unwrap();
            let reparsed = parse(&expr.to_string()).unwrap();
            assert_eq!(expr, reparsed, "round trip failed for: {q}");
        }
    }
}
