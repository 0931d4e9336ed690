//! Interpreter that evaluates the typed AST against one region's data
//!
//! Evaluation is pure: the same tree, region and day always give the same
//! result, and nothing is cached between calls.

use serde::Serialize;
use thiserror::Error;

use crate::ast::typed::{ArrayExpr, ArrayOperands, Expr, ExprType, ScalarExpr};
use crate::ast::{Aggregate, BinOp, Constant};
use crate::data::RegionData;

/// Longest array a range may produce, zero padding included.
pub const MAX_RANGE_LEN: usize = 1 << 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot access future data: index {index} is past the {len} known days")]
    FutureData { index: i64, len: usize },

    #[error("cannot combine arrays of different lengths ({left} and {right})")]
    LengthMismatch { left: usize, right: usize },

    #[error("{} of an empty range is undefined", .0.name())]
    EmptyAggregate(Aggregate),

    #[error("index must be a whole number, got {0}")]
    InvalidIndex(f64),

    #[error("range of {len} days is too long")]
    RangeTooLarge { len: u128 },
}

type Result<T> = std::result::Result<T, EvalError>;

/// Runtime value produced by evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Array(Vec<f64>),
}

impl Value {
    pub fn value_type(&self) -> ExprType {
        match self {
            Value::Scalar(_) => ExprType::Scalar,
            Value::Array(_) => ExprType::Array,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Value::Array(v) => Some(v),
            Value::Scalar(_) => None,
        }
    }
}

/// Evaluation context: the region being read and the day `day` resolves to
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub data: &'a RegionData,
    pub day: i64,
}

impl<'a> EvalContext<'a> {
    pub fn new(data: &'a RegionData, day: i64) -> Self {
        Self { data, day }
    }
}

impl Expr {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        match self {
            Expr::Scalar(e) => e.evaluate(ctx).map(Value::Scalar),
            Expr::Array(e) => e.evaluate(ctx).map(Value::Array),
        }
    }
}

impl ScalarExpr {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<f64> {
        match self {
            ScalarExpr::Number(n) => Ok(*n as f64),
            ScalarExpr::Constant(c) => Ok(eval_constant(*c, ctx)),
            ScalarExpr::Access { dataset, index } => {
                let index = to_index(index.evaluate(ctx)?)?;
                access(ctx.data.series(*dataset), index)
            }
            ScalarExpr::Aggregate { func, range } => {
                let values = range.evaluate(ctx)?;
                aggregate(*func, &values)
            }
            ScalarExpr::Binop { op, lhs, rhs } => {
                let l = lhs.evaluate(ctx)?;
                let r = rhs.evaluate(ctx)?;
                Ok(apply(*op, l, r))
            }
        }
    }
}

impl ArrayExpr {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<f64>> {
        match self {
            ArrayExpr::Range {
                dataset,
                start,
                end,
            } => {
                let start = to_index(start.evaluate(ctx)?)?;
                let end = to_index(end.evaluate(ctx)?)?;
                slice(ctx.data.series(*dataset), start, end)
            }
            ArrayExpr::Shift { range, offset } => {
                let values = range.evaluate(ctx)?;
                let offset = to_index(offset.evaluate(ctx)?)?;
                shift(&values, offset)
            }
            ArrayExpr::Binop { op, operands } => eval_array_binop(*op, operands, ctx),
        }
    }
}

fn eval_constant(constant: Constant, ctx: &EvalContext<'_>) -> f64 {
    match constant {
        Constant::Population => ctx.data.population as f64,
        Constant::Day => ctx.day as f64,
        Constant::First => 0.0,
        Constant::Last => ctx.data.cases.len() as f64,
    }
}

fn to_index(value: f64) -> Result<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(EvalError::InvalidIndex(value))
    }
}

/// Days before the series start read as zero; days past its end are an error.
fn access(series: &[i64], index: i64) -> Result<f64> {
    if index < 0 {
        return Ok(0.0);
    }
    usize::try_from(index)
        .ok()
        .and_then(|i| series.get(i))
        .map(|&v| v as f64)
        .ok_or(EvalError::FutureData {
            index,
            len: series.len(),
        })
}

/// `series[start..end]`, bounds swapped if reversed and zero-padded before day 0.
fn slice(series: &[i64], start: i64, end: i64) -> Result<Vec<f64>> {
    let (start, end) = if start > end { (end, start) } else { (start, end) };

    if end > series.len() as i64 {
        return Err(EvalError::FutureData {
            index: end,
            len: series.len(),
        });
    }

    let span = (end as i128 - start as i128) as u128;
    if span > MAX_RANGE_LEN as u128 {
        return Err(EvalError::RangeTooLarge { len: span });
    }

    if end < 0 {
        return Ok(vec![0.0; span as usize]);
    }

    let padding = if start < 0 { start.unsigned_abs() as usize } else { 0 };
    let from = start.max(0) as usize;
    let mut out = Vec::with_capacity(span as usize);
    out.resize(padding, 0.0);
    out.extend(series[from..end as usize].iter().map(|&v| v as f64));
    Ok(out)
}

/// `out[i] = values[i - offset]`, zero before the start, an error past the end.
fn shift(values: &[f64], offset: i64) -> Result<Vec<f64>> {
    (0..values.len())
        .map(|i| {
            let read = (i as i64).saturating_sub(offset);
            if read < 0 {
                Ok(0.0)
            } else {
                values.get(read as usize).copied().ok_or(EvalError::FutureData {
                    index: read,
                    len: values.len(),
                })
            }
        })
        .collect()
}

fn aggregate(func: Aggregate, values: &[f64]) -> Result<f64> {
    let empty = || EvalError::EmptyAggregate(func);
    match func {
        Aggregate::Max => values
            .iter()
            .copied()
            .reduce(|acc, x| if acc > x { acc } else { x })
            .ok_or_else(empty),
        Aggregate::Min => values
            .iter()
            .copied()
            .reduce(|acc, x| if acc < x { acc } else { x })
            .ok_or_else(empty),
        Aggregate::Sum => Ok(values.iter().sum()),
        Aggregate::Average => {
            if values.is_empty() {
                return Err(empty());
            }
            Ok(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Arithmetic with one exception: a zero numerator divides to zero.
fn apply(op: BinOp, l: f64, r: f64) -> f64 {
    match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => {
            if l == 0.0 {
                0.0
            } else {
                l / r
            }
        }
    }
}

fn eval_array_binop(op: BinOp, operands: &ArrayOperands, ctx: &EvalContext<'_>) -> Result<Vec<f64>> {
    match operands {
        ArrayOperands::ArrayArray(lhs, rhs) => {
            let l = lhs.evaluate(ctx)?;
            let r = rhs.evaluate(ctx)?;
            if l.len() != r.len() {
                return Err(EvalError::LengthMismatch {
                    left: l.len(),
                    right: r.len(),
                });
            }
            Ok(l.iter().zip(&r).map(|(&a, &b)| apply(op, a, b)).collect())
        }
        ArrayOperands::ScalarArray(lhs, rhs) => {
            let l = lhs.evaluate(ctx)?;
            let r = rhs.evaluate(ctx)?;
            Ok(r.into_iter().map(|b| apply(op, l, b)).collect())
        }
        ArrayOperands::ArrayScalar(lhs, rhs) => {
            let l = lhs.evaluate(ctx)?;
            let r = rhs.evaluate(ctx)?;
            Ok(l.into_iter().map(|a| apply(op, a, r)).collect())
        }
    }
}

// ============ Sanity Tests ============
// Most testing is done via integration tests in tests/integration.rs

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Dataset;

    fn region(cases: Vec<i64>) -> RegionData {
        let deaths = vec![0; cases.len()];
        RegionData::from_cumulative("r", "Region", 1000, cases, deaths).unwrap()
    }

    fn num(n: i64) -> ScalarExpr {
        ScalarExpr::Number(n)
    }

    #[test]
    fn access_pads_past_and_rejects_future() {
        let data = region(vec![5, 6, 7]);
        assert_eq!(access(data.series(Dataset::Cases), -1), Ok(0.0));
        assert_eq!(access(data.series(Dataset::Cases), 2), Ok(7.0));
        assert_eq!(
            access(data.series(Dataset::Cases), 3),
            Err(EvalError::FutureData { index: 3, len: 3 })
        );
    }

    #[test]
    fn slice_edge_cases() {
        let series = [1, 2, 3, 4];
        assert_eq!(slice(&series, 1, 3), Ok(vec![2.0, 3.0]));
        assert_eq!(slice(&series, 3, 1), Ok(vec![2.0, 3.0]));
        assert_eq!(slice(&series, -2, 1), Ok(vec![0.0, 0.0, 1.0]));
        assert_eq!(slice(&series, -5, -2), Ok(vec![0.0, 0.0, 0.0]));
        assert_eq!(slice(&series, -2, 0), Ok(vec![0.0, 0.0]));
        assert_eq!(slice(&series, 2, 2), Ok(vec![]));
        assert_eq!(slice(&series, 0, 4).map(|v| v.len()), Ok(4));
        assert_eq!(
            slice(&series, 0, 5),
            Err(EvalError::FutureData { index: 5, len: 4 })
        );
    }

    #[test]
    fn slice_rejects_huge_padding() {
        let series = [1, 2];
        assert!(matches!(
            slice(&series, i64::MIN, 0),
            Err(EvalError::RangeTooLarge { .. })
        ));
    }

    #[test]
    fn shift_reads_behind() {
        assert_eq!(shift(&[5.0, 6.0, 7.0], 1), Ok(vec![0.0, 5.0, 6.0]));
        assert_eq!(shift(&[5.0, 6.0, 7.0], 0), Ok(vec![5.0, 6.0, 7.0]));
        assert_eq!(shift(&[5.0, 6.0, 7.0], 5), Ok(vec![0.0, 0.0, 0.0]));
        assert_eq!(
            shift(&[5.0, 6.0, 7.0], -1),
            Err(EvalError::FutureData { index: 3, len: 3 })
        );
        assert_eq!(shift(&[], -1), Ok(vec![]));
    }

    #[test]
    fn aggregates() {
        let values = [3.0, 9.0, 1.0];
        assert_eq!(aggregate(Aggregate::Max, &values), Ok(9.0));
        assert_eq!(aggregate(Aggregate::Min, &values), Ok(1.0));
        assert_eq!(aggregate(Aggregate::Sum, &values), Ok(13.0));
        assert_eq!(aggregate(Aggregate::Average, &[2.0, 4.0]), Ok(3.0));
    }

    #[test]
    fn empty_aggregates() {
        assert_eq!(aggregate(Aggregate::Sum, &[]), Ok(0.0));
        for func in [Aggregate::Max, Aggregate::Min, Aggregate::Average] {
            assert_eq!(aggregate(func, &[]), Err(EvalError::EmptyAggregate(func)));
        }
    }

    #[test]
    fn zero_numerator_divides_to_zero() {
        assert_eq!(apply(BinOp::Div, 0.0, 5.0), 0.0);
        assert_eq!(apply(BinOp::Div, 0.0, 0.0), 0.0);
        assert_eq!(apply(BinOp::Div, 6.0, 3.0), 2.0);
        assert!(apply(BinOp::Div, 1.0, 0.0).is_infinite());
    }

    #[test]
    fn fractional_index_is_rejected() {
        let data = region(vec![5, 6, 7]);
        let ctx = EvalContext::new(&data, 0);
        let expr = ScalarExpr::Access {
            dataset: Dataset::Cases,
            index: Box::new(ScalarExpr::Binop {
                op: BinOp::Div,
                lhs: Box::new(num(3)),
                rhs: Box::new(num(2)),
            }),
        };
        assert_eq!(expr.evaluate(&ctx), Err(EvalError::InvalidIndex(1.5)));
    }

    #[test]
    fn array_length_mismatch() {
        let data = region(vec![5, 6, 7]);
        let ctx = EvalContext::new(&data, 0);
        let range = |a, b| {
            Box::new(ArrayExpr::Range {
                dataset: Dataset::Cases,
                start: Box::new(num(a)),
                end: Box::new(num(b)),
            })
        };
        let expr = ArrayExpr::Binop {
            op: BinOp::Add,
            operands: ArrayOperands::ArrayArray(range(0, 2), range(0, 3)),
        };
        assert_eq!(
            expr.evaluate(&ctx),
            Err(EvalError::LengthMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn broadcast_preserves_operand_order() {
        let data = region(vec![1, 2, 4]);
        let ctx = EvalContext::new(&data, 0);
        let range = || {
            Box::new(ArrayExpr::Range {
                dataset: Dataset::Cases,
                start: Box::new(num(0)),
                end: Box::new(num(3)),
            })
        };
        let left = ArrayExpr::Binop {
            op: BinOp::Sub,
            operands: ArrayOperands::ScalarArray(Box::new(num(10)), range()),
        };
        let right = ArrayExpr::Binop {
            op: BinOp::Sub,
            operands: ArrayOperands::ArrayScalar(range(), Box::new(num(10))),
        };
        assert_eq!(left.evaluate(&ctx), Ok(vec![9.0, 8.0, 6.0]));
        assert_eq!(right.evaluate(&ctx), Ok(vec![-9.0, -8.0, -6.0]));
    }
}
