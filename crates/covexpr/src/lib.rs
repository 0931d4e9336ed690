//! covexpr - expressions over per-region epidemiological time series
//!
//! A small arithmetic language for building map layers out of case and death
//! counts, e.g. a 7-day average of new cases per 100,000 people.
//!
//! ## Quick Start
//!
//! ```ignore
//! use covexpr::{MapEngine, RegionData, compile};
//!
//! let mut engine = MapEngine::new();
//! engine.add_region(RegionData::from_cumulative("wa", "Washington", 7_600_000, cases, deaths)?)?;
//!
//! let expr = compile("(cases(day) - cases(day - 7)) / 7 / population * 100000")?;
//! let matrix = engine.compute_matrix(&expr)?;
//!
//! let domain = matrix.color_domain();
//! let leaders = matrix.top_n(matrix.day_count() - 1, 5);
//! ```
//!
//! ## Standalone Usage
//!
//! For one-off evaluation against a single region:
//!
//! ```ignore
//! use covexpr::run;
//!
//! let value = run("average(newcases(day - 7, day))", &region, 42)?;
//! ```
//!
//! ## Language
//!
//! - `population`, `day`, `first`, `last` → scalar constants
//! - `cases(i)`, `deaths(i)`, `newcases(i)`, `newdeaths(i)` → value on day `i`
//! - `cases(a, b)` etc. → days `a..b` as an array
//! - `max`, `min`, `sum`, `average` → array to scalar
//! - `shift(array, n)` → array delayed by `n` days
//! - `+ - * /` → on any mix of scalars and arrays

mod ast;
mod data;
mod engine;
mod eval;
mod matrix;
mod parse;
pub mod presets;
mod pretty;
mod typecheck;

use thiserror::Error;

// ============ Primary Public API ============

pub use ast::typed::{ArrayExpr, ArrayOperands, Expr, ExprType, ScalarExpr};
pub use ast::{Aggregate, BinOp, Constant, Dataset};
pub use data::RegionData;
pub use engine::{CellError, CellPolicy, DayResult, EngineConfig, MapEngine};
pub use eval::{EvalContext, MAX_RANGE_LEN, Value};
pub use matrix::{DayMatrix, DayValues, RankedRegion, RegionSeries};

/// Parse and type check an expression
pub fn compile(text: &str) -> Result<Expr, CovexprError> {
    let surface = parse::parse(text)?;
    let typed = typecheck::typecheck(&surface)?;
    Ok(typed)
}

/// Validate an expression without evaluating it, returning its static type
pub fn check(text: &str) -> Result<ExprType, CovexprError> {
    compile(text).map(|expr| expr.expr_type())
}

/// Run a one-off expression against one region
pub fn run(text: &str, data: &RegionData, day: i64) -> Result<Value, CovexprError> {
    let expr = compile(text)?;
    let value = expr.evaluate(&EvalContext::new(data, day))?;
    Ok(value)
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum CovexprError {
    #[error("Parse error: {0}")]
    Parse(#[from] parse::ParseError),
    #[error("Type error: {0}")]
    Type(#[from] typecheck::TypeError),
    #[error("Eval error: {0}")]
    Eval(#[from] eval::EvalError),
    #[error("Data error: {0}")]
    Data(#[from] data::DataError),
    #[error("Eval error at {0}")]
    Cell(#[from] engine::CellError),
    #[error("map cells need a scalar expression, found {0}")]
    ExpectedScalar(ExprType),
    #[error("unknown region '{0}'")]
    UnknownRegion(String),
}

pub use data::DataError;
pub use eval::EvalError;
pub use parse::{MAX_DEPTH, ParseError, ParseErrorKind};
pub use typecheck::{NodeKind, TypeError};

// ============ Advanced: AST Access ============

/// Low-level pipeline stages (for tooling or introspection)
pub mod advanced {
    pub use crate::ast::surface::Expr as SurfaceExpr;
    pub use crate::parse::parse;
    pub use crate::typecheck::typecheck;
}
