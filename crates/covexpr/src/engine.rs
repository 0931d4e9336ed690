//! Map engine: evaluates one expression across every region and day
//!
//! For the choropleth use case where:
//! - Regions are loaded once per data fetch
//! - One expression is evaluated per (region, day) cell
//! - The map reads a day x region matrix, its percentiles and rankings

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::typed::{Expr, ScalarExpr};
use crate::data::RegionData;
use crate::eval::{EvalContext, EvalError, Value};
use crate::matrix::{DayMatrix, DayValues};
use crate::{CovexprError, compile};

/// What to do when a single cell of the matrix fails to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellPolicy {
    /// Stop at the first failing cell and return its error
    #[default]
    Abort,
    /// Leave the cell out, record it as a `CellError` and carry on
    Skip,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cell_policy: CellPolicy,
    /// Percentiles used for the legend's color domain
    pub percentile_bounds: (f64, f64),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_policy: CellPolicy::Abort,
            percentile_bounds: (1.0, 99.0),
        }
    }
}

impl EngineConfig {
    pub fn with_cell_policy(mut self, policy: CellPolicy) -> Self {
        self.cell_policy = policy;
        self
    }

    pub fn with_percentile_bounds(mut self, low: f64, high: f64) -> Self {
        self.percentile_bounds = (low, high);
        self
    }
}

/// A cell that failed to evaluate
#[derive(Error, Debug, Clone, PartialEq)]
#[error("region '{region}', day {day}: {error}")]
pub struct CellError {
    pub day: usize,
    pub region: String,
    #[source]
    pub error: EvalError,
}

/// One day's values, plus the cells left out under `CellPolicy::Skip`
#[derive(Debug, Clone, PartialEq)]
pub struct DayResult {
    pub values: DayValues,
    pub skipped: Vec<CellError>,
}

/// Regions plus the configuration for evaluating expressions over them
///
/// # Example
///
/// ```ignore
/// let mut engine = MapEngine::new();
/// engine.add_region(region)?;
///
/// let expr = compile("(cases(day) - cases(day - 7)) / 7 / population * 100000")?;
/// let matrix = engine.compute_matrix(&expr)?;
/// let domain = matrix.color_domain();
/// let leaders = matrix.top_n(day, 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapEngine {
    /// Regions by id, in insertion order
    regions: IndexMap<String, RegionData>,
    config: EngineConfig,
}

impl MapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            regions: IndexMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_cell_policy(&mut self, policy: CellPolicy) {
        self.config.cell_policy = policy;
    }

    /// Add a region, replacing any region with the same id
    pub fn add_region(&mut self, region: RegionData) -> Result<(), CovexprError> {
        region.validate()?;
        if let Some(previous) = self.regions.insert(region.id.clone(), region) {
            log::debug!("Replaced region '{}'", previous.id);
        }
        Ok(())
    }

    pub fn region(&self, id: &str) -> Option<&RegionData> {
        self.regions.get(id)
    }

    pub fn region_ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Number of days in the matrix: the series length of the first region
    pub fn day_count(&self) -> usize {
        self.regions.values().next().map_or(0, RegionData::len)
    }

    /// Evaluate any expression for one region (e.g. an array for the time chart)
    pub fn evaluate_region(&self, expr: &Expr, id: &str, day: i64) -> Result<Value, CovexprError> {
        let data = self
            .regions
            .get(id)
            .ok_or_else(|| CovexprError::UnknownRegion(id.to_string()))?;
        Ok(expr.evaluate(&EvalContext::new(data, day))?)
    }

    /// Evaluate a scalar expression for every region on one day
    ///
    /// Failing cells follow the configured `CellPolicy`; skipped ones are
    /// returned in `DayResult::skipped`.
    pub fn evaluate_day(&self, expr: &Expr, day: usize) -> Result<DayResult, CovexprError> {
        let scalar = require_scalar(expr)?;
        let mut skipped = Vec::new();
        let values = self.fill_day(scalar, day, &mut skipped)?;
        Ok(DayResult { values, skipped })
    }

    /// Evaluate a scalar expression for every region on every day
    pub fn compute_matrix(&self, expr: &Expr) -> Result<DayMatrix, CovexprError> {
        let scalar = require_scalar(expr)?;
        let days = self.day_count();
        log::debug!(
            "Computing {} x {} matrix for `{}`",
            days,
            self.regions.len(),
            expr
        );

        let mut skipped = Vec::new();
        let rows = (0..days)
            .map(|day| self.fill_day(scalar, day, &mut skipped))
            .collect::<Result<Vec<_>, _>>()?;

        if !skipped.is_empty() {
            log::debug!("Skipped {} of {} cells", skipped.len(), days * self.regions.len());
        }

        Ok(DayMatrix::new(
            self.regions
                .iter()
                .map(|(id, region)| (id.clone(), region.name.clone()))
                .collect(),
            rows,
            skipped,
            self.config.percentile_bounds,
        ))
    }

    /// Compile and evaluate in one step
    pub fn query_matrix(&self, text: &str) -> Result<DayMatrix, CovexprError> {
        let expr = compile(text)?;
        self.compute_matrix(&expr)
    }

    fn fill_day(
        &self,
        expr: &ScalarExpr,
        day: usize,
        skipped: &mut Vec<CellError>,
    ) -> Result<DayValues, CellError> {
        let mut values = DayValues::with_capacity(self.regions.len());
        for (id, data) in &self.regions {
            let ctx = EvalContext::new(data, day as i64);
            match expr.evaluate(&ctx) {
                Ok(v) => {
                    values.insert(id.clone(), v);
                }
                Err(error) => {
                    let cell = CellError {
                        day,
                        region: id.clone(),
                        error,
                    };
                    match self.config.cell_policy {
                        CellPolicy::Abort => return Err(cell),
                        CellPolicy::Skip => {
                            log::warn!("Skipping cell: {}", cell);
                            skipped.push(cell);
                        }
                    }
                }
            }
        }
        Ok(values)
    }
}

fn require_scalar(expr: &Expr) -> Result<&ScalarExpr, CovexprError> {
    expr.as_scalar()
        .ok_or(CovexprError::ExpectedScalar(expr.expr_type()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(policy: CellPolicy) -> MapEngine {
        let mut engine = MapEngine::with_config(EngineConfig::default().with_cell_policy(policy));
        engine
            .add_region(RegionData::from_cumulative("a", "A", 100, vec![1, 2, 3], vec![0, 0, 1]).unwrap())
            .unwrap();
        engine
            .add_region(RegionData::from_cumulative("b", "B", 200, vec![4, 5, 6], vec![0, 1, 1]).unwrap())
            .unwrap();
        engine
    }

    #[test]
    fn day_count_follows_first_region() {
        assert_eq!(MapEngine::new().day_count(), 0);
        assert_eq!(engine(CellPolicy::Abort).day_count(), 3);
    }

    #[test]
    fn region_order_is_insertion_order() {
        let e = engine(CellPolicy::Abort);
        assert_eq!(e.region_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn abort_returns_first_failing_cell() {
        let e = engine(CellPolicy::Abort);
        let expr = compile("cases(day + 1)").unwrap();
        let err = e.compute_matrix(&expr).unwrap_err();
        match err {
            CovexprError::Cell(cell) => {
                assert_eq!(cell.day, 2);
                assert_eq!(cell.region, "a");
                assert!(matches!(cell.error, EvalError::FutureData { .. }));
            }
            other => panic!("expected cell error, got {other:?}"),
        }
    }

    #[test]
    fn skip_records_failing_cells() {
        let e = engine(CellPolicy::Skip);
        let expr = compile("cases(day + 1)").unwrap();
        let m = e.compute_matrix(&expr).unwrap();
        assert_eq!(m.skipped().len(), 2);
        assert_eq!(m.day(2).unwrap().len(), 0);
        assert_eq!(m.value(1, "b"), Some(6.0));
    }

    #[test]
    fn matrix_requires_scalar() {
        let e = engine(CellPolicy::Abort);
        let expr = compile("cases(0, 2)").unwrap();
        assert!(matches!(
            e.compute_matrix(&expr),
            Err(CovexprError::ExpectedScalar(_))
        ));
        assert!(matches!(
            e.evaluate_day(&expr, 0),
            Err(CovexprError::ExpectedScalar(_))
        ));
    }

    #[test]
    fn evaluate_day_returns_skipped_cells() {
        let e = engine(CellPolicy::Skip);
        let expr = compile("cases(day + 1)").unwrap();
        let result = e.evaluate_day(&expr, 2).unwrap();
        assert!(result.values.is_empty());
        assert_eq!(result.skipped.len(), 2);
        assert_eq!(result.skipped[1].region, "b");

        let result = e.evaluate_day(&expr, 1).unwrap();
        assert_eq!(result.values.len(), 2);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn unknown_region() {
        let e = engine(CellPolicy::Abort);
        let expr = compile("day").unwrap();
        assert!(matches!(
            e.evaluate_region(&expr, "zzz", 0),
            Err(CovexprError::UnknownRegion(_))
        ));
    }
}
