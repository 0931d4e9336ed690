//! Per-region time series the evaluator reads from

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::Dataset;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("region '{region}': {dataset} has {got} days, expected {expected}")]
    LengthMismatch {
        region: String,
        dataset: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("region '{region}': {dataset} change on day {day} overflows")]
    DeltaOverflow {
        region: String,
        dataset: &'static str,
        day: usize,
    },
}

/// One region's dataset: population plus four day-indexed series of equal length.
///
/// Built once per data load and treated as immutable while expressions are
/// evaluated against it. Field names follow the ingestion layer's JSON
/// (`newCases`, `newDeaths`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionData {
    pub id: String,
    pub name: String,
    pub population: u64,
    /// Cumulative confirmed cases
    pub cases: Vec<i64>,
    /// Cumulative deaths
    pub deaths: Vec<i64>,
    /// Day-over-day change in cases
    pub new_cases: Vec<i64>,
    /// Day-over-day change in deaths
    pub new_deaths: Vec<i64>,
}

impl RegionData {
    /// Build a region, checking that all four series have the same length.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        population: u64,
        cases: Vec<i64>,
        deaths: Vec<i64>,
        new_cases: Vec<i64>,
        new_deaths: Vec<i64>,
    ) -> Result<Self, DataError> {
        let region = RegionData {
            id: id.into(),
            name: name.into(),
            population,
            cases,
            deaths,
            new_cases,
            new_deaths,
        };
        region.validate()?;
        Ok(region)
    }

    /// Build a region from cumulative series, deriving the daily deltas.
    ///
    /// The first day's delta is the first day's value.
    pub fn from_cumulative(
        id: impl Into<String>,
        name: impl Into<String>,
        population: u64,
        cases: Vec<i64>,
        deaths: Vec<i64>,
    ) -> Result<Self, DataError> {
        let id = id.into();
        let new_cases = daily_deltas(&cases)
            .map_err(|day| DataError::DeltaOverflow {
                region: id.clone(),
                dataset: Dataset::Cases.name(),
                day,
            })?;
        let new_deaths = daily_deltas(&deaths)
            .map_err(|day| DataError::DeltaOverflow {
                region: id.clone(),
                dataset: Dataset::Deaths.name(),
                day,
            })?;
        Self::new(id, name, population, cases, deaths, new_cases, new_deaths)
    }

    /// Check the equal-length invariant (useful after deserializing).
    pub fn validate(&self) -> Result<(), DataError> {
        let expected = self.cases.len();
        for dataset in Dataset::ALL {
            let got = self.series(dataset).len();
            if got != expected {
                return Err(DataError::LengthMismatch {
                    region: self.id.clone(),
                    dataset: dataset.name(),
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }

    /// Number of days in the series
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn series(&self, dataset: Dataset) -> &[i64] {
        match dataset {
            Dataset::Cases => &self.cases,
            Dataset::Deaths => &self.deaths,
            Dataset::NewCases => &self.new_cases,
            Dataset::NewDeaths => &self.new_deaths,
        }
    }
}

/// Day-over-day differences; `Err(day)` if a difference does not fit in i64
fn daily_deltas(cumulative: &[i64]) -> Result<Vec<i64>, usize> {
    let mut previous = 0i64;
    cumulative
        .iter()
        .enumerate()
        .map(|(day, &today)| {
            let delta = today.checked_sub(previous).ok_or(day)?;
            previous = today;
            Ok(delta)
        })
        .collect()
}
