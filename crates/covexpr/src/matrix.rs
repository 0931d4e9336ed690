//! Day x region result matrix and the summaries the map layer reads from it

use indexmap::IndexMap;
use serde::Serialize;

use crate::engine::CellError;

/// One day's values keyed by region id, in region insertion order.
///
/// A region is missing from a day when its cell was skipped.
pub type DayValues = IndexMap<String, f64>;

/// Result of evaluating one scalar expression for every region on every day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayMatrix {
    /// Region id to display name, in region insertion order
    regions: IndexMap<String, String>,
    days: Vec<DayValues>,
    skipped: Vec<CellError>,
    percentile_bounds: (f64, f64),
}

/// One region's column of the matrix, for the time chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSeries {
    /// Value per day; NaN where the cell was skipped
    pub values: Vec<f64>,
    /// Largest non-NaN value, NaN if there is none
    pub max: f64,
}

/// One entry of a day's ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRegion {
    pub id: String,
    /// Display name, as shown in the map's leader list
    pub name: String,
    pub value: f64,
}

impl DayMatrix {
    pub(crate) fn new(
        regions: IndexMap<String, String>,
        days: Vec<DayValues>,
        skipped: Vec<CellError>,
        percentile_bounds: (f64, f64),
    ) -> Self {
        Self {
            regions,
            days,
            skipped,
            percentile_bounds,
        }
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Region ids, in insertion order
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn region_name(&self, id: &str) -> Option<&str> {
        self.regions.get(id).map(String::as_str)
    }

    pub fn days(&self) -> &[DayValues] {
        &self.days
    }

    pub fn day(&self, day: usize) -> Option<&DayValues> {
        self.days.get(day)
    }

    pub fn value(&self, day: usize, region: &str) -> Option<f64> {
        self.days.get(day)?.get(region).copied()
    }

    /// Cells that failed and were left out (only under `CellPolicy::Skip`)
    pub fn skipped(&self) -> &[CellError] {
        &self.skipped
    }

    /// Percentiles (0 to 100) over every finite value in the matrix.
    ///
    /// A percentile at or above 100 is the maximum, below 0 the minimum.
    /// Otherwise the value at `floor(p * n / 100)` of the sorted values.
    /// `None` when the matrix holds no finite value.
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<Option<f64>> {
        let mut values: Vec<f64> = self
            .days
            .iter()
            .flat_map(|day| day.values().copied())
            .filter(|v| v.is_finite())
            .collect();
        values.sort_by(f64::total_cmp);

        percentiles
            .iter()
            .map(|&p| percentile(&values, p))
            .collect()
    }

    /// Legend domain: the percentiles at the engine's configured bounds
    pub fn color_domain(&self) -> Option<(f64, f64)> {
        let (low, high) = self.percentile_bounds;
        match self.percentiles(&[low, high]).as_slice() {
            [Some(low), Some(high)] => Some((*low, *high)),
            _ => None,
        }
    }

    pub fn region_series(&self, region: &str) -> Option<RegionSeries> {
        if !self.regions.contains_key(region) {
            return None;
        }

        let values: Vec<f64> = self
            .days
            .iter()
            .map(|day| day.get(region).copied().unwrap_or(f64::NAN))
            .collect();
        let max = values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
            .unwrap_or(f64::NAN);

        Some(RegionSeries { values, max })
    }

    /// The `n` highest values of a day, largest first. NaN values are left out.
    pub fn top_n(&self, day: usize, n: usize) -> Vec<RankedRegion> {
        let Some(values) = self.days.get(day) else {
            return Vec::new();
        };

        let mut ranked: Vec<RankedRegion> = values
            .iter()
            .filter(|(_, v)| !v.is_nan())
            .map(|(id, v)| RankedRegion {
                id: id.clone(),
                name: self.regions.get(id).cloned().unwrap_or_default(),
                value: *v,
            })
            .collect();
        ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
        ranked.truncate(n);
        ranked
    }
}

fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let index = if p >= 100.0 {
        last
    } else if p < 0.0 {
        0
    } else {
        ((p * sorted.len() as f64 / 100.0).floor() as usize).min(last)
    };
    Some(sorted[index])
}
