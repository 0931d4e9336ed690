//! AST types for covexpr
//!
//! Split into:
//! - `surface`: What the parser produces (names resolved, not yet typed)
//! - `typed`: What eval consumes (type-checked, Scalar/Array split)

pub mod surface;
pub mod typed;

// Shared types used by both surface and typed trees

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A per-region series that can be indexed or sliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Cases,
    Deaths,
    NewCases,
    NewDeaths,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::Cases,
        Dataset::Deaths,
        Dataset::NewCases,
        Dataset::NewDeaths,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cases" => Some(Dataset::Cases),
            "deaths" => Some(Dataset::Deaths),
            "newcases" => Some(Dataset::NewCases),
            "newdeaths" => Some(Dataset::NewDeaths),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Cases => "cases",
            Dataset::Deaths => "deaths",
            Dataset::NewCases => "newcases",
            Dataset::NewDeaths => "newdeaths",
        }
    }
}

/// Zero-argument names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Population of the region
    Population,
    /// The day being evaluated
    Day,
    /// Index of the first day (always 0)
    First,
    /// Length of the series (one past the last readable day)
    Last,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "population" => Some(Constant::Population),
            "day" => Some(Constant::Day),
            "first" => Some(Constant::First),
            "last" => Some(Constant::Last),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Population => "population",
            Constant::Day => "day",
            Constant::First => "first",
            Constant::Last => "last",
        }
    }
}

/// Reductions from an array to a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Max,
    Min,
    Sum,
    Average,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "max" => Some(Aggregate::Max),
            "min" => Some(Aggregate::Min),
            "sum" => Some(Aggregate::Sum),
            "average" => Some(Aggregate::Average),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Sum => "sum",
            Aggregate::Average => "average",
        }
    }
}

/// Name of the shift function, the only builtin that is not a dataset or aggregate.
pub const SHIFT: &str = "shift";
