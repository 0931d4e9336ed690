//! Named expressions offered in the map's drop-down

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub key: &'static str,
    pub title: &'static str,
    pub expression: &'static str,
}

const fn preset(key: &'static str, title: &'static str, expression: &'static str) -> Preset {
    Preset {
        key,
        title,
        expression,
    }
}

pub const PRESETS: &[Preset] = &[
    preset(
        "sevenDayAvgNewCasesPer100000",
        "7-day average of new cases per 100,000 people",
        "(cases(day) - cases(day-7)) / 7 / population * 100000",
    ),
    preset(
        "sevenDayAvgNewDeathsPer100000",
        "7-day average of new deaths per 100,000 people",
        "(deaths(day) - deaths(day-7)) / 7 / population * 100000",
    ),
    preset(
        "newCasesPer100000",
        "New cases per 100,000 people",
        "newcases(day) / population * 100000",
    ),
    preset(
        "newDeathsPer100000",
        "New deaths per 100,000 people",
        "newdeaths(day) / population * 100000",
    ),
    preset(
        "totalCasesPer100000",
        "Total confirmed cases per 100,000 people",
        "cases(day) / population * 100000",
    ),
    preset(
        "totalDeathsPer100000",
        "Total deaths per 100,000 people",
        "deaths(day) / population * 100000",
    ),
    preset(
        "sevenDayAvgNewCases",
        "7-day average of new cases",
        "(cases(day) - cases(day-7)) / 7",
    ),
    preset(
        "sevenDayAvgNewDeaths",
        "7-day average of new deaths",
        "(deaths(day) - deaths(day-7)) / 7",
    ),
    preset("newCases", "New cases", "newcases(day)"),
    preset("newDeaths", "New deaths", "newdeaths(day)"),
    preset("totalCases", "Total cases", "cases(day)"),
    preset("totalDeaths", "Total deaths", "deaths(day)"),
    preset(
        "progressToZero",
        "Percentage of maximum new cases",
        "newcases(day) / max(newcases(first, last)) * 100",
    ),
    preset(
        "progressToZeroSevenDayAvg",
        "Percentage of maximum new cases, averaged over 7 days",
        "(cases(day) - cases(day-7)) / max(cases(first, last) - shift(cases(first, last), 7)) * 100",
    ),
    preset(
        "deathRate",
        "Cumulative death rate",
        "deaths(day) / cases(day) * 100",
    ),
];

/// Look up a preset by key
pub fn find(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key == key)
}
