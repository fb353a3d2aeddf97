use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl fmt::Display for Quarter {
    /// Spanish ledger notation: `1T`..`4T` (trimestre).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "1T"),
            Quarter::Q2 => write!(f, "2T"),
            Quarter::Q3 => write!(f, "3T"),
            Quarter::Q4 => write!(f, "4T"),
        }
    }
}

impl Quarter {
    pub fn new(n: u8) -> Option<Self> {
        match n {
            1 => Some(Quarter::Q1),
            2 => Some(Quarter::Q2),
            3 => Some(Quarter::Q3),
            4 => Some(Quarter::Q4),
            _ => None,
        }
    }

    pub fn first_month(self) -> u32 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 4,
            Quarter::Q3 => 7,
            Quarter::Q4 => 10,
        }
    }

    pub fn last_month(self) -> u32 {
        self.first_month() + 2
    }

    /// The quarter spanning exactly `start_month..=end_month`, if any.
    pub fn spanning(start_month: u32, end_month: u32) -> Option<Self> {
        [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4]
            .into_iter()
            .find(|q| q.first_month() == start_month && q.last_month() == end_month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }
}

/// Period a ledger export covers, as announced in its preamble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReportingPeriod {
    Quarter { quarter: Quarter, year: i32 },
    Annual(i32),
    Text(String),
}

impl ReportingPeriod {
    /// Maps a date range onto a quarter or a full year. Ranges that are
    /// neither come back as `None`.
    pub fn from_range(range: DateRange) -> Option<Self> {
        let (start_month, end_month) = (range.start.month(), range.end.month());
        let year = range.end.year();
        if start_month == 1 && end_month == 12 {
            return Some(ReportingPeriod::Annual(year));
        }
        Quarter::spanning(start_month, end_month)
            .map(|quarter| ReportingPeriod::Quarter { quarter, year })
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportingPeriod::Quarter { quarter, year } => write!(f, "{quarter} {year}"),
            ReportingPeriod::Annual(year) => write!(f, "Anual {year}"),
            ReportingPeriod::Text(text) => write!(f, "{text}"),
        }
    }
}
