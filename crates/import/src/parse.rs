use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::grid::Cell;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Parses ledger amounts in either European (`1.234,56`) or Anglo
/// (`1,234.56`) notation, with optional currency symbols, accounting
/// parentheses or a trailing minus.
pub fn parse_amount(s: &str) -> Result<Decimal, ParseError> {
    let s = s.trim();
    let (paren_negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let mut cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ' ' | '\u{a0}' | '\''))
        .collect();
    let trailing_negative = cleaned.ends_with('-') && cleaned.len() > 1;
    if trailing_negative {
        cleaned.pop();
    }

    let normalized = normalize_separators(&cleaned);
    let mut dec = Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| ParseError::InvalidAmount(s.to_string()))?;
    if paren_negative || trailing_negative {
        dec = -dec;
    }
    Ok(dec)
}

/// Rewrites thousands/decimal separators to the plain `1234.56` form.
fn normalize_separators(s: &str) -> String {
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');
    match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(c)) => {
            let decimals = s.len() - c - 1;
            if s.matches(',').count() == 1 && decimals != 3 {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (Some(d), None) => {
            let decimals = s.len() - d - 1;
            let integer = s[..d].trim_start_matches('-');
            let grouped = decimals == 3
                && !integer.is_empty()
                && integer.len() <= 3
                && !integer.starts_with('0');
            if s.matches('.').count() > 1 || grouped {
                s.replace('.', "")
            } else {
                s.to_string()
            }
        }
        (None, None) => s.to_string(),
    }
}

// Two-digit years first: `%Y` would happily read `24` as year 24.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%y", "%d-%m-%y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Day-first date parsing, the convention of Spanish ledger exports.
pub fn parse_date(s: &str) -> Result<NaiveDate, ParseError> {
    let s = s.trim();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(ParseError::InvalidDate(s.to_string()))
}

/// Spreadsheet serial day numbers (1899-12-30 epoch), limited to a plausible
/// window so ordinary amounts are not mistaken for dates.
pub fn serial_to_date(serial: Decimal) -> Option<NaiveDate> {
    let days = serial.trunc();
    if days < Decimal::from(20_000) || days > Decimal::from(80_000) {
        return None;
    }
    let days = days.to_i64()?;
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days))
}

pub fn cell_amount(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_amount(s).ok(),
        Cell::Bool(_) | Cell::Date(_) | Cell::Empty => None,
    }
}

pub fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(s) => parse_date(s).ok().or_else(|| {
            let t = s.trim();
            if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            serial_to_date(Decimal::from_str(t).ok()?)
        }),
        Cell::Number(n) => serial_to_date(*n),
        Cell::Bool(_) | Cell::Empty => None,
    }
}
