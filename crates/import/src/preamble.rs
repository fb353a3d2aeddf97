//! Company name and reporting period from the rows above a ledger's header.

use chrono::NaiveDate;
use conciliador_core::{DateRange, Quarter, ReportingPeriod};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::grid::Cell;

const MAX_PREAMBLE_ROWS: usize = 10;

re!(re_company_label, r"(?i)(?:Empresa|Company|Razón Social|Razon Social|Cliente|Client):\s*(.+)");
re!(re_not_company, r"(?i)fecha|date|cuenta|account|debe|haber|saldo|balance|total|período|periodo|period");
re!(re_not_company_prefix, r"(?i)^(?:de |from |to |a )");
re!(re_period_label, r"(?i)(?:Período|Periodo|Period):\s*(.+)");
re!(re_short_period, r"(?i)\b(?:(\d)[TQ]|Q(\d))\s*(\d{4})\b");
re!(re_date_range,
    r"(?i)de\s+(\d{1,2})/(\d{1,2})/(\d{4})\s+a\s+(\d{1,2})/(\d{1,2})/(\d{4})");

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Preamble {
    pub company: Option<String>,
    pub period: Option<ReportingPeriod>,
}

impl Preamble {
    pub fn extract(rows: &[Vec<Cell>], header_row: usize) -> Self {
        Self {
            company: extract_company_name(rows, header_row),
            period: extract_period(rows, header_row),
        }
    }
}

fn preamble_rows(rows: &[Vec<Cell>], header_row: usize) -> impl Iterator<Item = Vec<String>> + '_ {
    rows.iter()
        .take(header_row.min(MAX_PREAMBLE_ROWS))
        .map(|row| row.iter().filter_map(Cell::text).collect())
}

fn looks_like_company(val: &str) -> bool {
    let len = val.chars().count();
    if !(3..=100).contains(&len) {
        return false;
    }
    let digits = val.chars().filter(char::is_ascii_digit).count();
    if digits * 2 > len {
        return false;
    }
    !re_not_company().is_match(val) && !re_not_company_prefix().is_match(val)
}

/// An explicit `Empresa: X` label wins; otherwise the first free-standing
/// text cell that does not look like a header, a period or a number.
pub fn extract_company_name(rows: &[Vec<Cell>], header_row: usize) -> Option<String> {
    for cells in preamble_rows(rows, header_row) {
        let labelled = cells.iter().find_map(|val| {
            let name = re_company_label().captures(val)?.get(1)?.as_str().trim();
            (name.chars().count() > 2).then(|| name.to_string())
        });
        if labelled.is_some() {
            return labelled;
        }
        if let Some(val) = cells.iter().find(|v| looks_like_company(v)) {
            return Some(val.clone());
        }
    }
    None
}

pub fn extract_period(rows: &[Vec<Cell>], header_row: usize) -> Option<ReportingPeriod> {
    preamble_rows(rows, header_row).find_map(|cells| {
        cells.iter().find_map(|val| {
            let text = re_period_label().captures(val)?.get(1)?.as_str().trim();
            (text.chars().count() > 5).then(|| parse_period(text))
        })
    })
}

/// `1T 2025`, `Q3 2024` or `de 01/04/2025 a 30/06/2025`; anything else is
/// kept as text.
pub fn parse_period(text: &str) -> ReportingPeriod {
    let raw = || ReportingPeriod::Text(text.to_string());

    if let Some(caps) = re_short_period().captures(text) {
        let quarter = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .and_then(Quarter::new);
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        return match (quarter, year) {
            (Some(quarter), Some(year)) => ReportingPeriod::Quarter { quarter, year },
            _ => raw(),
        };
    }

    if let Some(caps) = re_date_range().captures(text) {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let start = NaiveDate::from_ymd_opt(num(3).unwrap_or(0) as i32, num(2).unwrap_or(0), num(1).unwrap_or(0));
        let end = NaiveDate::from_ymd_opt(num(6).unwrap_or(0) as i32, num(5).unwrap_or(0), num(4).unwrap_or(0));
        return match (start, end) {
            (Some(start), Some(end)) => {
                ReportingPeriod::from_range(DateRange::new(start, end)).unwrap_or_else(raw)
            }
            _ => raw(),
        };
    }

    raw()
}
