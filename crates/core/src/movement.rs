use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::account::Collective;
use super::money::Money;

/// One ledger line after normalization. `net` is signed so that invoices are
/// positive and payments negative in either collective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub counterparty: Option<String>,
    pub date: Option<NaiveDate>,
    pub account: String,
    pub document: Option<String>,
    pub concept: Option<String>,
    pub net: Money,
    pub collective: Collective,
    pub sheet: String,
    /// Position across all sheets of the collective; breaks ordering ties.
    pub row_index: usize,
    pub pre_reconciled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    Invoice,
    Payment,
    Zero,
}

impl Movement {
    pub fn kind(&self) -> MovementKind {
        match self.net.decimal().cmp(&rust_decimal::Decimal::ZERO) {
            Ordering::Greater => MovementKind::Invoice,
            Ordering::Less => MovementKind::Payment,
            Ordering::Equal => MovementKind::Zero,
        }
    }

    /// Join key shared by every allocation row that touches this movement:
    /// counterparty, document (or date), account and signed amount.
    pub fn key(&self) -> String {
        let reference = match self.document.as_deref().filter(|d| !d.is_empty()) {
            Some(doc) => doc.to_string(),
            None => self
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        };
        format!(
            "{} | {} | {} | {}",
            self.counterparty.as_deref().unwrap_or(""),
            reference,
            self.account,
            self.net.signed_string()
        )
    }

    /// Chronological stream order: dated rows first by date, undated rows
    /// last, row index as the tie-break.
    pub fn stream_cmp(&self, other: &Self) -> Ordering {
        compare_dates(self.date, other.date).then(self.row_index.cmp(&other.row_index))
    }
}

/// Total order on optional dates with `None` sorting after every date.
pub fn compare_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Absolute day gap between two optional dates.
pub fn day_gap(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).num_days().abs()),
        _ => None,
    }
}
