//! Running-balance account statements built from allocation records.

use chrono::NaiveDate;
use conciliador_core::{compare_dates, AllocationRecord, Collective, MatchMethod, Money};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    PreReconciled,
    Pending,
    Partial,
    FullyMatched,
    Neutral,
}

impl RowStatus {
    pub fn symbol(self) -> &'static str {
        match self {
            RowStatus::FullyMatched | RowStatus::PreReconciled => "✓",
            RowStatus::Partial => "⚠",
            RowStatus::Pending => "✗",
            RowStatus::Neutral => "",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowStatus::PreReconciled => write!(f, "pre_reconciled"),
            RowStatus::Pending => write!(f, "pending"),
            RowStatus::Partial => write!(f, "partial"),
            RowStatus::FullyMatched => write!(f, "fully_matched"),
            RowStatus::Neutral => write!(f, "neutral"),
        }
    }
}

/// Catalan label shown in the statement's method column.
pub fn method_label(method: MatchMethod) -> &'static str {
    match method {
        MatchMethod::Reference => "Referència",
        MatchMethod::Exact => "Import exacte",
        MatchMethod::CombinedAmount => "Import combinat",
        MatchMethod::DateProximity => "Proximitat dates",
        MatchMethod::Fifo => "FIFO",
        MatchMethod::Open => "Pendent",
        MatchMethod::Unallocated => "Sense factura",
        MatchMethod::PostProcessed => "Postprocessat",
        MatchMethod::PreReconciled => "Prèviament conciliat",
    }
}

pub fn classify(method: MatchMethod, allocated: Money, residual: Option<Money>, tolerance: Money) -> RowStatus {
    match method {
        MatchMethod::PreReconciled => RowStatus::PreReconciled,
        MatchMethod::Open | MatchMethod::Unallocated => RowStatus::Pending,
        _ if allocated.exceeds(tolerance) => match residual {
            Some(res) if res.exceeds(tolerance) => RowStatus::Partial,
            _ => RowStatus::FullyMatched,
        },
        _ => RowStatus::Neutral,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementLine {
    pub date: Option<NaiveDate>,
    pub concept: Option<String>,
    pub document: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub balance: Money,
    pub set_id: u32,
    pub method: &'static str,
    pub allocated: Option<Money>,
    pub pending: Option<Money>,
    pub confidence: Option<f64>,
    pub status: RowStatus,
    pub symbol: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum StatementRow {
    AccountHeader {
        account: Option<String>,
        counterparty: Option<String>,
    },
    Detail(StatementLine),
    Total {
        debit: Money,
        credit: Money,
        balance: Money,
    },
    Blank,
}

fn account_of(record: &AllocationRecord) -> Option<&str> {
    record
        .invoice_account
        .as_deref()
        .or(record.payment_account.as_deref())
}

/// Debit and credit columns for one record.
fn columns(record: &AllocationRecord, collective: Collective, tolerance: Money) -> (Money, Money) {
    let allocated = record.allocated;
    let amount = if allocated.is_zero() {
        match record.residual {
            Some(res) if res.exceeds(tolerance) => res,
            _ => return (Money::zero(), Money::zero()),
        }
    } else {
        allocated
    };
    // Positive amounts settle the invoice side; negatives are the payer's.
    let settles = amount.decimal().is_sign_positive();
    match (collective, settles) {
        (Collective::Receivables, true) => (Money::zero(), amount),
        (Collective::Receivables, false) => (-amount, Money::zero()),
        (Collective::Payables, true) => (amount, Money::zero()),
        (Collective::Payables, false) => (Money::zero(), -amount),
    }
}

fn detail(record: &AllocationRecord, debit: Money, credit: Money, balance: Money, tolerance: Money) -> StatementLine {
    let status = classify(record.method, record.allocated, record.residual, tolerance);
    StatementLine {
        date: record.payment_date.or(record.invoice_date),
        concept: record
            .payment_concept
            .clone()
            .or_else(|| record.invoice_concept.clone()),
        document: record
            .payment_document
            .clone()
            .or_else(|| record.invoice_document.clone()),
        debit,
        credit,
        balance,
        set_id: record.set_id,
        method: method_label(record.method),
        allocated: (!record.allocated.is_zero()).then_some(record.allocated),
        pending: record.residual.filter(|res| res.exceeds(tolerance)),
        confidence: (record.confidence > 0.0).then_some(record.confidence),
        status,
        symbol: status.symbol(),
    }
}

fn account_order(a: &Option<&str>, b: &Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Renders one statement block per account: header, detail lines with a
/// running balance, totals and a blank separator.
pub fn render(records: &[AllocationRecord], collective: Collective, tolerance: Money) -> Vec<StatementRow> {
    let mut groups: BTreeMap<&str, Vec<&AllocationRecord>> = BTreeMap::new();
    let mut unassigned: Vec<&AllocationRecord> = Vec::new();
    for record in records {
        match account_of(record) {
            Some(account) => groups.entry(account).or_default().push(record),
            None => unassigned.push(record),
        }
    }

    let mut blocks: Vec<(Option<&str>, Vec<&AllocationRecord>)> =
        groups.into_iter().map(|(k, v)| (Some(k), v)).collect();
    if !unassigned.is_empty() {
        blocks.push((None, unassigned));
    }
    blocks.sort_by(|a, b| account_order(&a.0, &b.0));

    let mut rows = Vec::new();
    for (account, mut block) in blocks {
        block.sort_by(|a, b| compare_dates(a.payment_date, b.payment_date));

        rows.push(StatementRow::AccountHeader {
            account: account.map(str::to_string),
            counterparty: block.iter().find_map(|r| r.counterparty.clone()),
        });

        let (mut total_debit, mut total_credit, mut balance) =
            (Money::zero(), Money::zero(), Money::zero());
        for record in block {
            let (debit, credit) = columns(record, collective, tolerance);
            total_debit += debit;
            total_credit += credit;
            balance += match collective {
                Collective::Receivables => debit - credit,
                Collective::Payables => credit - debit,
            };
            rows.push(StatementRow::Detail(detail(record, debit, credit, balance, tolerance)));
        }

        rows.push(StatementRow::Total {
            debit: total_debit,
            credit: total_credit,
            balance,
        });
        rows.push(StatementRow::Blank);
    }
    rows
}
