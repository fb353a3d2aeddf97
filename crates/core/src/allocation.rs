use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;
use super::movement::Movement;

/// How an allocation row came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMethod {
    Reference,
    Exact,
    CombinedAmount,
    DateProximity,
    #[serde(rename = "FIFO")]
    Fifo,
    Open,
    Unallocated,
    PostProcessed,
    PreReconciled,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMethod::Reference => "Reference",
            MatchMethod::Exact => "Exact",
            MatchMethod::CombinedAmount => "CombinedAmount",
            MatchMethod::DateProximity => "DateProximity",
            MatchMethod::Fifo => "FIFO",
            MatchMethod::Open => "Open",
            MatchMethod::Unallocated => "Unallocated",
            MatchMethod::PostProcessed => "PostProcessed",
            MatchMethod::PreReconciled => "PreReconciled",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reference" => Ok(MatchMethod::Reference),
            "Exact" => Ok(MatchMethod::Exact),
            "CombinedAmount" => Ok(MatchMethod::CombinedAmount),
            "DateProximity" => Ok(MatchMethod::DateProximity),
            "FIFO" => Ok(MatchMethod::Fifo),
            "Open" => Ok(MatchMethod::Open),
            "Unallocated" => Ok(MatchMethod::Unallocated),
            "PostProcessed" => Ok(MatchMethod::PostProcessed),
            "PreReconciled" => Ok(MatchMethod::PreReconciled),
            other => Err(format!("Unknown match method: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    SmallAmount,
    AdvancePayment,
    FutureInvoices,
    DigitError,
    UnusualAmount,
    PartialPayment,
    CreditNote,
    Unknown,
}

/// Diagnosis attached to a payment the matcher could not place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub confidence: f64,
    pub message: String,
    pub action: String,
    pub invoice_ref: Option<String>,
}

/// One output row. A payment spread over three invoices yields three rows;
/// open invoices and unallocated payments yield one row each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub set_id: u32,
    pub counterparty: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub invoice_key: Option<String>,
    pub payment_key: Option<String>,
    /// Positive for invoice allocations, negative for an unallocated remainder.
    pub allocated: Money,
    /// Invoice balance left after this row; `None` on payment-only rows.
    pub residual: Option<Money>,
    pub invoice_sheet: Option<String>,
    pub payment_sheet: Option<String>,
    pub method: MatchMethod,
    pub confidence: f64,
    pub invoice_account: Option<String>,
    pub invoice_document: Option<String>,
    pub invoice_concept: Option<String>,
    pub payment_account: Option<String>,
    pub payment_document: Option<String>,
    pub payment_concept: Option<String>,
    pub suggestion: Option<Suggestion>,
    pub justification: Option<String>,
}

impl AllocationRecord {
    /// A record with no invoice or payment side yet.
    pub fn new(set_id: u32, counterparty: Option<String>, method: MatchMethod) -> Self {
        Self {
            set_id,
            counterparty,
            invoice_date: None,
            payment_date: None,
            invoice_key: None,
            payment_key: None,
            allocated: Money::zero(),
            residual: None,
            invoice_sheet: None,
            payment_sheet: None,
            method,
            confidence: 0.0,
            invoice_account: None,
            invoice_document: None,
            invoice_concept: None,
            payment_account: None,
            payment_document: None,
            payment_concept: None,
            suggestion: None,
            justification: None,
        }
    }

    pub fn with_invoice(mut self, invoice: &Movement) -> Self {
        self.invoice_date = invoice.date;
        self.invoice_key = Some(invoice.key());
        self.invoice_sheet = Some(invoice.sheet.clone());
        self.invoice_account = Some(invoice.account.clone());
        self.invoice_document = invoice.document.clone();
        self.invoice_concept = invoice.concept.clone();
        self
    }

    pub fn with_payment(mut self, payment: &Movement) -> Self {
        self.payment_date = payment.date;
        self.payment_key = Some(payment.key());
        self.payment_sheet = Some(payment.sheet.clone());
        self.payment_account = Some(payment.account.clone());
        self.payment_document = payment.document.clone();
        self.payment_concept = payment.concept.clone();
        self
    }

    /// Copies the payment side of `other` onto this record.
    pub fn take_payment_side(&mut self, other: &AllocationRecord) {
        self.payment_date = other.payment_date;
        self.payment_key = other.payment_key.clone();
        self.payment_sheet = other.payment_sheet.clone();
        self.payment_account = other.payment_account.clone();
        self.payment_document = other.payment_document.clone();
        self.payment_concept = other.payment_concept.clone();
    }

    /// Key user notes are filed under: `"{set_id}-{payment_key}"`.
    pub fn justification_key(&self) -> Option<String> {
        self.payment_key
            .as_deref()
            .map(|key| format!("{}-{}", self.set_id, key))
    }
}

/// Still-open invoice as of the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    pub counterparty: Option<String>,
    pub invoice_key: String,
    pub pending: Money,
    pub invoice_date: Option<NaiveDate>,
    pub age_days: Option<i64>,
}

/// Rounds a confidence to one decimal place.
pub fn round_confidence(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
