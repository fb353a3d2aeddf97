use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger collective a movement is reconciled under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collective {
    /// Accounts receivable (customers). Debits raise the balance.
    Receivables,
    /// Accounts payable (suppliers). Credits raise the balance.
    Payables,
}

impl fmt::Display for Collective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collective::Receivables => write!(f, "AR"),
            Collective::Payables => write!(f, "AP"),
        }
    }
}

impl Collective {
    /// Classifies an account code by string prefix on its trimmed form.
    /// Receivables win when a code matches both.
    pub fn classify(account: &str, ar_prefix: &str, ap_prefixes: &[String]) -> Option<Self> {
        let account = account.trim();
        if account.is_empty() {
            return None;
        }
        if !ar_prefix.is_empty() && account.starts_with(ar_prefix) {
            return Some(Collective::Receivables);
        }
        if ap_prefixes
            .iter()
            .any(|p| !p.is_empty() && account.starts_with(p.as_str()))
        {
            return Some(Collective::Payables);
        }
        None
    }

    /// Sign applied to a raw `debit - credit` figure so invoices come out
    /// positive. Payables accrue as credits and are inverted.
    pub fn invoice_sign(self) -> i64 {
        match self {
            Collective::Receivables => 1,
            Collective::Payables => -1,
        }
    }

    /// Label used for summaries and output file names.
    pub fn label(self) -> &'static str {
        match self {
            Collective::Receivables => "clientes",
            Collective::Payables => "proveedores",
        }
    }
}
