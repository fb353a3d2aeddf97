use chrono::NaiveDate;
use conciliador_core::{AllocationRecord, Collective, Money, PendingItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pipeline::ReconcileReport;

/// Days of per-day history kept by [`RunStats`].
const DAILY_HISTORY: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectiveSummary {
    pub collective: Collective,
    /// Sum of positive allocations.
    pub allocated: Money,
    /// Sum of negative allocations (unplaced payment amounts).
    pub unallocated: Money,
    pub pending_documents: usize,
}

impl CollectiveSummary {
    pub fn summarize(collective: Collective, records: &[AllocationRecord], pending: &[PendingItem]) -> Self {
        let (mut allocated, mut unallocated) = (Money::zero(), Money::zero());
        for record in records {
            if record.allocated.decimal().is_sign_negative() {
                unallocated += record.allocated;
            } else {
                allocated += record.allocated;
            }
        }
        Self {
            collective,
            allocated: allocated.rounded(),
            unallocated: unallocated.rounded(),
            pending_documents: pending.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub count: u64,
    pub rows: u64,
}

/// Usage counters across runs. Owned by the caller; nothing here is global
/// or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_reconciliations: u64,
    pub total_workbooks: u64,
    pub total_rows: u64,
    pub first_run: Option<NaiveDate>,
    pub last_run: Option<NaiveDate>,
    pub daily: BTreeMap<NaiveDate, DailyStats>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, day: NaiveDate, report: &ReconcileReport) {
        let rows = report.rows_processed() as u64;
        self.total_reconciliations += 1;
        self.total_workbooks += 1;
        self.total_rows += rows;
        self.first_run = Some(self.first_run.map_or(day, |first| first.min(day)));
        self.last_run = Some(self.last_run.map_or(day, |last| last.max(day)));

        let entry = self.daily.entry(day).or_default();
        entry.count += 1;
        entry.rows += rows;

        while self.daily.len() > DAILY_HISTORY {
            self.daily.pop_first();
        }
    }
}
