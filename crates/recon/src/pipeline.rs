//! Workbook in, reconciled collectives out.

use chrono::NaiveDate;
use conciliador_core::{
    AllocationRecord, Collective, MatchMethod, Movement, PendingItem, ReconcileConfig,
};
use conciliador_import::{ingest_workbook, IngestError, IngestOptions, Ingested, Preamble, SheetReport, Workbook};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::pending;
use crate::reconciler::reconcile_counterparty;
use crate::statement::{self, StatementRow};
use crate::summary::CollectiveSummary;

/// Everything produced for one collective.
#[derive(Debug, Clone, Serialize)]
pub struct CollectiveReport {
    pub collective: Collective,
    pub records: Vec<AllocationRecord>,
    pub pending: Vec<PendingItem>,
    pub statement: Vec<StatementRow>,
    pub summary: CollectiveSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub preamble: Preamble,
    pub sheets: Vec<SheetReport>,
    pub receivables: Option<CollectiveReport>,
    pub payables: Option<CollectiveReport>,
}

impl ReconcileReport {
    pub fn rows_processed(&self) -> usize {
        self.sheets.iter().map(|s| s.processable_rows).sum()
    }

    pub fn collectives(&self) -> impl Iterator<Item = &CollectiveReport> {
        self.receivables.iter().chain(self.payables.iter())
    }

    pub fn collectives_mut(&mut self) -> impl Iterator<Item = &mut CollectiveReport> {
        self.receivables.iter_mut().chain(self.payables.iter_mut())
    }
}

/// Reconciles every counterparty in turn, named counterparties in order and
/// rows without one last, and concatenates the results.
pub fn reconcile_movements(movements: &[Movement], config: &ReconcileConfig) -> Vec<AllocationRecord> {
    let mut named: BTreeMap<&str, Vec<Movement>> = BTreeMap::new();
    let mut anonymous: Vec<Movement> = Vec::new();
    for m in movements {
        match m.counterparty.as_deref() {
            Some(cp) => named.entry(cp).or_default().push(m.clone()),
            None => anonymous.push(m.clone()),
        }
    }

    let mut records = Vec::new();
    for (counterparty, group) in &named {
        records.extend(reconcile_counterparty(Some(counterparty), group, config));
    }
    if !anonymous.is_empty() {
        records.extend(reconcile_counterparty(None, &anonymous, config));
    }
    records
}

fn reconcile_collective(
    collective: Collective,
    movements: &[Movement],
    config: &ReconcileConfig,
    today: NaiveDate,
) -> Option<CollectiveReport> {
    if movements.is_empty() {
        return None;
    }
    let tolerance = config.tolerance();
    let records = reconcile_movements(movements, config);
    let pending = pending::project(&records, tolerance, today);
    let statement = statement::render(&records, collective, tolerance);
    let summary = CollectiveSummary::summarize(collective, &records, &pending);
    tracing::info!(
        collective = %collective,
        movements = movements.len(),
        records = records.len(),
        pending = pending.len(),
        allocated = %summary.allocated,
        unallocated = %summary.unallocated,
        "Collective reconciled"
    );
    Some(CollectiveReport {
        collective,
        records,
        pending,
        statement,
        summary,
    })
}

pub fn reconcile_ingested(ingested: Ingested, config: &ReconcileConfig, today: NaiveDate) -> ReconcileReport {
    let receivables = reconcile_collective(Collective::Receivables, &ingested.receivables, config, today);
    let payables = reconcile_collective(Collective::Payables, &ingested.payables, config, today);
    ReconcileReport {
        preamble: ingested.preamble,
        sheets: ingested.sheets,
        receivables,
        payables,
    }
}

pub fn reconcile_workbook(
    workbook: &Workbook,
    config: &ReconcileConfig,
    today: NaiveDate,
) -> Result<ReconcileReport, IngestError> {
    reconcile_sheets(workbook, config, None, today)
}

/// [`reconcile_workbook`] restricted to a single sheet when `sheet` is set.
pub fn reconcile_sheets(
    workbook: &Workbook,
    config: &ReconcileConfig,
    sheet: Option<&str>,
    today: NaiveDate,
) -> Result<ReconcileReport, IngestError> {
    let options = IngestOptions {
        config: config.clone(),
        sheet: sheet.map(str::to_string),
    };
    let ingested = ingest_workbook(workbook, &options)?;
    Ok(reconcile_ingested(ingested, config, today))
}

/// Attaches user notes to unallocated payments. Returns how many were applied.
pub fn apply_justifications(records: &mut [AllocationRecord], notes: &HashMap<String, String>) -> usize {
    let mut applied = 0;
    for record in records.iter_mut().filter(|r| r.method == MatchMethod::Unallocated) {
        let Some(note) = record.justification_key().and_then(|key| notes.get(&key)) else {
            continue;
        };
        record.justification = Some(note.clone());
        applied += 1;
    }
    applied
}
