use anyhow::{Context, Result};
use chrono::NaiveDate;
use conciliador_core::{AllocationRecord, Money, PendingItem};
use conciliador_recon::{CollectiveReport, ReconcileReport, StatementRow};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

fn date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

fn amount(m: Money) -> String {
    format!("{:.2}", m.decimal())
}

#[derive(Serialize)]
struct DetailRow<'a> {
    set_id: u32,
    counterparty: Option<&'a str>,
    invoice_date: Option<String>,
    payment_date: Option<String>,
    invoice_key: Option<&'a str>,
    payment_key: Option<&'a str>,
    allocated: String,
    residual: Option<String>,
    method: String,
    confidence: f64,
    invoice_sheet: Option<&'a str>,
    payment_sheet: Option<&'a str>,
    invoice_document: Option<&'a str>,
    invoice_concept: Option<&'a str>,
    payment_document: Option<&'a str>,
    payment_concept: Option<&'a str>,
    suggestion: Option<&'a str>,
    suggested_action: Option<&'a str>,
    invoice_ref: Option<&'a str>,
    justification: Option<&'a str>,
}

impl<'a> From<&'a AllocationRecord> for DetailRow<'a> {
    fn from(r: &'a AllocationRecord) -> Self {
        let suggestion = r.suggestion.as_ref();
        DetailRow {
            set_id: r.set_id,
            counterparty: r.counterparty.as_deref(),
            invoice_date: date(r.invoice_date),
            payment_date: date(r.payment_date),
            invoice_key: r.invoice_key.as_deref(),
            payment_key: r.payment_key.as_deref(),
            allocated: amount(r.allocated),
            residual: r.residual.map(amount),
            method: r.method.to_string(),
            confidence: r.confidence,
            invoice_sheet: r.invoice_sheet.as_deref(),
            payment_sheet: r.payment_sheet.as_deref(),
            invoice_document: r.invoice_document.as_deref(),
            invoice_concept: r.invoice_concept.as_deref(),
            payment_document: r.payment_document.as_deref(),
            payment_concept: r.payment_concept.as_deref(),
            suggestion: suggestion.map(|s| s.message.as_str()),
            suggested_action: suggestion.map(|s| s.action.as_str()),
            invoice_ref: suggestion.and_then(|s| s.invoice_ref.as_deref()),
            justification: r.justification.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct PendingRow<'a> {
    counterparty: Option<&'a str>,
    invoice_key: &'a str,
    pending: String,
    invoice_date: Option<String>,
    age_days: Option<i64>,
}

impl<'a> From<&'a PendingItem> for PendingRow<'a> {
    fn from(p: &'a PendingItem) -> Self {
        PendingRow {
            counterparty: p.counterparty.as_deref(),
            invoice_key: &p.invoice_key,
            pending: amount(p.pending),
            invoice_date: date(p.invoice_date),
            age_days: p.age_days,
        }
    }
}

/// One flat line per statement row; unused columns stay empty.
#[derive(Serialize, Default)]
struct StatementCsvRow<'a> {
    row: &'static str,
    account: Option<&'a str>,
    counterparty: Option<&'a str>,
    date: Option<String>,
    concept: Option<&'a str>,
    document: Option<&'a str>,
    debit: Option<String>,
    credit: Option<String>,
    balance: Option<String>,
    set_id: Option<u32>,
    method: Option<&'static str>,
    allocated: Option<String>,
    pending: Option<String>,
    confidence: Option<f64>,
    status: Option<String>,
    symbol: Option<&'static str>,
}

impl<'a> From<&'a StatementRow> for StatementCsvRow<'a> {
    fn from(row: &'a StatementRow) -> Self {
        match row {
            StatementRow::AccountHeader {
                account,
                counterparty,
            } => StatementCsvRow {
                row: "account",
                account: account.as_deref(),
                counterparty: counterparty.as_deref(),
                ..Default::default()
            },
            StatementRow::Detail(line) => StatementCsvRow {
                row: "detail",
                date: date(line.date),
                concept: line.concept.as_deref(),
                document: line.document.as_deref(),
                debit: Some(amount(line.debit)),
                credit: Some(amount(line.credit)),
                balance: Some(amount(line.balance)),
                set_id: Some(line.set_id),
                method: Some(line.method),
                allocated: line.allocated.map(amount),
                pending: line.pending.map(amount),
                confidence: line.confidence,
                status: Some(line.status.to_string()),
                symbol: Some(line.symbol),
                ..Default::default()
            },
            StatementRow::Total {
                debit,
                credit,
                balance,
            } => StatementCsvRow {
                row: "total",
                debit: Some(amount(*debit)),
                credit: Some(amount(*credit)),
                balance: Some(amount(*balance)),
                ..Default::default()
            },
            StatementRow::Blank => StatementCsvRow {
                row: "blank",
                ..Default::default()
            },
        }
    }
}

fn write_rows<W: Write, T: Serialize>(w: W, rows: impl IntoIterator<Item = T>) -> Result<(), csv::Error> {
    let mut wrt = csv::WriterBuilder::new().from_writer(w);
    for row in rows {
        wrt.serialize(row)?;
    }
    wrt.flush()?;
    Ok(())
}

pub fn write_detail<W: Write>(w: W, records: &[AllocationRecord]) -> Result<(), csv::Error> {
    write_rows(w, records.iter().map(DetailRow::from))
}

pub fn write_pending<W: Write>(w: W, pending: &[PendingItem]) -> Result<(), csv::Error> {
    write_rows(w, pending.iter().map(PendingRow::from))
}

pub fn write_statement<W: Write>(w: W, rows: &[StatementRow]) -> Result<(), csv::Error> {
    write_rows(w, rows.iter().map(StatementCsvRow::from))
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn write_collective(dir: &Path, stem: &str, report: &CollectiveReport) -> Result<Vec<PathBuf>> {
    let label = report.collective.label();
    let detail = dir.join(format!("{stem}_{label}_detail.csv"));
    let pending = dir.join(format!("{stem}_{label}_pending.csv"));
    let statement = dir.join(format!("{stem}_{label}_statement.csv"));

    write_detail(create(&detail)?, &report.records)
        .with_context(|| format!("Failed to write {}", detail.display()))?;
    write_pending(create(&pending)?, &report.pending)
        .with_context(|| format!("Failed to write {}", pending.display()))?;
    write_statement(create(&statement)?, &report.statement)
        .with_context(|| format!("Failed to write {}", statement.display()))?;
    Ok(vec![detail, pending, statement])
}

/// Writes the report for one workbook and returns the files created.
pub fn write_report(dir: &Path, stem: &str, report: &ReconcileReport, format: Format) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    match format {
        Format::Json => {
            let path = dir.join(format!("{stem}_report.json"));
            let file = create(&path)?;
            serde_json::to_writer_pretty(file, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(vec![path])
        }
        Format::Csv => {
            let mut written = Vec::new();
            for collective in report.collectives() {
                written.extend(write_collective(dir, stem, collective)?);
            }
            Ok(written)
        }
    }
}
