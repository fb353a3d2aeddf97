use conciliador_core::{Collective, Movement, ReconcileConfig};
use serde::Serialize;
use thiserror::Error;

use crate::grid::{Sheet, Workbook};
use crate::normalize::normalize_sheet;
use crate::preamble::Preamble;
use crate::schema::{infer_schema, NetSource, Role};

/// Sheet names this tool writes; a workbook holding only these is a previous
/// result fed back in.
pub const GENERATED_SHEETS: &[&str] = &[
    "Meta",
    "Resumen",
    "Clientes_Detalle",
    "Proveedores_Detalle",
    "Pendientes_Clientes",
    "Pendientes_Proveedores",
    "AR_Detalle",
    "AP_Detalle",
    "Pendientes_AR",
    "Pendientes_AP",
    "Clientes_Cuentas_Corrientes",
    "Proveedores_Cuentas_Corrientes",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("The workbook only contains generated result sheets; upload the original ledger")]
    AlreadyProcessed,
    #[error("No sheet has a usable account and amount layout")]
    NoUsableSheets,
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub config: ReconcileConfig,
    /// Process only this sheet.
    pub sheet: Option<String>,
}

/// What happened to one input sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetReport {
    pub name: String,
    pub header_row: usize,
    pub raw_rows: usize,
    pub columns: Vec<(Role, String)>,
    pub net_source: Option<NetSource>,
    pub processable_rows: usize,
    pub receivable_rows: usize,
    pub payable_rows: usize,
    pub error: Option<String>,
}

/// Movements of a whole workbook, with row indices running across sheets.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub preamble: Preamble,
    pub sheets: Vec<SheetReport>,
    pub receivables: Vec<Movement>,
    pub payables: Vec<Movement>,
}

impl Ingested {
    pub fn movements(&self, collective: Collective) -> &[Movement] {
        match collective {
            Collective::Receivables => &self.receivables,
            Collective::Payables => &self.payables,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.sheets.iter().map(|s| s.raw_rows).sum()
    }
}

fn select_sheets<'a>(
    workbook: &'a Workbook,
    filter: Option<&str>,
) -> Result<Vec<&'a Sheet>, IngestError> {
    let candidates: Vec<&Sheet> = match filter {
        Some(name) => {
            if GENERATED_SHEETS.contains(&name) {
                Vec::new()
            } else {
                let sheet = workbook
                    .sheets
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| IngestError::SheetNotFound(name.to_string()))?;
                vec![sheet]
            }
        }
        None => workbook
            .sheets
            .iter()
            .filter(|s| !GENERATED_SHEETS.contains(&s.name.as_str()))
            .collect(),
    };
    if candidates.is_empty() {
        return Err(IngestError::AlreadyProcessed);
    }
    Ok(candidates)
}

fn extend_reindexed(target: &mut Vec<Movement>, rows: Vec<Movement>) {
    for mut m in rows {
        m.row_index = target.len();
        target.push(m);
    }
}

pub fn ingest_workbook(workbook: &Workbook, options: &IngestOptions) -> Result<Ingested, IngestError> {
    let sheets = select_sheets(workbook, options.sheet.as_deref())?;
    let config = &options.config;
    let mut ingested = Ingested::default();
    let mut usable = 0;

    for (idx, sheet) in sheets.into_iter().enumerate() {
        let mapping = infer_schema(&sheet.rows, config.header_scan_rows);
        if idx == 0 {
            ingested.preamble = Preamble::extract(&sheet.rows, mapping.header_row);
        }

        let mut report = SheetReport {
            name: sheet.name.clone(),
            header_row: mapping.header_row,
            raw_rows: sheet.rows.len().saturating_sub(mapping.header_row + 1),
            columns: mapping.detected(),
            net_source: mapping.net_source(),
            processable_rows: 0,
            receivable_rows: 0,
            payable_rows: 0,
            error: None,
        };

        match normalize_sheet(sheet, &mapping, config) {
            Ok(normalized) => {
                usable += 1;
                report.processable_rows = normalized.processable_rows;
                report.receivable_rows = normalized.receivables.len();
                report.payable_rows = normalized.payables.len();
                tracing::info!(
                    sheet = %sheet.name,
                    header_row = mapping.header_row,
                    processable = report.processable_rows,
                    ar = report.receivable_rows,
                    ap = report.payable_rows,
                    "Sheet normalized"
                );
                extend_reindexed(&mut ingested.receivables, normalized.receivables);
                extend_reindexed(&mut ingested.payables, normalized.payables);
            }
            Err(e) => {
                tracing::warn!(sheet = %sheet.name, error = %e, "Skipping sheet");
                report.error = Some(e.to_string());
            }
        }
        ingested.sheets.push(report);
    }

    if usable == 0 {
        return Err(IngestError::NoUsableSheets);
    }
    Ok(ingested)
}
