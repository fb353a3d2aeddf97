use chrono::NaiveDate;
use conciliador_core::{Collective, Money, Movement, ReconcileConfig};
use rust_decimal::Decimal;

use crate::grid::{Cell, Sheet};
use crate::parse::{cell_amount, cell_date};
use crate::schema::{NetSource, SchemaError, SchemaMapping};

const PRIOR_BALANCE_MARKERS: &[&str] = &[
    "saldo anterior",
    "saldo inicial",
    "sumas anteriores",
    "apertura",
    "opening balance",
    "balance forward",
    "brought forward",
    "saldo d'obertura",
];

const RECONCILED_VALUES: &[&str] = &[
    "si", "s", "yes", "y", "x", "✓", "✔", "true", "verdadero", "cert", "1", "ok",
];

/// Date given to opening-balance rows and to every row of an undated sheet.
pub fn epoch_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
}

/// Movements from one sheet, split by collective. Row indices are local to
/// the sheet; the workbook reindexes them across sheets.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSheet {
    /// Rows with a usable date (or an opening-balance marker).
    pub processable_rows: usize,
    pub receivables: Vec<Movement>,
    pub payables: Vec<Movement>,
}

impl NormalizedSheet {
    pub fn rows(&self, collective: Collective) -> &[Movement] {
        match collective {
            Collective::Receivables => &self.receivables,
            Collective::Payables => &self.payables,
        }
    }
}

fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

/// Whether a marker-column cell flags the row as already reconciled.
pub fn is_reconciled_marker(cell: &Cell) -> bool {
    match cell {
        Cell::Bool(b) => *b,
        other => other
            .text()
            .map(|t| fold_diacritics(&t.to_lowercase()))
            .is_some_and(|t| RECONCILED_VALUES.contains(&t.as_str())),
    }
}

fn has_prior_balance_marker(texts: &[Option<&str>]) -> bool {
    texts.iter().flatten().any(|t| {
        let lower = t.to_lowercase();
        PRIOR_BALANCE_MARKERS.iter().any(|m| lower.contains(m))
    })
}

fn cell_at(row: &[Cell], col: Option<usize>) -> &Cell {
    static EMPTY: Cell = Cell::Empty;
    col.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}

fn raw_net(row: &[Cell], net: NetSource) -> Decimal {
    let amount = |col| cell_amount(cell_at(row, Some(col))).unwrap_or(Decimal::ZERO);
    match net {
        NetSource::DebitCredit { debit, credit } => amount(debit) - amount(credit),
        NetSource::Amount { column } => amount(column),
    }
}

/// Turns a sheet's data rows into movements. Fails only when the sheet has no
/// account column or no way to compute a net amount.
pub fn normalize_sheet(
    sheet: &Sheet,
    mapping: &SchemaMapping,
    config: &ReconcileConfig,
) -> Result<NormalizedSheet, SchemaError> {
    let (account_col, net) = mapping.require()?;
    let mut out = NormalizedSheet::default();
    let mut last_account: Option<String> = None;
    let mut last_counterparty: Option<String> = None;

    for row in sheet.rows.iter().skip(mapping.header_row + 1) {
        if row.iter().all(Cell::is_empty) {
            continue;
        }

        // Grouped exports only print account and counterparty on the first
        // line of each block.
        if let Some(account) = cell_at(row, Some(account_col)).text() {
            last_account = Some(account);
        }
        if let Some(cp) = cell_at(row, mapping.counterparty).text() {
            last_counterparty = Some(cp);
        }

        let document = cell_at(row, mapping.document).text();
        let concept = cell_at(row, mapping.concept).text();
        let raw = raw_net(row, net);

        let date = match mapping.date {
            None => epoch_date(),
            Some(col) => match cell_date(cell_at(row, Some(col))) {
                Some(d) => Some(d),
                None if !raw.is_zero()
                    && has_prior_balance_marker(&[concept.as_deref(), document.as_deref()]) =>
                {
                    epoch_date()
                }
                None => continue,
            },
        };
        out.processable_rows += 1;

        let Some(account) = last_account.as_deref().map(str::trim) else {
            continue;
        };
        let Some(collective) = Collective::classify(account, &config.ar_prefix, &config.ap_prefixes)
        else {
            continue;
        };

        let target = match collective {
            Collective::Receivables => &mut out.receivables,
            Collective::Payables => &mut out.payables,
        };
        target.push(Movement {
            counterparty: last_counterparty.clone(),
            date,
            account: account.to_string(),
            document,
            concept,
            net: Money::new(raw * Decimal::from(collective.invoice_sign())),
            collective,
            sheet: sheet.name.clone(),
            row_index: target.len(),
            pre_reconciled: mapping.reconciled.is_some_and(|c| is_reconciled_marker(cell_at(row, Some(c)))),
        });
    }

    Ok(out)
}
