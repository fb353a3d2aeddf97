use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::grid::Cell;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("No account column found")]
    MissingAccount,
    #[error("No net amount column found (need debit/credit or a single amount column)")]
    MissingNet,
}

/// Semantic role a column can play in a ledger export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Date,
    Account,
    Debit,
    Credit,
    Balance,
    Counterparty,
    Document,
    Concept,
    Reconciled,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Date => "date",
            Role::Account => "account",
            Role::Debit => "debit",
            Role::Credit => "credit",
            Role::Balance => "balance",
            Role::Counterparty => "counterparty",
            Role::Document => "document",
            Role::Concept => "concept",
            Role::Reconciled => "reconciled",
        };
        write!(f, "{name}")
    }
}

const HEADER_KEYWORDS: &[&str] = &[
    "fecha", "data", "date", "cuenta", "compte", "account", "debe", "deure", "debit", "cargo",
    "haber", "haver", "credit", "abono", "saldo", "balance", "descripci[oó]n", "descripc",
    "tercero", "tercer", "importe", "import", "amount", "documento", "document", "factura",
    "invoice",
];

/// Ordered pattern lists per role. Earlier patterns win over later ones.
const ROLE_PATTERNS: &[(Role, &[&str])] = &[
    (Role::Date, &["fecha", "data", "date", r"f\.?contab", "asiento.*fecha"]),
    (Role::Account, &["cuenta", "compte", "cta", "account", "cod.*cta"]),
    (Role::Debit, &["debe", "deure", "cargo", "càrrec", "debit"]),
    (Role::Credit, &["haber", "haver", "abono", "abonament", "credit", "crèdit"]),
    (Role::Balance, &["saldo", "balance"]),
    (
        Role::Counterparty,
        &[
            "descripci[oó]n", "descripc", "proveedor", "proveïdor", "cliente", "client",
            "tercero", "tercer", "contrapartida", "nombre", "nom", r"raz[oó]n\s*social",
        ],
    ),
    (
        Role::Document,
        &["factura", "documento", "document", r"n[ºo]\s*doc", "n[úu]mero", "número", "ref"],
    ),
    (Role::Concept, &["concepto", "concepte", "desc", "glosa", "detalle", "detall", "narr"]),
    (
        Role::Reconciled,
        &["punt", "conciliad", "conciliat", "reconciled", "cleared", "pre.?reconc"],
    ),
];

const MIN_HEADER_SCORE: usize = 2;
const LEGACY_MIN_COLUMNS: usize = 9;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("invalid regex"))
        .collect()
}

fn header_keywords() -> &'static [Regex] {
    static R: OnceLock<Vec<Regex>> = OnceLock::new();
    R.get_or_init(|| compile(HEADER_KEYWORDS))
}

fn role_patterns() -> &'static [(Role, Vec<Regex>)] {
    static R: OnceLock<Vec<(Role, Vec<Regex>)>> = OnceLock::new();
    R.get_or_init(|| {
        ROLE_PATTERNS
            .iter()
            .map(|(role, pats)| (*role, compile(pats)))
            .collect()
    })
}

re!(re_amount_header, r"(?i)importe|monto|amount");

/// Where a movement's signed net amount comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetSource {
    /// Debit minus credit.
    DebitCredit { debit: usize, credit: usize },
    /// A single signed amount column.
    Amount { column: usize },
}

impl fmt::Display for NetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetSource::DebitCredit { .. } => write!(f, "debit - credit"),
            NetSource::Amount { column } => write!(f, "column {column}"),
        }
    }
}

/// Role-to-column map for one sheet, fixed once inferred.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SchemaMapping {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub date: Option<usize>,
    pub account: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub balance: Option<usize>,
    pub counterparty: Option<usize>,
    pub document: Option<usize>,
    pub concept: Option<usize>,
    pub reconciled: Option<usize>,
    /// Set when role detection failed and the fixed positional layout was used.
    pub legacy_layout: bool,
}

impl SchemaMapping {
    pub fn column(&self, role: Role) -> Option<usize> {
        match role {
            Role::Date => self.date,
            Role::Account => self.account,
            Role::Debit => self.debit,
            Role::Credit => self.credit,
            Role::Balance => self.balance,
            Role::Counterparty => self.counterparty,
            Role::Document => self.document,
            Role::Concept => self.concept,
            Role::Reconciled => self.reconciled,
        }
    }

    fn set(&mut self, role: Role, column: Option<usize>) {
        let slot = match role {
            Role::Date => &mut self.date,
            Role::Account => &mut self.account,
            Role::Debit => &mut self.debit,
            Role::Credit => &mut self.credit,
            Role::Balance => &mut self.balance,
            Role::Counterparty => &mut self.counterparty,
            Role::Document => &mut self.document,
            Role::Concept => &mut self.concept,
            Role::Reconciled => &mut self.reconciled,
        };
        *slot = column;
    }

    /// Detected roles with their header names, in role order.
    pub fn detected(&self) -> Vec<(Role, String)> {
        role_patterns()
            .iter()
            .filter_map(|(role, _)| {
                let col = self.column(*role)?;
                let name = self.headers.get(col).cloned().unwrap_or_default();
                Some((*role, name))
            })
            .collect()
    }

    /// Debit/credit when both are mapped, else the single amount-like header.
    pub fn net_source(&self) -> Option<NetSource> {
        if let (Some(debit), Some(credit)) = (self.debit, self.credit) {
            return Some(NetSource::DebitCredit { debit, credit });
        }
        let amount_columns: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| re_amount_header().is_match(h))
            .map(|(i, _)| i)
            .collect();
        match amount_columns.as_slice() {
            [column] => Some(NetSource::Amount { column: *column }),
            _ => None,
        }
    }

    /// The account column and net source a sheet needs to be processable.
    pub fn require(&self) -> Result<(usize, NetSource), SchemaError> {
        let account = self.account.ok_or(SchemaError::MissingAccount)?;
        let net = self.net_source().ok_or(SchemaError::MissingNet)?;
        Ok((account, net))
    }
}

/// Picks the row among the first `scan_rows` that matches the most header
/// keywords. Falls back to row 0 when no row scores at least 2.
pub fn find_header_row(rows: &[Vec<Cell>], scan_rows: usize) -> usize {
    let mut best_idx = 0;
    let mut best_score = 0;
    for (idx, row) in rows.iter().take(scan_rows).enumerate() {
        let text = row
            .iter()
            .map(|c| c.text().unwrap_or_default().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let score = header_keywords().iter().filter(|re| re.is_match(&text)).count();
        if score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }
    if best_score < MIN_HEADER_SCORE {
        0
    } else {
        best_idx
    }
}

/// Trimmed, whitespace-collapsed, lower-cased header name.
pub fn normalize_header(cell: Option<&Cell>, index: usize) -> String {
    let raw = cell.and_then(Cell::text).unwrap_or_default();
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        format!("unnamed: {index}")
    } else {
        collapsed.to_lowercase()
    }
}

/// Maps roles onto normalized headers. For each role the patterns are tried in
/// order and the first column matching a pattern wins.
pub fn detect_columns(headers: &[String]) -> SchemaMapping {
    let mut mapping = SchemaMapping {
        headers: headers.to_vec(),
        ..Default::default()
    };
    for (role, patterns) in role_patterns() {
        let column = patterns
            .iter()
            .find_map(|re| headers.iter().position(|h| re.is_match(h)));
        mapping.set(*role, column);
    }

    let resolved = mapping.date.is_some()
        && mapping.account.is_some()
        && (mapping.debit.is_some() || mapping.credit.is_some());
    if !resolved && headers.len() >= LEGACY_MIN_COLUMNS {
        mapping = SchemaMapping {
            headers: headers.to_vec(),
            account: Some(0),
            counterparty: Some(1),
            date: Some(3),
            concept: Some(4),
            document: Some(5),
            debit: Some(6),
            credit: Some(7),
            balance: Some(8),
            legacy_layout: true,
            ..Default::default()
        };
    }
    mapping
}

/// Header-row detection followed by column-role detection.
pub fn infer_schema(rows: &[Vec<Cell>], scan_rows: usize) -> SchemaMapping {
    let header_row = find_header_row(rows, scan_rows);
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let header_cells = rows.get(header_row);
    let headers: Vec<String> = (0..width)
        .map(|i| normalize_header(header_cells.and_then(|r| r.get(i)), i))
        .collect();

    let mut mapping = detect_columns(&headers);
    mapping.header_row = header_row;
    tracing::debug!(
        header_row,
        legacy = mapping.legacy_layout,
        columns = ?mapping.detected(),
        "Schema inferred"
    );
    mapping
}
