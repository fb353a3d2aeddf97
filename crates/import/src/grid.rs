use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An untyped spreadsheet cell, as handed over by whatever read the file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
    Bool(bool),
}

impl Cell {
    /// Builds a cell from raw text; blank strings become `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed textual form, or `None` for empty cells. Integral numbers
    /// render without a fraction so account codes read as `430000`, not
    /// `430000.0`.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Cell::Number(n) => Some(n.normalize().to_string()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }
}

/// One worksheet as a grid of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Convenience for tests and text sources: every field becomes a cell via
    /// [`Cell::from_raw`].
    pub fn from_strings(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| Cell::from_raw(c)).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_empty() {
        assert_eq!(Cell::from_raw("   "), Cell::Empty);
        assert!(Cell::Text("  ".into()).is_empty());
        assert!(!Cell::Number(Decimal::ZERO).is_empty());
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        let cell = Cell::Number(Decimal::new(4300000, 1));
        assert_eq!(cell.text().as_deref(), Some("430000"));
    }

    #[test]
    fn width_is_widest_row() {
        let sheet = Sheet::from_strings("s", &[&["a"], &["a", "b", "c"], &[]]);
        assert_eq!(sheet.width(), 3);
    }
}
