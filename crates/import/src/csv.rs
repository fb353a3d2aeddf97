use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::grid::{Cell, Sheet, Workbook};

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("No CSV sheets found in {0}")]
    NoSheets(String),
}

#[derive(Debug, Clone, Default)]
pub struct CsvSheetOptions {
    /// Field delimiter; sniffed from the first lines when `None`.
    pub delimiter: Option<u8>,
}

/// Reads a whole CSV source into an untyped grid. No header handling happens
/// here: ledger exports carry preamble rows and the header row is located
/// later by schema inference.
pub fn read_sheet<R: Read>(
    name: &str,
    mut data: R,
    options: &CsvSheetOptions,
) -> Result<Sheet, CsvError> {
    let mut bytes = Vec::new();
    data.read_to_end(&mut bytes)?;
    let raw = decode(bytes);
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(raw));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(raw.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(Cell::from_raw).collect());
    }

    Ok(Sheet::new(name, rows))
}

pub fn read_sheet_file(path: &Path, options: &CsvSheetOptions) -> Result<Sheet, CsvError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string();
    let file = fs::File::open(path)?;
    read_sheet(&name, file, options)
}

/// A workbook from disk: a directory holds one sheet per `*.csv` file (sorted
/// by file name), a single file is a one-sheet workbook.
pub fn read_workbook(path: &Path, options: &CsvSheetOptions) -> Result<Workbook, CsvError> {
    if !path.is_dir() {
        return Ok(Workbook::new(vec![read_sheet_file(path, options)?]));
    }

    let mut files: Vec<_> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CsvError::NoSheets(path.display().to_string()));
    }

    let sheets = files
        .iter()
        .map(|p| read_sheet_file(p, options))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Workbook::new(sheets))
}

/// UTF-8 when valid, otherwise Windows-1252 (what spreadsheet apps on
/// Spanish-locale Windows export by default).
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            tracing::debug!("Input is not UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Picks whichever of `;`, `,` or tab appears most often in the first lines.
/// Spanish exports favour `;` because `,` is the decimal separator.
fn sniff_delimiter(raw: &str) -> u8 {
    let sample: Vec<&str> = raw.lines().take(10).collect();
    let count = |c: char| sample.iter().map(|l| l.matches(c).count()).sum::<usize>();
    [(b';', count(';')), (b'\t', count('\t')), (b',', count(','))]
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .filter(|(_, n)| *n > 0)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_ragged_rows_without_headers() {
        let data = "Empresa: ACME SL\nFecha;Cuenta;Debe;Haber\n01/01/2024;430000001;1.000,00;\n";
        let sheet = read_sheet("Mayor", data.as_bytes(), &CsvSheetOptions::default()).unwrap();
        assert_eq!(sheet.name, "Mayor");
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].len(), 1);
        assert_eq!(sheet.rows[2][2], Cell::Text("1.000,00".into()));
        assert_eq!(sheet.rows[2][3], Cell::Empty);
    }

    #[test]
    fn sniffs_comma_and_semicolon() {
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(sniff_delimiter("a;b;c\n1,5;2;3"), b';');
        assert_eq!(sniff_delimiter("a\tb\n"), b'\t');
        assert_eq!(sniff_delimiter("single"), b',');
    }

    #[test]
    fn strips_byte_order_mark() {
        let data = "\u{feff}Fecha,Cuenta\n";
        let sheet = read_sheet("s", data.as_bytes(), &CsvSheetOptions::default()).unwrap();
        assert_eq!(sheet.rows[0][0], Cell::Text("Fecha".into()));
    }

    #[test]
    fn windows_1252_export_is_decoded() {
        let data = b"Fecha;Tercero\n01/01/2024;Compa\xf1\xeda Ib\xe9rica\n";
        let sheet = read_sheet("s", &data[..], &CsvSheetOptions::default()).unwrap();
        assert_eq!(sheet.rows[1][1], Cell::Text("Compañía Ibérica".into()));
    }

    #[test]
    fn utf8_is_kept_as_is() {
        let data = "Tercero\nCompañía\n";
        let sheet = read_sheet("s", data.as_bytes(), &CsvSheetOptions::default()).unwrap();
        assert_eq!(sheet.rows[1][0], Cell::Text("Compañía".into()));
    }

    #[test]
    fn directory_is_a_workbook_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [("b_ap.csv", "x;y\n"), ("a_ar.csv", "x;y\n"), ("notes.txt", "ignored")] {
            let mut f = fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        }
        let wb = read_workbook(dir.path(), &CsvSheetOptions::default()).unwrap();
        let names: Vec<&str> = wb.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a_ar", "b_ap"]);
    }

    #[test]
    fn empty_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_workbook(dir.path(), &CsvSheetOptions::default()),
            Err(CsvError::NoSheets(_))
        ));
    }
}
