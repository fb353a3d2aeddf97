macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod csv;
pub mod grid;
pub mod normalize;
pub mod parse;
pub mod preamble;
pub mod schema;
pub mod workbook;

pub use csv::{read_sheet, read_workbook, CsvError, CsvSheetOptions};
pub use grid::{Cell, Sheet, Workbook};
pub use normalize::{normalize_sheet, NormalizedSheet};
pub use parse::{parse_amount, parse_date, ParseError};
pub use preamble::Preamble;
pub use schema::{infer_schema, NetSource, Role, SchemaError, SchemaMapping};
pub use workbook::{ingest_workbook, IngestError, IngestOptions, Ingested, SheetReport};
