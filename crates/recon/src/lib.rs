macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod fuzzy;
pub mod pending;
mod phases;
pub mod pipeline;
pub mod reconciler;
pub mod references;
pub mod statement;
pub mod suggest;
pub mod summary;

pub use pipeline::{
    apply_justifications, reconcile_ingested, reconcile_movements, reconcile_sheets,
    reconcile_workbook, CollectiveReport, ReconcileReport,
};
pub use reconciler::{reconcile_counterparty, Reconciler};
pub use references::extract_references;
pub use statement::{classify, render, RowStatus, StatementLine, StatementRow};
pub use suggest::{suggest, OpenBalance, Unplaced};
pub use summary::{CollectiveSummary, DailyStats, RunStats};
