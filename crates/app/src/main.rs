use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use conciliador_core::ReconcileConfig;
use conciliador_import::{read_workbook, CsvSheetOptions};
use conciliador_recon::{apply_justifications, reconcile_sheets, ReconcileReport, RunStats};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

mod output;

use output::Format;

#[derive(Parser)]
#[command(name = "conciliador")]
#[command(about = "Reconcile receivable and payable ledgers into open-item reports")]
struct Args {
    /// TOML file with reconciliation settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Amount below which differences count as zero
    #[arg(long)]
    tol: Option<Decimal>,

    /// Account prefix for receivables
    #[arg(long)]
    ar_prefix: Option<String>,

    /// Comma separated account prefixes for payables
    #[arg(long)]
    ap_prefix: Option<String>,

    /// Process only this sheet
    #[arg(long)]
    sheet: Option<String>,

    /// JSON object of notes keyed by "{set_id}-{payment_key}"
    #[arg(long)]
    justifications: Option<PathBuf>,

    /// Reference date for ageing, defaults to the local date
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Field delimiter for CSV sheets, sniffed when omitted
    #[arg(long)]
    delimiter: Option<char>,

    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Workbooks: a CSV file, or a directory whose CSV files are its sheets
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn load_config(args: &Args) -> Result<ReconcileConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ReconcileConfig::from_toml(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ReconcileConfig::default(),
    };
    if let Some(tol) = args.tol {
        config.tolerance = tol;
    }
    if let Some(prefix) = &args.ar_prefix {
        config.ar_prefix = prefix.trim().to_string();
    }
    if let Some(list) = &args.ap_prefix {
        config.ap_prefixes = ReconcileConfig::parse_prefixes(list);
    }
    config.validate()?;
    Ok(config)
}

fn load_justifications(path: &Path) -> Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read justifications {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid justifications {}", path.display()))
}

fn print_summary(input: &Path, report: &ReconcileReport) {
    println!("━━━ {} ━━━", input.display());
    if let Some(company) = &report.preamble.company {
        println!("  Company: {company}");
    }
    if let Some(period) = &report.preamble.period {
        println!("  Period:  {period}");
    }
    for sheet in &report.sheets {
        match &sheet.error {
            Some(error) => println!("  Sheet {}: skipped ({error})", sheet.name),
            None => println!(
                "  Sheet {}: {} rows ({} AR, {} AP)",
                sheet.name, sheet.processable_rows, sheet.receivable_rows, sheet.payable_rows
            ),
        }
    }
    for collective in report.collectives() {
        let s = &collective.summary;
        println!(
            "  {}: allocated {}, unallocated {}, {} pending document(s)",
            s.collective.label(),
            s.allocated,
            s.unallocated,
            s.pending_documents
        );
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ledger")
        .to_string()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let today = args.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let notes = match &args.justifications {
        Some(path) => load_justifications(path)?,
        None => HashMap::new(),
    };
    let csv_options = CsvSheetOptions {
        delimiter: args.delimiter.map(|c| c as u8),
    };

    let mut stats = RunStats::new();
    for input in &args.inputs {
        let workbook = read_workbook(input, &csv_options)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let mut report = reconcile_sheets(&workbook, &config, args.sheet.as_deref(), today)
            .with_context(|| format!("Failed to reconcile {}", input.display()))?;

        if !notes.is_empty() {
            let applied: usize = report
                .collectives_mut()
                .map(|c| apply_justifications(&mut c.records, &notes))
                .sum();
            tracing::info!(applied, "Justifications applied");
        }

        print_summary(input, &report);
        for path in output::write_report(&args.output, &stem(input), &report, args.format)? {
            tracing::info!("Wrote {}", path.display());
        }
        stats.record(today, &report);
    }

    tracing::info!(
        reconciliations = stats.total_reconciliations,
        workbooks = stats.total_workbooks,
        rows = stats.total_rows,
        "Run complete"
    );
    Ok(())
}
