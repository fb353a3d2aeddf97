use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(String),
    #[error("Tolerance must not be negative: {0}")]
    NegativeTolerance(Decimal),
    #[error("Receivables prefix must not be empty")]
    EmptyReceivablesPrefix,
    #[error("At least one payables prefix is required")]
    NoPayablesPrefix,
    #[error("Header scan needs at least one row")]
    NoHeaderRows,
}

/// Tuning knobs for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Residuals and differences at or below this are treated as zero.
    pub tolerance: Decimal,
    pub ar_prefix: String,
    pub ap_prefixes: Vec<String>,
    /// How many of the most recent open invoices the pair/triple search looks at.
    pub max_combination_candidates: usize,
    /// Unallocated payments below this are diagnosed as bank fees.
    pub small_amount_threshold: Decimal,
    /// Feed earlier payment amounts to the suggestion engine.
    pub suggest_from_history: bool,
    pub header_scan_rows: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
            ar_prefix: "43".to_string(),
            ap_prefixes: vec!["40".to_string(), "41".to_string()],
            max_combination_candidates: 40,
            small_amount_threshold: Decimal::from(50),
            suggest_from_history: false,
            header_scan_rows: 30,
        }
    }
}

impl ReconcileConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ReconcileConfig =
            toml::from_str(toml_content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance.is_sign_negative() && !self.tolerance.is_zero() {
            return Err(ConfigError::NegativeTolerance(self.tolerance));
        }
        if self.ar_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyReceivablesPrefix);
        }
        if self.ap_prefixes.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::NoPayablesPrefix);
        }
        if self.header_scan_rows == 0 {
            return Err(ConfigError::NoHeaderRows);
        }
        Ok(())
    }

    /// Splits a comma separated prefix list such as `"40,41"`.
    pub fn parse_prefixes(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn tolerance(&self) -> Money {
        Money::new(self.tolerance)
    }
}
