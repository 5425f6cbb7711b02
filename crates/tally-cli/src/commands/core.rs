//! Shared command utilities
//!
//! - `load_config` - Resolve configuration (file, defaults, environment)
//! - `open_ledger` - Build the ledger client from config and environment
//! - `read_statement` - Load a bank statement file

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    parse_statement_csv, parse_statement_json, BankTransaction, LedgerBackend, LedgerClient,
    TallyConfig,
};
use tracing::debug;

pub fn load_config(path: Option<&Path>) -> Result<TallyConfig> {
    let config = TallyConfig::load(path).context("Failed to load configuration")?;
    match &config.source {
        Some(source) => debug!("Loaded config from {}", source.display()),
        None => debug!("Using built-in config defaults"),
    }
    Ok(config)
}

/// Create the ledger client (requires YNAB_ACCESS_TOKEN unless LEDGER_BACKEND=mock)
pub fn open_ledger(config: &TallyConfig) -> Result<LedgerClient> {
    let ledger = LedgerClient::from_config(config)
        .context("Failed to set up ledger client (set YNAB_ACCESS_TOKEN)")?;
    debug!(host = %ledger.host(), "Ledger client ready");
    Ok(ledger)
}

/// Read a statement file; `.json` is parsed as JSON, anything else as CSV
pub fn read_statement(path: &Path) -> Result<Vec<BankTransaction>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let transactions = if is_json {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_statement_json(&content)
    } else {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        parse_statement_csv(file)
    }
    .with_context(|| format!("Failed to parse statement {}", path.display()))?;

    Ok(transactions)
}
