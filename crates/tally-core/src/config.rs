//! Tally configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path (`--config`), else the override in the data dir
//!    (~/.local/share/tally/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Environment variables are applied last:
//! - `YNAB_API_URL`: ledger API base URL
//! - `TALLY_ADJUSTMENT_PAYEE_ID`: id of the balance adjustment payee
//! - `TALLY_INFLOW_CATEGORY_ID`: id of the inflow category

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ledger::DEFAULT_API_URL;
use crate::matcher::MatchConfig;
use crate::reconcile::ReconcileConfig;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub api_url: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TallyConfig {
    pub ledger: LedgerSettings,
    pub matching: MatchConfig,
    pub reconcile: ReconcileConfig,
    /// File the config was read from; None for embedded defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl TallyConfig {
    /// Load configuration, then apply environment overrides
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = load_config(explicit_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("YNAB_API_URL") {
            self.ledger.api_url = url;
        }
        if let Some(id) = get("TALLY_ADJUSTMENT_PAYEE_ID") {
            self.reconcile.adjustment_payee_id = Some(id);
        }
        if let Some(id) = get("TALLY_INFLOW_CATEGORY_ID") {
            self.reconcile.inflow_category_id = Some(id);
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

/// Load configuration (explicit path, then override, then default)
fn load_config(explicit_path: Option<&Path>) -> Result<TallyConfig> {
    let (content, source) = if let Some(path) = explicit_path {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        (content, Some(path.to_path_buf()))
    } else {
        match default_config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                (content, Some(path))
            }
            _ => (DEFAULT_CONFIG.to_string(), None),
        }
    };

    let mut config = parse_config(&content)?;
    config.source = source;
    Ok(config)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    ledger: Option<RawLedger>,
    matching: Option<RawMatching>,
    reconcile: Option<RawReconcile>,
}

#[derive(Debug, Deserialize)]
struct RawLedger {
    api_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMatching {
    date_tolerance_days: Option<u32>,
    amount_slack: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawReconcile {
    adjustment_payee_id: Option<String>,
    adjustment_payee_name: Option<String>,
    inflow_category_id: Option<String>,
    default_memo: Option<String>,
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<TallyConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = TallyConfig::default();

    if let Some(ledger) = raw.ledger {
        if let Some(url) = ledger.api_url {
            config.ledger.api_url = url;
        }
    }

    if let Some(matching) = raw.matching {
        if let Some(days) = matching.date_tolerance_days {
            config.matching.date_tolerance_days = days;
        }
        if let Some(slack) = matching.amount_slack {
            if slack < 0 {
                return Err(Error::Config(format!(
                    "matching.amount_slack must be non-negative, got {}",
                    slack
                )));
            }
            config.matching.amount_slack = slack;
        }
    }

    if let Some(reconcile) = raw.reconcile {
        config.reconcile.adjustment_payee_id = non_empty(reconcile.adjustment_payee_id);
        config.reconcile.inflow_category_id = non_empty(reconcile.inflow_category_id);
        if let Some(name) = non_empty(reconcile.adjustment_payee_name) {
            config.reconcile.adjustment_payee_name = name;
        }
        if let Some(memo) = non_empty(reconcile.default_memo) {
            config.reconcile.default_memo = memo;
        }
    }

    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
