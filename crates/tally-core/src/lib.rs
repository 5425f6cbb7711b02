//! Tally Core Library
//!
//! Bank statement reconciliation against a budgeting ledger:
//! - Milliunit conversion between decimal currency and ledger amounts
//! - Pluggable ledger backends (REST API, in-memory mock)
//! - Greedy bank-to-ledger transaction matcher with confidence tiers
//! - Reconcile-with-adjustment workflow with per-step warnings
//! - Bank statement CSV/JSON import
//! - Tool-level operations shared by the CLI and MCP server

pub mod config;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod money;
pub mod reconcile;
pub mod statement;
pub mod tools;

/// Test utilities including mock ledger server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::TallyConfig;
pub use error::{Error, Result};
pub use ledger::{LedgerBackend, LedgerClient, MockLedger, MockOperation, YnabBackend};
pub use matcher::{
    match_transactions, payee_similarity, MatchCandidate, MatchConfidence, MatchConfig,
    MatchResult, MatchSummary,
};
pub use models::{
    Account, BankTransaction, Category, ClearedStatus, LedgerTransaction, Payee, StatusUpdate,
    TransactionDraft,
};
pub use money::{checked_milliunits, format_milliunits, from_milliunits, to_milliunits};
pub use reconcile::{ReconcileConfig, ReconcileRequest, Reconciler, ReconciliationOutcome};
pub use statement::{parse_statement_csv, parse_statement_json};
pub use tools::{
    match_bank_transactions, match_statement, reconcile_account_with_adjustment,
    BankTransactionInput, MatchBankTransactionsParams, ReconcileParams,
};
