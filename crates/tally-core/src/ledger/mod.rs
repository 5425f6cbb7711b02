//! Ledger service client abstraction
//!
//! The budgeting service owns accounts, transactions, payees and categories.
//! Everything Tally reads or writes goes through this interface.
//!
//! # Architecture
//!
//! - `LedgerBackend` trait: the operations the matcher and reconciler consume
//! - `LedgerClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `YnabBackend` (HTTP), `MockLedger` (in-memory)
//!
//! # Configuration
//!
//! Environment variables:
//! - `LEDGER_BACKEND`: Backend to use (ynab, mock). Default: ynab
//! - `YNAB_ACCESS_TOKEN`: Personal access token (required for ynab backend)
//! - `YNAB_API_URL`: API base URL (default: https://api.ynab.com/v1)

mod mock;
mod ynab;

pub use mock::{MockLedger, MockOperation};
pub use ynab::{YnabBackend, DEFAULT_API_URL};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::TallyConfig;
use crate::error::{Error, Result};
use crate::models::{Account, Category, LedgerTransaction, Payee, StatusUpdate, TransactionDraft};

/// Operations consumed from the remote ledger
///
/// All calls are scoped to one budget. Backends must be Send + Sync so a single
/// client can be shared by concurrent tool invocations.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Fetch one account, including its ledger-computed balance
    async fn get_account(&self, budget_id: &str, account_id: &str) -> Result<Account>;

    /// Fetch the account's transactions, optionally only those on or after `since_date`
    ///
    /// No pagination: the full set is returned.
    async fn get_account_transactions(
        &self,
        budget_id: &str,
        account_id: &str,
        since_date: Option<NaiveDate>,
    ) -> Result<Vec<LedgerTransaction>>;

    /// Set the clearing status of many transactions in one call
    ///
    /// Returns only the transactions that were updated. A result shorter than
    /// `updates` is the only signal of partial failure.
    async fn bulk_update_transaction_status(
        &self,
        budget_id: &str,
        updates: &[StatusUpdate],
    ) -> Result<Vec<LedgerTransaction>>;

    /// Create a single transaction
    async fn create_transaction(
        &self,
        budget_id: &str,
        draft: &TransactionDraft,
    ) -> Result<LedgerTransaction>;

    /// List the budget's payees
    async fn get_payees(&self, budget_id: &str) -> Result<Vec<Payee>>;

    /// List the budget's categories, flattened across groups
    async fn get_categories(&self, budget_id: &str) -> Result<Vec<Category>>;

    /// Base URL or identifier of the backend (for logging)
    fn host(&self) -> &str;
}

/// Concrete ledger client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum LedgerClient {
    /// Budgeting service REST API
    Ynab(YnabBackend),
    /// In-memory ledger for tests and offline use
    Mock(MockLedger),
}

impl LedgerClient {
    /// Create a ledger client using the configured API URL
    ///
    /// `LEDGER_BACKEND=mock` selects an empty in-memory ledger. Otherwise the
    /// access token comes from `YNAB_ACCESS_TOKEN`; it never lives in the
    /// config file.
    pub fn from_config(config: &TallyConfig) -> Result<Self> {
        let backend = std::env::var("LEDGER_BACKEND").unwrap_or_else(|_| "ynab".to_string());
        if backend.eq_ignore_ascii_case("mock") {
            return Ok(LedgerClient::Mock(MockLedger::new()));
        }

        let token = std::env::var("YNAB_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("YNAB_ACCESS_TOKEN is not set".to_string()))?;

        Ok(LedgerClient::Ynab(YnabBackend::new(
            &config.ledger.api_url,
            &token,
        )))
    }

    /// Create a ledger client for the REST API directly
    pub fn ynab(base_url: &str, access_token: &str) -> Self {
        LedgerClient::Ynab(YnabBackend::new(base_url, access_token))
    }

    /// Wrap an in-memory ledger
    pub fn mock(ledger: MockLedger) -> Self {
        LedgerClient::Mock(ledger)
    }
}

// Implement LedgerBackend for LedgerClient by delegating to the inner backend
#[async_trait]
impl LedgerBackend for LedgerClient {
    async fn get_account(&self, budget_id: &str, account_id: &str) -> Result<Account> {
        match self {
            LedgerClient::Ynab(b) => b.get_account(budget_id, account_id).await,
            LedgerClient::Mock(b) => b.get_account(budget_id, account_id).await,
        }
    }

    async fn get_account_transactions(
        &self,
        budget_id: &str,
        account_id: &str,
        since_date: Option<NaiveDate>,
    ) -> Result<Vec<LedgerTransaction>> {
        match self {
            LedgerClient::Ynab(b) => {
                b.get_account_transactions(budget_id, account_id, since_date)
                    .await
            }
            LedgerClient::Mock(b) => {
                b.get_account_transactions(budget_id, account_id, since_date)
                    .await
            }
        }
    }

    async fn bulk_update_transaction_status(
        &self,
        budget_id: &str,
        updates: &[StatusUpdate],
    ) -> Result<Vec<LedgerTransaction>> {
        match self {
            LedgerClient::Ynab(b) => b.bulk_update_transaction_status(budget_id, updates).await,
            LedgerClient::Mock(b) => b.bulk_update_transaction_status(budget_id, updates).await,
        }
    }

    async fn create_transaction(
        &self,
        budget_id: &str,
        draft: &TransactionDraft,
    ) -> Result<LedgerTransaction> {
        match self {
            LedgerClient::Ynab(b) => b.create_transaction(budget_id, draft).await,
            LedgerClient::Mock(b) => b.create_transaction(budget_id, draft).await,
        }
    }

    async fn get_payees(&self, budget_id: &str) -> Result<Vec<Payee>> {
        match self {
            LedgerClient::Ynab(b) => b.get_payees(budget_id).await,
            LedgerClient::Mock(b) => b.get_payees(budget_id).await,
        }
    }

    async fn get_categories(&self, budget_id: &str) -> Result<Vec<Category>> {
        match self {
            LedgerClient::Ynab(b) => b.get_categories(budget_id).await,
            LedgerClient::Mock(b) => b.get_categories(budget_id).await,
        }
    }

    fn host(&self) -> &str {
        match self {
            LedgerClient::Ynab(b) => b.host(),
            LedgerClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClearedStatus;

    #[test]
    fn test_ledger_client_mock_host() {
        let client = LedgerClient::mock(MockLedger::new());
        assert_eq!(client.host(), "mock://ledger");
    }

    #[test]
    fn test_ynab_client_trims_trailing_slash() {
        let client = LedgerClient::ynab("http://localhost:9999/v1/", "token");
        assert_eq!(client.host(), "http://localhost:9999/v1");
    }

    #[tokio::test]
    async fn test_client_delegates_to_mock() {
        let ledger = MockLedger::new().with_account("checking", "Checking", 10_000);
        let client = LedgerClient::mock(ledger.clone());

        let account = client.get_account("budget", "checking").await.unwrap();
        assert_eq!(account.balance, 10_000);

        let updated = client
            .bulk_update_transaction_status(
                "budget",
                &[StatusUpdate {
                    id: "missing".into(),
                    cleared: ClearedStatus::Reconciled,
                }],
            )
            .await
            .unwrap();
        assert!(updated.is_empty());
        assert_eq!(ledger.bulk_update_calls(), 1);
    }
}
