//! Budgeting service REST backend
//!
//! Thin HTTP client for the ledger endpoints Tally needs. Every successful
//! response is wrapped as `{"data": {...}}`; every error as
//! `{"error": {"id", "name", "detail"}}`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Account, Category, LedgerTransaction, Payee, StatusUpdate, TransactionDraft};

use super::LedgerBackend;

/// Public API base URL
pub const DEFAULT_API_URL: &str = "https://api.ynab.com/v1";

/// REST backend for the budgeting service
#[derive(Clone)]
pub struct YnabBackend {
    http_client: Client,
    base_url: String,
    access_token: String,
}

impl YnabBackend {
    /// Create a new backend
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("YNAB_ACCESS_TOKEN").ok()?;
        let url = std::env::var("YNAB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Some(Self::new(&url, &token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and unwrap the `data` envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let detail = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.detail,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(Error::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<LedgerTransaction>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    transaction: LedgerTransaction,
}

#[derive(Debug, Deserialize)]
struct PayeesData {
    payees: Vec<Payee>,
}

#[derive(Debug, Deserialize)]
struct CategoriesData {
    category_groups: Vec<CategoryGroup>,
}

#[derive(Debug, Deserialize)]
struct CategoryGroup {
    name: String,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
struct BulkUpdateRequest<'a> {
    transactions: &'a [StatusUpdate],
}

#[derive(Debug, Serialize)]
struct CreateTransactionRequest<'a> {
    transaction: &'a TransactionDraft,
}

#[async_trait]
impl LedgerBackend for YnabBackend {
    async fn get_account(&self, budget_id: &str, account_id: &str) -> Result<Account> {
        let request = self
            .http_client
            .get(self.url(&format!("/budgets/{}/accounts/{}", budget_id, account_id)));

        match self.send::<AccountData>(request).await {
            Ok(data) => Ok(data.account),
            Err(Error::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Err(
                Error::NotFound(format!("Account {} in budget {}", account_id, budget_id)),
            ),
            Err(e) => Err(e),
        }
    }

    async fn get_account_transactions(
        &self,
        budget_id: &str,
        account_id: &str,
        since_date: Option<NaiveDate>,
    ) -> Result<Vec<LedgerTransaction>> {
        let mut request = self.http_client.get(self.url(&format!(
            "/budgets/{}/accounts/{}/transactions",
            budget_id, account_id
        )));
        if let Some(since) = since_date {
            request = request.query(&[("since_date", since.format("%Y-%m-%d").to_string())]);
        }

        let data: TransactionsData = self.send(request).await?;
        debug!(
            account_id,
            count = data.transactions.len(),
            "Fetched account transactions"
        );
        Ok(data.transactions)
    }

    async fn bulk_update_transaction_status(
        &self,
        budget_id: &str,
        updates: &[StatusUpdate],
    ) -> Result<Vec<LedgerTransaction>> {
        let request = self
            .http_client
            .patch(self.url(&format!("/budgets/{}/transactions", budget_id)))
            .json(&BulkUpdateRequest {
                transactions: updates,
            });

        let data: TransactionsData = self.send(request).await?;
        debug!(
            requested = updates.len(),
            updated = data.transactions.len(),
            "Bulk status update"
        );
        Ok(data.transactions)
    }

    async fn create_transaction(
        &self,
        budget_id: &str,
        draft: &TransactionDraft,
    ) -> Result<LedgerTransaction> {
        let request = self
            .http_client
            .post(self.url(&format!("/budgets/{}/transactions", budget_id)))
            .json(&CreateTransactionRequest { transaction: draft });

        let data: TransactionData = self.send(request).await?;
        debug!(id = %data.transaction.id, amount = draft.amount, "Created transaction");
        Ok(data.transaction)
    }

    async fn get_payees(&self, budget_id: &str) -> Result<Vec<Payee>> {
        let request = self
            .http_client
            .get(self.url(&format!("/budgets/{}/payees", budget_id)));
        let data: PayeesData = self.send(request).await?;
        Ok(data.payees)
    }

    async fn get_categories(&self, budget_id: &str) -> Result<Vec<Category>> {
        let request = self
            .http_client
            .get(self.url(&format!("/budgets/{}/categories", budget_id)));
        let data: CategoriesData = self.send(request).await?;

        let categories = data
            .category_groups
            .into_iter()
            .filter(|group| !group.deleted)
            .flat_map(|group| {
                let group_name = group.name;
                group.categories.into_iter().map(move |mut category| {
                    if category.category_group_name.is_none() {
                        category.category_group_name = Some(group_name.clone());
                    }
                    category
                })
            })
            .collect();

        Ok(categories)
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClearedStatus;
    use crate::test_utils::MockLedgerServer;

    #[test]
    fn test_from_env_requires_token() {
        // Only meaningful when the variable is absent in the test environment
        if std::env::var("YNAB_ACCESS_TOKEN").is_err() {
            assert!(YnabBackend::from_env().is_none());
        }
    }

    #[tokio::test]
    async fn test_get_account_over_http() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "test-token");

        let account = backend.get_account("budget-1", "checking").await.unwrap();
        assert_eq!(account.name, "Checking");
        assert_eq!(account.balance, 118_500);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "test-token");

        let err = backend.get_account("budget-1", "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_token_is_api_error() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "");

        let err = backend.get_payees("budget-1").await.unwrap_err();
        match err {
            Error::Api { status, detail } => {
                assert_eq!(status, 401);
                assert!(detail.contains("Unauthorized"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transactions_since_date_filter() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "test-token");

        let all = backend
            .get_account_transactions("budget-1", "checking", None)
            .await
            .unwrap();
        let recent = backend
            .get_account_transactions(
                "budget-1",
                "checking",
                NaiveDate::from_ymd_opt(2024, 3, 2),
            )
            .await
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|t| t.date >= NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
    }

    #[tokio::test]
    async fn test_bulk_update_and_create_over_http() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "test-token");

        let updated = backend
            .bulk_update_transaction_status(
                "budget-1",
                &[
                    StatusUpdate {
                        id: "t1".into(),
                        cleared: ClearedStatus::Reconciled,
                    },
                    StatusUpdate {
                        id: "ghost".into(),
                        cleared: ClearedStatus::Reconciled,
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].cleared, ClearedStatus::Reconciled);

        let created = backend
            .create_transaction(
                "budget-1",
                &TransactionDraft {
                    account_id: "checking".into(),
                    date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                    amount: 1500,
                    payee_id: None,
                    payee_name: Some("Reconciliation Balance Adjustment".into()),
                    category_id: None,
                    memo: Some("adjust".into()),
                    cleared: ClearedStatus::Reconciled,
                    approved: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.amount, 1500);
        assert_eq!(
            created.payee_name.as_deref(),
            Some("Reconciliation Balance Adjustment")
        );
    }

    #[tokio::test]
    async fn test_categories_are_flattened_with_group_names() {
        let server = MockLedgerServer::start().await;
        let backend = YnabBackend::new(&server.url(), "test-token");

        let categories = backend.get_categories("budget-1").await.unwrap();
        let inflow = categories
            .iter()
            .find(|c| c.name == "Inflow: Ready to Assign")
            .unwrap();
        assert_eq!(
            inflow.category_group_name.as_deref(),
            Some("Internal Master Category")
        );
        assert!(categories.iter().any(|c| c.name == "Groceries"));
    }
}
