//! Test utilities for tally-core
//!
//! Provides a mock ledger HTTP server that speaks the budgeting service's REST
//! shapes, so the HTTP backend can be exercised end to end without network
//! access.
//!
//! Fixture data (budget `budget-1`):
//! - account `checking` ("Checking", balance 118.50)
//! - three checking transactions dated 2024-03-01, 2024-03-05, 2024-03-10
//! - one payee and the inflow/groceries categories

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::models::{ClearedStatus, LedgerTransaction, StatusUpdate, TransactionDraft};

/// Mock budgeting service for tests and development
pub struct MockLedgerServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ServerState {
    transactions: Arc<Mutex<Vec<LedgerTransaction>>>,
    balance: Arc<Mutex<i64>>,
}

impl MockLedgerServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = ServerState {
            transactions: Arc::new(Mutex::new(fixture_transactions())),
            balance: Arc::new(Mutex::new(118_500)),
        };

        let app = Router::new()
            .route("/budgets/:budget_id/accounts/:account_id", get(handle_account))
            .route(
                "/budgets/:budget_id/accounts/:account_id/transactions",
                get(handle_account_transactions),
            )
            .route(
                "/budgets/:budget_id/transactions",
                axum::routing::patch(handle_bulk_update).post(handle_create),
            )
            .route("/budgets/:budget_id/payees", get(handle_payees))
            .route("/budgets/:budget_id/categories", get(handle_categories))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLedgerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fixture_transactions() -> Vec<LedgerTransaction> {
    let tx = |id: &str, day: u32, amount: i64, payee: &str, cleared| LedgerTransaction {
        id: id.to_string(),
        account_id: "checking".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        amount,
        payee_id: None,
        payee_name: Some(payee.to_string()),
        category_id: None,
        category_name: None,
        memo: None,
        cleared,
        approved: true,
        transfer_account_id: None,
        deleted: false,
    };

    vec![
        tx("t1", 1, -45_000, "Acme Store", ClearedStatus::Uncleared),
        tx("t2", 5, -12_340, "Corner Coffee", ClearedStatus::Cleared),
        tx("t3", 10, 250_000, "Payroll", ClearedStatus::Reconciled),
    ]
}

/// Error in the service's envelope shape
struct ApiFailure(StatusCode, &'static str);

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "id": self.0.as_u16().to_string(),
                "name": self.1.to_lowercase().replace(' ', "_"),
                "detail": self.1,
            }
        });
        (self.0, Json(body)).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiFailure>;

fn authorize(headers: &HeaderMap) -> std::result::Result<(), ApiFailure> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer"))
        .map(str::trim)
        .unwrap_or("");
    if token.is_empty() {
        return Err(ApiFailure(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    Ok(())
}

fn check_budget(budget_id: &str) -> std::result::Result<(), ApiFailure> {
    if budget_id != "budget-1" {
        return Err(ApiFailure(StatusCode::NOT_FOUND, "Resource not found"));
    }
    Ok(())
}

async fn handle_account(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((budget_id, account_id)): Path<(String, String)>,
) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;
    if account_id != "checking" {
        return Err(ApiFailure(StatusCode::NOT_FOUND, "Resource not found"));
    }

    let balance = *state
        .balance
        .lock()
        .map_err(|_| ApiFailure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))?;

    Ok(Json(json!({
        "data": {
            "account": {
                "id": "checking",
                "name": "Checking",
                "type": "checking",
                "on_budget": true,
                "closed": false,
                "balance": balance,
                "cleared_balance": balance,
                "uncleared_balance": 0,
                "deleted": false
            }
        }
    })))
}

#[derive(Deserialize)]
struct SinceQuery {
    since_date: Option<NaiveDate>,
}

async fn handle_account_transactions(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((budget_id, account_id)): Path<(String, String)>,
    Query(query): Query<SinceQuery>,
) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;

    let transactions = state
        .transactions
        .lock()
        .map_err(|_| ApiFailure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))?;
    let selected: Vec<&LedgerTransaction> = transactions
        .iter()
        .filter(|t| t.account_id == account_id)
        .filter(|t| query.since_date.map_or(true, |since| t.date >= since))
        .collect();

    Ok(Json(json!({
        "data": { "transactions": selected, "server_knowledge": 1 }
    })))
}

#[derive(Deserialize)]
struct BulkUpdateBody {
    transactions: Vec<StatusUpdate>,
}

async fn handle_bulk_update(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(budget_id): Path<String>,
    Json(body): Json<BulkUpdateBody>,
) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;

    let mut transactions = state
        .transactions
        .lock()
        .map_err(|_| ApiFailure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))?;

    let mut updated = Vec::new();
    for update in &body.transactions {
        if let Some(tx) = transactions.iter_mut().find(|t| t.id == update.id) {
            tx.cleared = update.cleared;
            updated.push(tx.clone());
        }
    }

    Ok(Json(json!({
        "data": {
            "transaction_ids": updated.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
            "transactions": updated
        }
    })))
}

#[derive(Deserialize)]
struct CreateBody {
    transaction: TransactionDraft,
}

async fn handle_create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(budget_id): Path<String>,
    Json(body): Json<CreateBody>,
) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;

    let draft = body.transaction;
    let mut transactions = state
        .transactions
        .lock()
        .map_err(|_| ApiFailure(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))?;

    let created = LedgerTransaction {
        id: format!("t{}", transactions.len() + 1),
        account_id: draft.account_id,
        date: draft.date,
        amount: draft.amount,
        payee_id: draft.payee_id,
        payee_name: draft.payee_name,
        category_id: draft.category_id,
        category_name: None,
        memo: draft.memo,
        cleared: draft.cleared,
        approved: draft.approved,
        transfer_account_id: None,
        deleted: false,
    };
    transactions.push(created.clone());

    if let Ok(mut balance) = state.balance.lock() {
        *balance += created.amount;
    }

    Ok(Json(json!({ "data": { "transaction": created } })))
}

async fn handle_payees(headers: HeaderMap, Path(budget_id): Path<String>) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;

    Ok(Json(json!({
        "data": {
            "payees": [
                { "id": "payee-adjust", "name": "Reconciliation Balance Adjustment", "deleted": false },
                { "id": "payee-acme", "name": "Acme Store", "deleted": false }
            ]
        }
    })))
}

async fn handle_categories(headers: HeaderMap, Path(budget_id): Path<String>) -> ApiResult {
    authorize(&headers)?;
    check_budget(&budget_id)?;

    Ok(Json(json!({
        "data": {
            "category_groups": [
                {
                    "id": "group-internal",
                    "name": "Internal Master Category",
                    "hidden": false,
                    "deleted": false,
                    "categories": [
                        { "id": "cat-inflow", "name": "Inflow: Ready to Assign", "hidden": false, "deleted": false }
                    ]
                },
                {
                    "id": "group-everyday",
                    "name": "Everyday",
                    "hidden": false,
                    "deleted": false,
                    "categories": [
                        { "id": "cat-groceries", "name": "Groceries", "hidden": false, "deleted": false }
                    ]
                },
                {
                    "id": "group-old",
                    "name": "Retired",
                    "hidden": true,
                    "deleted": true,
                    "categories": [
                        { "id": "cat-old", "name": "Old Stuff", "hidden": true, "deleted": false }
                    ]
                }
            ]
        }
    })))
}
