//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use tally_core::{
    tools, LedgerBackend, MatchBankTransactionsParams, MatchResult, ReconcileParams,
    ReconciliationOutcome,
};

use crate::{AppError, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger: String,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ledger: state.ledger.host().to_string(),
    })
}

/// POST /api/match - Match a bank statement against an account
pub async fn match_transactions(
    State(state): State<Arc<AppState>>,
    Json(params): Json<MatchBankTransactionsParams>,
) -> Result<Json<MatchResult>, AppError> {
    let account_id = params.account_id.clone();
    let result =
        tools::match_bank_transactions(&state.ledger, &state.config.matching, params).await?;

    info!(
        account_id = %account_id,
        matched = result.summary.matched,
        unmatched_bank = result.summary.unmatched_bank,
        "Matched statement"
    );
    Ok(Json(result))
}

/// POST /api/reconcile - Reconcile an account to a statement balance
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ReconcileParams>,
) -> Result<Json<ReconciliationOutcome>, AppError> {
    let outcome =
        tools::reconcile_account_with_adjustment(&state.ledger, &state.config.reconcile, params)
            .await?;

    info!(
        account_id = %outcome.account_id,
        reconciled = outcome.transactions_reconciled,
        adjustment = outcome.adjustment_needed,
        warnings = outcome.warnings.len(),
        "Reconciled account"
    );
    Ok(Json(outcome))
}
