//! MCP (Model Context Protocol) Server for Tally
//!
//! Exposes statement matching and account reconciliation to agents as MCP
//! tools. Unlike the read-only query tools of a reporting server, the
//! reconcile tool writes to the ledger (status updates and one adjustment
//! transaction) unless `dry_run` is set.
//!
//! # Available Tools
//!
//! - `match_bank_transactions` - Pair statement lines with ledger transactions
//! - `reconcile_account_with_adjustment` - Mark reconciled and fix the balance

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    },
    ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use tracing::info;

use tally_core::{tools, LedgerClient, MatchBankTransactionsParams, ReconcileParams, TallyConfig};

/// Tally MCP Server state
#[derive(Clone)]
pub struct TallyMcpServer {
    ledger: LedgerClient,
    config: Arc<TallyConfig>,
    /// Tool router for MCP operations
    tool_router: ToolRouter<Self>,
}

impl TallyMcpServer {
    pub fn new(ledger: LedgerClient, config: TallyConfig) -> Self {
        Self {
            ledger,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_handler]
impl ServerHandler for TallyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tally".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Tally Statement Reconciliation".to_string()),
                website_url: Some("https://github.com/heskew/tally".to_string()),
                icons: None,
            },
            instructions: Some(
                "Tally reconciles a budget account against a bank statement. \
                 Use match_bank_transactions to see which statement lines are already in the \
                 ledger, then reconcile_account_with_adjustment with the statement's ending \
                 balance. Amounts are in currency units; dates are YYYY-MM-DD."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl TallyMcpServer {
    /// Match bank statement lines against the account's ledger transactions
    #[tool(
        description = "Match bank statement transactions against ledger transactions for one account. Returns matched pairs with confidence (exact/high/medium/low) and reasons, plus unmatched transactions on each side."
    )]
    async fn match_bank_transactions(
        &self,
        Parameters(params): Parameters<MatchBankTransactionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = tools::match_bank_transactions(&self.ledger, &self.config.matching, params)
            .await
            .map_err(to_mcp_error)?;
        info!(matched = result.summary.matched, "match_bank_transactions");
        json_result(&result)
    }

    /// Reconcile an account to a statement balance
    #[tool(
        description = "Mark all transactions up to the statement date as reconciled, compare the ledger balance with the statement balance, and create a balance adjustment transaction if they differ. Non-fatal problems are returned as warnings."
    )]
    async fn reconcile_account_with_adjustment(
        &self,
        Parameters(params): Parameters<ReconcileParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome =
            tools::reconcile_account_with_adjustment(&self.ledger, &self.config.reconcile, params)
                .await
                .map_err(to_mcp_error)?;
        info!(
            account_id = %outcome.account_id,
            adjustment = outcome.adjustment_needed,
            "reconcile_account_with_adjustment"
        );
        json_result(&outcome)
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Caller mistakes (bad dates, unknown ids) are invalid params; the rest are internal
fn to_mcp_error(err: tally_core::Error) -> McpError {
    if err.is_invalid_input() || matches!(err, tally_core::Error::NotFound(_)) {
        McpError::invalid_params(err.to_string(), None)
    } else {
        McpError::internal_error(err.to_string(), None)
    }
}

/// Streamable HTTP service for mounting at `/mcp`
pub fn mcp_service(
    ledger: LedgerClient,
    config: TallyConfig,
) -> StreamableHttpService<TallyMcpServer, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(TallyMcpServer::new(ledger.clone(), config.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;
    use tally_core::{
        BankTransactionInput, ClearedStatus, LedgerTransaction, MockLedger,
    };

    fn server(ledger: MockLedger) -> TallyMcpServer {
        TallyMcpServer::new(LedgerClient::mock(ledger), TallyConfig::default())
    }

    fn ledger() -> MockLedger {
        MockLedger::new()
            .with_account("checking", "Checking", 118_500)
            .with_transactions(vec![LedgerTransaction {
                id: "t1".to_string(),
                account_id: "checking".to_string(),
                date: tools::parse_iso_date("2024-03-01").unwrap(),
                amount: -45_000,
                payee_id: None,
                payee_name: Some("Acme Store".to_string()),
                category_id: None,
                category_name: None,
                memo: None,
                cleared: ClearedStatus::Uncleared,
                approved: true,
                transfer_account_id: None,
                deleted: false,
            }])
    }

    fn text(result: &CallToolResult) -> serde_json::Value {
        let text = result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_server_info() {
        let info = server(MockLedger::new()).get_info();
        assert_eq!(info.server_info.name, "tally");
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn test_match_tool() {
        let result = server(ledger())
            .match_bank_transactions(Parameters(MatchBankTransactionsParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                bank_transactions: vec![BankTransactionInput {
                    date: "2024-03-01".to_string(),
                    amount: -45.0,
                    payee: Some("Acme Store".to_string()),
                    memo: None,
                }],
                tolerance_days: None,
            }))
            .await
            .unwrap();

        let json = text(&result);
        assert_eq!(json["summary"]["matched"], 1);
        assert_eq!(json["matched"][0]["confidence"], "exact");
    }

    #[tokio::test]
    async fn test_reconcile_tool_writes_adjustment() {
        let ledger = ledger();
        let result = server(ledger.clone())
            .reconcile_account_with_adjustment(Parameters(ReconcileParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                target_balance: 120.0,
                reconciliation_date: "2024-03-31".to_string(),
                create_adjustment: true,
                adjustment_memo: None,
                dry_run: false,
            }))
            .await
            .unwrap();

        let json = text(&result);
        assert_eq!(json["adjustment_needed"], 1500);
        assert_eq!(json["adjustment_created"], true);
        assert_eq!(ledger.created().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_account_is_invalid_params() {
        let err = server(MockLedger::new())
            .reconcile_account_with_adjustment(Parameters(ReconcileParams {
                budget_id: "budget".to_string(),
                account_id: "missing".to_string(),
                target_balance: 0.0,
                reconciliation_date: "2024-03-31".to_string(),
                create_adjustment: true,
                adjustment_memo: None,
                dry_run: false,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_internal_error() {
        let ledger = ledger().failing(tally_core::MockOperation::GetTransactions);
        let err = server(ledger)
            .match_bank_transactions(Parameters(MatchBankTransactionsParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                bank_transactions: vec![],
                tolerance_days: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }
}
