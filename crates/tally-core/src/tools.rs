//! Tool-level operations for Tally
//!
//! These are the two operations exposed to agents and the CLI. They take
//! loosely typed parameters (string dates, decimal amounts), validate and
//! convert them, then hand off to the matcher or the reconciler.

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ledger::LedgerBackend;
use crate::matcher::{match_transactions, MatchConfig, MatchResult};
use crate::models::BankTransaction;
use crate::money::checked_milliunits;
use crate::reconcile::{ReconcileConfig, ReconcileRequest, Reconciler, ReconciliationOutcome};

/// Parse a YYYY-MM-DD date
pub fn parse_iso_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidData(format!("Invalid date format: {}. Use YYYY-MM-DD", s)))
}

// =============================================================================
// match_bank_transactions
// =============================================================================

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct BankTransactionInput {
    #[schemars(description = "Transaction date in YYYY-MM-DD format")]
    pub date: String,

    #[schemars(description = "Signed amount in currency units (negative = outflow), e.g. -45.00")]
    pub amount: f64,

    #[schemars(description = "Payee or description as shown on the statement")]
    #[serde(default, alias = "description")]
    pub payee: Option<String>,

    #[schemars(description = "Optional memo")]
    #[serde(default)]
    pub memo: Option<String>,
}

impl BankTransactionInput {
    fn into_bank_transaction(self) -> Result<BankTransaction> {
        Ok(BankTransaction {
            date: parse_iso_date(&self.date)?,
            amount: self.amount,
            payee: self.payee,
            memo: self.memo,
        })
    }
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct MatchBankTransactionsParams {
    #[schemars(description = "Budget id")]
    pub budget_id: String,

    #[schemars(description = "Account the statement belongs to")]
    pub account_id: String,

    #[schemars(description = "Bank statement lines to match")]
    pub bank_transactions: Vec<BankTransactionInput>,

    /// Date tolerance in days (default 3)
    #[schemars(description = "Maximum days between bank and ledger dates (default 3)")]
    #[serde(default)]
    pub tolerance_days: Option<u32>,
}

/// Match a bank statement against the account's ledger transactions
pub async fn match_bank_transactions<L: LedgerBackend + ?Sized>(
    ledger: &L,
    config: &MatchConfig,
    params: MatchBankTransactionsParams,
) -> Result<MatchResult> {
    let bank = params
        .bank_transactions
        .into_iter()
        .map(BankTransactionInput::into_bank_transaction)
        .collect::<Result<Vec<_>>>()?;

    match_statement(
        ledger,
        config,
        &params.budget_id,
        &params.account_id,
        &bank,
        params.tolerance_days,
    )
    .await
}

/// Match already-parsed statement lines against the account's ledger transactions
///
/// Fetches the account's rows from (earliest line - tolerance) and keeps the
/// non-deleted ones dated within the statement window widened by the tolerance.
pub async fn match_statement<L: LedgerBackend + ?Sized>(
    ledger: &L,
    config: &MatchConfig,
    budget_id: &str,
    account_id: &str,
    bank: &[BankTransaction],
    tolerance_days: Option<u32>,
) -> Result<MatchResult> {
    let config = match tolerance_days {
        Some(days) => config.with_tolerance(days),
        None => *config,
    };

    if let Some(tx) = bank.iter().find(|t| checked_milliunits(t.amount).is_none()) {
        return Err(Error::InvalidData(format!(
            "Invalid amount for {}: {}",
            tx.date, tx.amount
        )));
    }

    let window = statement_window(bank, config.date_tolerance_days);
    // A window clamped to the start of the calendar fetches the full history
    let since_date = window
        .map(|(start, _)| start)
        .filter(|start| *start != NaiveDate::MIN);

    let ledger_transactions: Vec<_> = ledger
        .get_account_transactions(budget_id, account_id, since_date)
        .await?
        .into_iter()
        .filter(|t| !t.deleted && t.account_id == account_id)
        .filter(|t| window.map_or(true, |(start, end)| t.date >= start && t.date <= end))
        .collect();

    Ok(match_transactions(bank, &ledger_transactions, &config))
}

/// Date range covered by the statement, widened by the tolerance and clamped
/// to the representable calendar
fn statement_window(
    bank: &[BankTransaction],
    tolerance_days: u32,
) -> Option<(NaiveDate, NaiveDate)> {
    let earliest = bank.iter().map(|t| t.date).min()?;
    let latest = bank.iter().map(|t| t.date).max()?;
    let tolerance = Duration::days(i64::from(tolerance_days));

    let start = earliest.checked_sub_signed(tolerance).unwrap_or(NaiveDate::MIN);
    let end = latest.checked_add_signed(tolerance).unwrap_or(NaiveDate::MAX);
    Some((start, end))
}

// =============================================================================
// reconcile_account_with_adjustment
// =============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ReconcileParams {
    #[schemars(description = "Budget id")]
    pub budget_id: String,

    #[schemars(description = "Account to reconcile")]
    pub account_id: String,

    #[schemars(description = "Statement ending balance in currency units, e.g. 120.00")]
    pub target_balance: f64,

    #[schemars(description = "Statement date in YYYY-MM-DD format")]
    pub reconciliation_date: String,

    #[schemars(description = "Create a balance adjustment when balances differ (default true)")]
    #[serde(default = "default_true")]
    pub create_adjustment: bool,

    #[schemars(description = "Memo for the adjustment transaction")]
    #[serde(default)]
    pub adjustment_memo: Option<String>,

    #[schemars(description = "Report what would change without writing anything")]
    #[serde(default)]
    pub dry_run: bool,
}

impl ReconcileParams {
    pub fn into_request(self) -> Result<ReconcileRequest> {
        let target_balance = checked_milliunits(self.target_balance).ok_or_else(|| {
            Error::InvalidData(format!("Invalid target balance: {}", self.target_balance))
        })?;
        Ok(ReconcileRequest {
            reconciliation_date: parse_iso_date(&self.reconciliation_date)?,
            target_balance,
            budget_id: self.budget_id,
            account_id: self.account_id,
            create_adjustment: self.create_adjustment,
            adjustment_memo: self.adjustment_memo,
            dry_run: self.dry_run,
        })
    }
}

/// Reconcile an account to a statement balance, creating an adjustment if needed
pub async fn reconcile_account_with_adjustment<L: LedgerBackend + ?Sized>(
    ledger: &L,
    config: &ReconcileConfig,
    params: ReconcileParams,
) -> Result<ReconciliationOutcome> {
    let request = params.into_request()?;
    Reconciler::new(ledger, config).reconcile(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::matcher::MatchConfidence;
    use crate::models::{ClearedStatus, LedgerTransaction};

    fn ledger_tx(id: &str, date: &str, amount: i64, payee: &str) -> LedgerTransaction {
        LedgerTransaction {
            id: id.to_string(),
            account_id: "checking".to_string(),
            date: parse_iso_date(date).unwrap(),
            amount,
            payee_id: None,
            payee_name: Some(payee.to_string()),
            category_id: None,
            category_name: None,
            memo: None,
            cleared: ClearedStatus::Uncleared,
            approved: true,
            transfer_account_id: None,
            deleted: false,
        }
    }

    fn bank(date: &str, amount: f64, payee: &str) -> BankTransactionInput {
        BankTransactionInput {
            date: date.to_string(),
            amount,
            payee: Some(payee.to_string()),
            memo: None,
        }
    }

    fn params(lines: Vec<BankTransactionInput>) -> MatchBankTransactionsParams {
        MatchBankTransactionsParams {
            budget_id: "budget".to_string(),
            account_id: "checking".to_string(),
            bank_transactions: lines,
            tolerance_days: None,
        }
    }

    fn ledger() -> MockLedger {
        MockLedger::new()
            .with_account("checking", "Checking", 118_500)
            .with_transactions(vec![
                ledger_tx("acme", "2024-03-01", -45_000, "Acme Store"),
                ledger_tx("old", "2024-01-15", -45_000, "Acme Store"),
                ledger_tx("late", "2024-03-20", -9_990, "Netflix"),
                LedgerTransaction {
                    deleted: true,
                    ..ledger_tx("gone", "2024-03-02", -45_000, "Acme Store")
                },
                LedgerTransaction {
                    account_id: "savings".to_string(),
                    ..ledger_tx("other", "2024-03-01", -45_000, "Acme Store")
                },
            ])
    }

    #[tokio::test]
    async fn test_match_limits_ledger_to_statement_window() {
        let result = match_bank_transactions(
            &ledger(),
            &MatchConfig::default(),
            params(vec![bank("2024-03-01", -45.0, "Acme Store")]),
        )
        .await
        .unwrap();

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].ledger_transaction.id, "acme");
        assert_eq!(result.matched[0].confidence, MatchConfidence::Exact);
        // Old, late, deleted and other-account rows are outside the pool
        assert!(result.unmatched_ledger.is_empty());
        assert_eq!(result.summary.total_ledger, 1);
    }

    #[tokio::test]
    async fn test_tolerance_override_widens_window() {
        let mut p = params(vec![bank("2024-03-15", -9.99, "NETFLIX.COM")]);
        p.tolerance_days = Some(5);

        let result = match_bank_transactions(&ledger(), &MatchConfig::default(), p)
            .await
            .unwrap();
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].ledger_transaction.id, "late");
    }

    #[tokio::test]
    async fn test_empty_statement_uses_full_history() {
        let result = match_bank_transactions(&ledger(), &MatchConfig::default(), params(vec![]))
            .await
            .unwrap();

        assert_eq!(result.summary.match_rate, 0.0);
        assert_eq!(result.unmatched_ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_huge_tolerance_clamps_window() {
        let mut p = params(vec![bank("2024-03-01", -45.0, "Acme Store")]);
        p.tolerance_days = Some(4_000_000_000);

        let result = match_bank_transactions(&ledger(), &MatchConfig::default(), p)
            .await
            .unwrap();

        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].ledger_transaction.id, "acme");
        // Window covers all of history: old and late rows stay unmatched
        assert_eq!(result.summary.total_ledger, 3);
    }

    #[test]
    fn test_statement_window_bounds() {
        let lines = vec![
            BankTransaction::new(parse_iso_date("2024-03-05").unwrap(), -1.0, None),
            BankTransaction::new(parse_iso_date("2024-03-01").unwrap(), -2.0, None),
        ];

        assert_eq!(
            statement_window(&lines, 3),
            Some((
                parse_iso_date("2024-02-27").unwrap(),
                parse_iso_date("2024-03-08").unwrap()
            ))
        );
        assert_eq!(
            statement_window(&lines, u32::MAX),
            Some((NaiveDate::MIN, NaiveDate::MAX))
        );
        assert_eq!(statement_window(&[], 3), None);
    }

    #[tokio::test]
    async fn test_out_of_range_amount_is_invalid_input() {
        let err = match_bank_transactions(
            &ledger(),
            &MatchConfig::default(),
            params(vec![bank("2024-03-01", 1e20, "Acme Store")]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let err = reconcile_account_with_adjustment(
            &ledger(),
            &ReconcileConfig::default(),
            ReconcileParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                target_balance: 1e20,
                reconciliation_date: "2024-03-31".to_string(),
                create_adjustment: true,
                adjustment_memo: None,
                dry_run: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_match_statement_takes_parsed_lines() {
        let lines = vec![BankTransaction::new(
            parse_iso_date("2024-03-02").unwrap(),
            -45.0,
            Some("Acme Store"),
        )];

        let result = match_statement(
            &ledger(),
            &MatchConfig::default(),
            "budget",
            "checking",
            &lines,
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].ledger_transaction.id, "acme");
        assert_eq!(result.matched[0].days_apart, 1);
    }

    #[tokio::test]
    async fn test_invalid_bank_date_is_invalid_input() {
        let err = match_bank_transactions(
            &ledger(),
            &MatchConfig::default(),
            params(vec![bank("03/01/2024", -45.0, "Acme")]),
        )
        .await
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let p: ReconcileParams = serde_json::from_str(
            r#"{"budget_id":"b","account_id":"a","target_balance":120.0,"reconciliation_date":"2024-03-31"}"#,
        )
        .unwrap();
        assert!(p.create_adjustment);
        assert!(!p.dry_run);

        let request = p.into_request().unwrap();
        assert_eq!(request.target_balance, 120_000);
        assert_eq!(request.reconciliation_date, parse_iso_date("2024-03-31").unwrap());

        let m: MatchBankTransactionsParams = serde_json::from_str(
            r#"{"budget_id":"b","account_id":"a","bank_transactions":[{"date":"2024-03-01","amount":-1.5,"description":"X"}]}"#,
        )
        .unwrap();
        assert_eq!(m.bank_transactions[0].payee.as_deref(), Some("X"));
        assert!(m.tolerance_days.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_tool_end_to_end() {
        let ledger = ledger();
        let outcome = reconcile_account_with_adjustment(
            &ledger,
            &ReconcileConfig::default(),
            ReconcileParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                target_balance: 120.0,
                reconciliation_date: "2024-03-31".to_string(),
                create_adjustment: true,
                adjustment_memo: None,
                dry_run: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.adjustment_needed, 1500);
        assert_eq!(outcome.actual_balance, 120_000);
        // acme, old, late; deleted row is skipped
        assert_eq!(outcome.transactions_reconciled, 3);
    }

    #[tokio::test]
    async fn test_reconcile_tool_rejects_bad_date() {
        let err = reconcile_account_with_adjustment(
            &ledger(),
            &ReconcileConfig::default(),
            ReconcileParams {
                budget_id: "budget".to_string(),
                account_id: "checking".to_string(),
                target_balance: 1.0,
                reconciliation_date: "March 31".to_string(),
                create_adjustment: true,
                adjustment_memo: None,
                dry_run: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
