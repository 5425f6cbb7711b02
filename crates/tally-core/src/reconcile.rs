//! Account reconciliation with balance adjustment
//!
//! Brings one account's reconciled status and balance into agreement with a
//! bank statement. One invocation walks these stages in order:
//!
//! ```text
//! Start -> TransactionsFetched -> TransactionsMarkedReconciled
//!       -> BalanceRecomputed -> AdjustmentEvaluated -> Done
//! ```
//!
//! Only the first two can fail the whole run (unknown account, transaction
//! fetch failure). Every later stage degrades to a warning on the outcome so a
//! partial run still reports what happened.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ledger::LedgerBackend;
use crate::models::{Account, ClearedStatus, LedgerTransaction, StatusUpdate, TransactionDraft};
use crate::money::{format_milliunits, MAX_AMOUNT_MILLIUNITS};

/// Category names the ledger uses for unassigned inflow, newest first
pub const INFLOW_CATEGORY_NAMES: &[&str] = &["Inflow: Ready to Assign", "To be Budgeted"];

/// Ledger-specific ids and defaults injected into the reconciler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileConfig {
    /// Id of the budget's balance adjustment payee, if known
    pub adjustment_payee_id: Option<String>,
    /// Payee name used when the id is unset or cannot be found
    pub adjustment_payee_name: String,
    /// Id of the inflow category; resolved by name when unset
    pub inflow_category_id: Option<String>,
    /// Memo used when the caller supplies none
    pub default_memo: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            adjustment_payee_id: None,
            adjustment_payee_name: "Reconciliation Balance Adjustment".to_string(),
            inflow_category_id: None,
            default_memo: "Balance adjustment to match bank statement".to_string(),
        }
    }
}

/// One reconciliation request
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub budget_id: String,
    pub account_id: String,
    /// Statement balance in milliunits
    pub target_balance: i64,
    pub reconciliation_date: NaiveDate,
    pub create_adjustment: bool,
    pub adjustment_memo: Option<String>,
    /// Compute everything but write nothing
    pub dry_run: bool,
}

/// What a reconciliation run did
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub account_id: String,
    pub account_name: String,
    pub reconciliation_date: NaiveDate,
    /// Balance before anything was marked (milliunits)
    pub starting_balance: i64,
    pub target_balance: i64,
    /// Balance after marking, plus the adjustment if one was created
    pub actual_balance: i64,
    pub transactions_reconciled: usize,
    /// `target_balance - balance after marking`; zero when they agree
    pub adjustment_needed: i64,
    pub adjustment_created: bool,
    pub adjustment_transaction_id: Option<String>,
    pub dry_run: bool,
    pub warnings: Vec<String>,
}

impl ReconciliationOutcome {
    pub fn is_balanced(&self) -> bool {
        self.actual_balance == self.target_balance
    }
}

/// Workflow stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReconcileStage {
    Start,
    TransactionsFetched,
    TransactionsMarkedReconciled,
    BalanceRecomputed,
    AdjustmentEvaluated,
    Done,
}

/// Warning accumulator shared by the best-effort stages
#[derive(Debug, Default)]
struct Warnings(Vec<String>);

impl Warnings {
    fn push(&mut self, stage: ReconcileStage, message: String) {
        warn!(?stage, "{}", message);
        self.0.push(message);
    }
}

/// Outcome of a best-effort stage: the value, or a warning explaining why not
type StepResult<T> = std::result::Result<T, String>;

struct MarkResult {
    requested: usize,
    updated: usize,
}

/// Runs reconciliations against a ledger
pub struct Reconciler<'a, L: LedgerBackend + ?Sized> {
    ledger: &'a L,
    config: &'a ReconcileConfig,
}

impl<'a, L: LedgerBackend + ?Sized> Reconciler<'a, L> {
    pub fn new(ledger: &'a L, config: &'a ReconcileConfig) -> Self {
        Self { ledger, config }
    }

    /// Reconcile one account against a statement balance
    ///
    /// Fails only when the target is out of range, the account cannot be
    /// resolved, or its transactions cannot be fetched.
    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<ReconciliationOutcome> {
        let budget_id = request.budget_id.as_str();
        let mut warnings = Warnings::default();
        let mut stage = ReconcileStage::Start;

        if request.target_balance.unsigned_abs() > MAX_AMOUNT_MILLIUNITS.unsigned_abs() {
            return Err(Error::InvalidData(format!(
                "Target balance {} is out of range",
                format_milliunits(request.target_balance)
            )));
        }

        let account = self
            .ledger
            .get_account(budget_id, &request.account_id)
            .await?;
        if account.deleted {
            return Err(Error::NotFound(format!(
                "Account {} has been deleted",
                request.account_id
            )));
        }
        let starting_balance = account.balance;

        let transactions: Vec<LedgerTransaction> = self
            .ledger
            .get_account_transactions(budget_id, &request.account_id, None)
            .await?
            .into_iter()
            .filter(|t| !t.deleted)
            .collect();
        stage = advance(stage, ReconcileStage::TransactionsFetched);
        debug!(count = transactions.len(), "Fetched account transactions");

        let to_mark = select_for_reconciliation(&transactions, request.reconciliation_date);
        let transactions_reconciled = if request.dry_run {
            to_mark.len()
        } else {
            match self.mark_reconciled(budget_id, &to_mark).await {
                Ok(result) => {
                    if result.updated < result.requested {
                        warnings.push(
                            stage,
                            format!(
                                "Only {} of {} transactions were marked reconciled",
                                result.updated, result.requested
                            ),
                        );
                    }
                    result.updated
                }
                Err(warning) => {
                    warnings.push(stage, warning);
                    0
                }
            }
        };
        stage = advance(stage, ReconcileStage::TransactionsMarkedReconciled);

        let recomputed = if request.dry_run {
            Ok(account.clone())
        } else {
            self.recompute_balance(budget_id, &request.account_id).await
        };
        let (mut actual_balance, balance_known) = match recomputed {
            Ok(refreshed) => (refreshed.balance, true),
            Err(warning) => {
                warnings.push(stage, warning);
                (starting_balance, false)
            }
        };
        stage = advance(stage, ReconcileStage::BalanceRecomputed);

        let in_range = request.target_balance.checked_sub(actual_balance).is_some();
        let adjustment_needed = request.target_balance.saturating_sub(actual_balance);
        let mut adjustment_created = false;
        let mut adjustment_transaction_id = None;

        if request.create_adjustment && !request.dry_run {
            if !balance_known {
                warnings.push(
                    stage,
                    "Skipped balance adjustment because the current balance is unknown"
                        .to_string(),
                );
            } else if !in_range {
                warnings.push(
                    stage,
                    format!(
                        "Skipped balance adjustment because the ledger balance {} is out of range",
                        format_milliunits(actual_balance)
                    ),
                );
            } else if adjustment_needed != 0 {
                match self
                    .post_adjustment(request, &account, adjustment_needed, &mut warnings)
                    .await
                {
                    Ok(created) => {
                        info!(
                            amount = %format_milliunits(adjustment_needed),
                            id = %created.id,
                            "Created balance adjustment"
                        );
                        actual_balance = request.target_balance;
                        adjustment_created = true;
                        adjustment_transaction_id = Some(created.id);
                    }
                    Err(warning) => warnings.push(stage, warning),
                }
            }
        }
        stage = advance(stage, ReconcileStage::AdjustmentEvaluated);

        advance(stage, ReconcileStage::Done);

        Ok(ReconciliationOutcome {
            account_id: account.id,
            account_name: account.name,
            reconciliation_date: request.reconciliation_date,
            starting_balance,
            target_balance: request.target_balance,
            actual_balance,
            transactions_reconciled,
            adjustment_needed,
            adjustment_created,
            adjustment_transaction_id,
            dry_run: request.dry_run,
            warnings: warnings.0,
        })
    }

    async fn mark_reconciled(
        &self,
        budget_id: &str,
        transactions: &[&LedgerTransaction],
    ) -> StepResult<MarkResult> {
        if transactions.is_empty() {
            return Ok(MarkResult {
                requested: 0,
                updated: 0,
            });
        }

        let updates: Vec<StatusUpdate> = transactions
            .iter()
            .map(|t| StatusUpdate {
                id: t.id.clone(),
                cleared: ClearedStatus::Reconciled,
            })
            .collect();

        let updated = self
            .ledger
            .bulk_update_transaction_status(budget_id, &updates)
            .await
            .map_err(|e| format!("Failed to mark transactions reconciled: {}", e))?;

        Ok(MarkResult {
            requested: updates.len(),
            updated: updated.len(),
        })
    }

    async fn recompute_balance(&self, budget_id: &str, account_id: &str) -> StepResult<Account> {
        self.ledger
            .get_account(budget_id, account_id)
            .await
            .map_err(|e| format!("Failed to refresh account balance: {}", e))
    }

    async fn post_adjustment(
        &self,
        request: &ReconcileRequest,
        account: &Account,
        amount: i64,
        warnings: &mut Warnings,
    ) -> StepResult<LedgerTransaction> {
        let budget_id = request.budget_id.as_str();
        let (payee_id, payee_name) = self.resolve_payee(budget_id, warnings).await;
        let category_id = if amount > 0 {
            self.resolve_inflow_category(budget_id, warnings).await
        } else {
            None
        };

        let draft = TransactionDraft {
            account_id: account.id.clone(),
            date: request.reconciliation_date,
            amount,
            payee_id,
            payee_name,
            category_id,
            memo: Some(
                request
                    .adjustment_memo
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.config.default_memo.clone()),
            ),
            cleared: ClearedStatus::Reconciled,
            approved: true,
        };

        self.ledger
            .create_transaction(budget_id, &draft)
            .await
            .map_err(|e| format!("Failed to create adjustment transaction: {}", e))
    }

    /// Resolve the adjustment payee to (payee_id, payee_name); exactly one is set
    async fn resolve_payee(
        &self,
        budget_id: &str,
        warnings: &mut Warnings,
    ) -> (Option<String>, Option<String>) {
        let fallback = (None, Some(self.config.adjustment_payee_name.clone()));
        let Some(wanted) = self.config.adjustment_payee_id.as_deref() else {
            debug!("No adjustment payee id configured, using payee name");
            return fallback;
        };

        match self.ledger.get_payees(budget_id).await {
            Ok(payees) if payees.iter().any(|p| p.id == wanted && !p.deleted) => {
                (Some(wanted.to_string()), None)
            }
            Ok(_) => {
                warnings.push(
                    ReconcileStage::AdjustmentEvaluated,
                    format!(
                        "Adjustment payee {} not found; using \"{}\"",
                        wanted, self.config.adjustment_payee_name
                    ),
                );
                fallback
            }
            Err(e) => {
                warnings.push(
                    ReconcileStage::AdjustmentEvaluated,
                    format!(
                        "Could not load payees ({}); using \"{}\"",
                        e, self.config.adjustment_payee_name
                    ),
                );
                fallback
            }
        }
    }

    async fn resolve_inflow_category(
        &self,
        budget_id: &str,
        warnings: &mut Warnings,
    ) -> Option<String> {
        if let Some(id) = &self.config.inflow_category_id {
            return Some(id.clone());
        }

        match self.ledger.get_categories(budget_id).await {
            Ok(categories) => {
                let found = INFLOW_CATEGORY_NAMES.iter().find_map(|name| {
                    categories
                        .iter()
                        .find(|c| !c.deleted && c.name.eq_ignore_ascii_case(name))
                });
                match found {
                    Some(category) => Some(category.id.clone()),
                    None => {
                        warnings.push(
                            ReconcileStage::AdjustmentEvaluated,
                            "Inflow category not found; adjustment left uncategorized".to_string(),
                        );
                        None
                    }
                }
            }
            Err(e) => {
                warnings.push(
                    ReconcileStage::AdjustmentEvaluated,
                    format!(
                        "Could not load categories ({}); adjustment left uncategorized",
                        e
                    ),
                );
                None
            }
        }
    }
}

/// Transactions on or before `date` that are not yet reconciled
pub fn select_for_reconciliation(
    transactions: &[LedgerTransaction],
    date: NaiveDate,
) -> Vec<&LedgerTransaction> {
    transactions
        .iter()
        .filter(|t| !t.deleted && t.date <= date && !t.cleared.is_reconciled())
        .collect()
}

fn advance(from: ReconcileStage, to: ReconcileStage) -> ReconcileStage {
    debug!(?from, ?to, "Reconciliation stage");
    to
}
