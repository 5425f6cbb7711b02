//! In-memory ledger for testing
//!
//! Behaves like the remote service for the operations Tally uses: status
//! updates move amounts between cleared and uncleared balances, created
//! transactions adjust the account balance. Individual operations can be made
//! to fail, and bulk updates can be capped to simulate partial success.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::{
    Account, Category, ClearedStatus, LedgerTransaction, Payee, StatusUpdate, TransactionDraft,
};

use super::LedgerBackend;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetAccount,
    GetTransactions,
    BulkUpdate,
    CreateTransaction,
    GetPayees,
    GetCategories,
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Account>,
    transactions: Vec<LedgerTransaction>,
    payees: Vec<Payee>,
    categories: Vec<Category>,
    failing: HashSet<MockOperation>,
    /// Fail GetAccount only after this many successful calls
    get_account_failures_after: Option<usize>,
    get_account_calls: usize,
    bulk_update_limit: Option<usize>,
    bulk_update_calls: usize,
    created: Vec<TransactionDraft>,
    next_id: usize,
}

/// In-memory ledger backend
///
/// Cloning shares state, so a test can keep a handle for inspection while the
/// reconciler owns another.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| Error::InvalidData("Failed to acquire mock ledger lock".into()))
    }

    fn check(&self, state: &MockState, op: MockOperation) -> Result<()> {
        if state.failing.contains(&op) {
            return Err(Error::Api {
                status: 503,
                detail: format!("Simulated failure for {:?}", op),
            });
        }
        Ok(())
    }

    /// Add an open account with the given balance (milliunits)
    pub fn with_account(self, id: &str, name: &str, balance: i64) -> Self {
        if let Ok(mut state) = self.state() {
            state.accounts.push(Account {
                id: id.to_string(),
                name: name.to_string(),
                balance,
                cleared_balance: balance,
                uncleared_balance: 0,
                closed: false,
                deleted: false,
            });
        }
        self
    }

    pub fn with_deleted_account(self, id: &str, name: &str, balance: i64) -> Self {
        let seeded = self.with_account(id, name, balance);
        if let Ok(mut state) = seeded.state() {
            if let Some(account) = state.accounts.iter_mut().find(|a| a.id == id) {
                account.deleted = true;
            }
        }
        seeded
    }

    pub fn with_transactions(self, transactions: Vec<LedgerTransaction>) -> Self {
        if let Ok(mut state) = self.state() {
            state.transactions.extend(transactions);
        }
        self
    }

    pub fn with_payee(self, id: &str, name: &str) -> Self {
        if let Ok(mut state) = self.state() {
            state.payees.push(Payee {
                id: id.to_string(),
                name: name.to_string(),
                deleted: false,
            });
        }
        self
    }

    pub fn with_category(self, id: &str, name: &str, group: &str) -> Self {
        if let Ok(mut state) = self.state() {
            state.categories.push(Category {
                id: id.to_string(),
                name: name.to_string(),
                category_group_name: Some(group.to_string()),
                hidden: false,
                deleted: false,
            });
        }
        self
    }

    /// Make an operation fail on every call
    pub fn failing(self, op: MockOperation) -> Self {
        if let Ok(mut state) = self.state() {
            state.failing.insert(op);
        }
        self
    }

    /// Let `GetAccount` succeed `calls` times, then fail
    pub fn failing_account_after(self, calls: usize) -> Self {
        if let Ok(mut state) = self.state() {
            state.get_account_failures_after = Some(calls);
        }
        self
    }

    /// Apply at most `limit` updates per bulk call
    pub fn limit_bulk_updates(self, limit: usize) -> Self {
        if let Ok(mut state) = self.state() {
            state.bulk_update_limit = Some(limit);
        }
        self
    }

    /// Snapshot of all stored transactions
    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.state()
            .map(|s| s.transactions.clone())
            .unwrap_or_default()
    }

    /// Drafts received by `create_transaction`
    pub fn created(&self) -> Vec<TransactionDraft> {
        self.state().map(|s| s.created.clone()).unwrap_or_default()
    }

    pub fn bulk_update_calls(&self) -> usize {
        self.state().map(|s| s.bulk_update_calls).unwrap_or_default()
    }

    /// Current balance of an account, if it exists
    pub fn balance(&self, account_id: &str) -> Option<i64> {
        self.state().ok().and_then(|s| {
            s.accounts
                .iter()
                .find(|a| a.id == account_id)
                .map(|a| a.balance)
        })
    }
}

#[async_trait]
impl LedgerBackend for MockLedger {
    async fn get_account(&self, _budget_id: &str, account_id: &str) -> Result<Account> {
        let mut state = self.state()?;
        self.check(&state, MockOperation::GetAccount)?;

        state.get_account_calls += 1;
        if let Some(limit) = state.get_account_failures_after {
            if state.get_account_calls > limit {
                return Err(Error::Api {
                    status: 503,
                    detail: "Simulated failure for GetAccount".to_string(),
                });
            }
        }

        state
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Account {}", account_id)))
    }

    async fn get_account_transactions(
        &self,
        _budget_id: &str,
        account_id: &str,
        since_date: Option<NaiveDate>,
    ) -> Result<Vec<LedgerTransaction>> {
        let state = self.state()?;
        self.check(&state, MockOperation::GetTransactions)?;

        Ok(state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .filter(|t| since_date.map_or(true, |since| t.date >= since))
            .cloned()
            .collect())
    }

    async fn bulk_update_transaction_status(
        &self,
        _budget_id: &str,
        updates: &[StatusUpdate],
    ) -> Result<Vec<LedgerTransaction>> {
        let mut state = self.state()?;
        state.bulk_update_calls += 1;
        self.check(&state, MockOperation::BulkUpdate)?;

        let limit = state.bulk_update_limit.unwrap_or(usize::MAX);
        let mut updated = Vec::new();

        for update in updates.iter() {
            if updated.len() >= limit {
                break;
            }
            let Some(index) = state.transactions.iter().position(|t| t.id == update.id) else {
                continue;
            };

            let (account_id, amount, previous) = {
                let tx = &mut state.transactions[index];
                let previous = tx.cleared;
                tx.cleared = update.cleared;
                (tx.account_id.clone(), tx.amount, previous)
            };

            // Uncleared money moves into the cleared balance
            if previous == ClearedStatus::Uncleared && update.cleared != ClearedStatus::Uncleared {
                if let Some(account) = state.accounts.iter_mut().find(|a| a.id == account_id) {
                    account.uncleared_balance -= amount;
                    account.cleared_balance += amount;
                }
            }

            updated.push(state.transactions[index].clone());
        }

        Ok(updated)
    }

    async fn create_transaction(
        &self,
        _budget_id: &str,
        draft: &TransactionDraft,
    ) -> Result<LedgerTransaction> {
        let mut state = self.state()?;
        self.check(&state, MockOperation::CreateTransaction)?;

        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == draft.account_id)
            .ok_or_else(|| Error::NotFound(format!("Account {}", draft.account_id)))?;
        account.balance += draft.amount;
        if draft.cleared == ClearedStatus::Uncleared {
            account.uncleared_balance += draft.amount;
        } else {
            account.cleared_balance += draft.amount;
        }

        let payee_name = match (&draft.payee_name, &draft.payee_id) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(id)) => state
                .payees
                .iter()
                .find(|p| &p.id == id)
                .map(|p| p.name.clone()),
            (None, None) => None,
        };
        let category_name = draft.category_id.as_ref().and_then(|id| {
            state
                .categories
                .iter()
                .find(|c| &c.id == id)
                .map(|c| c.name.clone())
        });

        state.next_id += 1;
        let tx = LedgerTransaction {
            id: format!("mock-{}", state.next_id),
            account_id: draft.account_id.clone(),
            date: draft.date,
            amount: draft.amount,
            payee_id: draft.payee_id.clone(),
            payee_name,
            category_id: draft.category_id.clone(),
            category_name,
            memo: draft.memo.clone(),
            cleared: draft.cleared,
            approved: draft.approved,
            transfer_account_id: None,
            deleted: false,
        };

        state.transactions.push(tx.clone());
        state.created.push(draft.clone());
        Ok(tx)
    }

    async fn get_payees(&self, _budget_id: &str) -> Result<Vec<Payee>> {
        let state = self.state()?;
        self.check(&state, MockOperation::GetPayees)?;
        Ok(state.payees.clone())
    }

    async fn get_categories(&self, _budget_id: &str) -> Result<Vec<Category>> {
        let state = self.state()?;
        self.check(&state, MockOperation::GetCategories)?;
        Ok(state.categories.clone())
    }

    fn host(&self) -> &str {
        "mock://ledger"
    }
}
