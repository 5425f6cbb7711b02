//! Domain models for Tally
//!
//! Ledger-side types mirror the budgeting service's wire format so the HTTP
//! backend can deserialize them directly. Amounts on ledger types are
//! milliunits; amounts on [`BankTransaction`] are decimal currency.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Clearing status of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    #[default]
    Uncleared,
    Cleared,
    Reconciled,
}

impl ClearedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncleared => "uncleared",
            Self::Cleared => "cleared",
            Self::Reconciled => "reconciled",
        }
    }

    pub fn is_reconciled(&self) -> bool {
        matches!(self, Self::Reconciled)
    }
}

impl std::str::FromStr for ClearedStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uncleared" => Ok(Self::Uncleared),
            "cleared" => Ok(Self::Cleared),
            "reconciled" => Ok(Self::Reconciled),
            _ => Err(format!("Unknown cleared status: {}", s)),
        }
    }
}

impl std::fmt::Display for ClearedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction owned by the remote ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Signed amount in milliunits
    pub amount: i64,
    #[serde(default)]
    pub payee_id: Option<String>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub cleared: ClearedStatus,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub transfer_account_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// A budget account as reported by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Ledger-computed balance in milliunits
    pub balance: i64,
    #[serde(default)]
    pub cleared_balance: i64,
    #[serde(default)]
    pub uncleared_balance: i64,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category_group_name: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// One line of a caller-supplied bank statement
///
/// Lives only for the duration of a matching call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub date: NaiveDate,
    /// Signed amount in decimal currency units
    pub amount: f64,
    #[serde(default, alias = "description")]
    pub payee: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl BankTransaction {
    pub fn new(date: NaiveDate, amount: f64, payee: Option<&str>) -> Self {
        Self {
            date,
            amount,
            payee: payee.map(str::to_string),
            memo: None,
        }
    }
}

/// One element of a batched status update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub cleared: ClearedStatus,
}

/// A transaction to be created on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub account_id: String,
    pub date: NaiveDate,
    /// Signed amount in milliunits
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub cleared: ClearedStatus,
    pub approved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleared_status_round_trips_wire_names() {
        for status in [
            ClearedStatus::Uncleared,
            ClearedStatus::Cleared,
            ClearedStatus::Reconciled,
        ] {
            assert_eq!(status.as_str().parse::<ClearedStatus>(), Ok(status));
        }
        assert!("pending".parse::<ClearedStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ClearedStatus::Reconciled).unwrap(),
            "\"reconciled\""
        );
    }

    #[test]
    fn test_ledger_transaction_from_wire() {
        let json = r#"{
            "id": "t1",
            "account_id": "a1",
            "date": "2024-03-01",
            "amount": -45000,
            "payee_name": "Acme Store",
            "cleared": "uncleared",
            "approved": true,
            "flag_color": null,
            "deleted": false
        }"#;
        let tx: LedgerTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, -45000);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(tx.cleared, ClearedStatus::Uncleared);
        assert_eq!(tx.payee_name.as_deref(), Some("Acme Store"));
        assert!(tx.category_name.is_none());
    }

    #[test]
    fn test_bank_transaction_accepts_description_alias() {
        let json = r#"{"date": "2024-03-01", "amount": -12.5, "description": "COFFEE"}"#;
        let tx: BankTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.payee.as_deref(), Some("COFFEE"));
    }

    #[test]
    fn test_draft_omits_empty_fields() {
        let draft = TransactionDraft {
            account_id: "a1".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            amount: 1500,
            payee_id: None,
            payee_name: Some("Adjustment".into()),
            category_id: None,
            memo: None,
            cleared: ClearedStatus::Reconciled,
            approved: true,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("payee_id").is_none());
        assert_eq!(value["payee_name"], "Adjustment");
        assert_eq!(value["cleared"], "reconciled");
    }
}
