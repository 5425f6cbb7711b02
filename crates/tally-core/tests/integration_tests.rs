//! Integration tests for tally-core
//!
//! These tests exercise the full statement import → match → reconcile workflow
//! against the in-memory ledger.

use chrono::NaiveDate;
use tally_core::{
    ledger::MockLedger,
    matcher::{match_transactions, MatchConfidence, MatchConfig},
    models::{ClearedStatus, LedgerTransaction},
    reconcile::{ReconcileConfig, ReconcileRequest, Reconciler},
    statement::parse_statement_csv,
};

/// March statement for a checking account
///
/// - Acme Store and Payroll line up exactly with the ledger
/// - Corner Coffee posted two days late with a truncated name
/// - The bank fee was never entered in the ledger
fn march_statement() -> &'static str {
    r#"Date,Description,Amount
03/01/2024,Acme Store,-45.00
03/07/2024,CORNER COFFEE #12,-12.34
03/10/2024,Payroll,"2,500.00"
03/31/2024,MONTHLY SERVICE FEE,-5.00"#
}

fn ledger_tx(id: &str, day: u32, amount: i64, payee: &str, cleared: ClearedStatus) -> LedgerTransaction {
    LedgerTransaction {
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
    }
}

fn march_ledger() -> Vec<LedgerTransaction> {
    vec![
        ledger_tx("acme", 1, -45_000, "Acme Store", ClearedStatus::Uncleared),
        ledger_tx("coffee", 5, -12_340, "Corner Coffee", ClearedStatus::Cleared),
        ledger_tx("payroll", 10, 2_500_000, "Payroll", ClearedStatus::Cleared),
        ledger_tx("rent", 28, -1_200_000, "Landlord", ClearedStatus::Uncleared),
    ]
}

#[test]
fn test_statement_matches_ledger() {
    let bank = parse_statement_csv(march_statement().as_bytes()).unwrap();
    assert_eq!(bank.len(), 4);

    let ledger = march_ledger();
    let result = match_transactions(&bank, &ledger, &MatchConfig::default());

    assert_eq!(result.summary.total_bank, 4);
    assert_eq!(result.matched.len(), 3);
    assert_eq!(result.matched.len() + result.unmatched_bank.len(), bank.len());

    // Largest amount is matched first
    assert_eq!(result.matched[0].ledger_transaction.id, "payroll");
    assert_eq!(result.matched[0].confidence, MatchConfidence::Exact);

    let coffee = result
        .matched
        .iter()
        .find(|m| m.ledger_transaction.id == "coffee")
        .unwrap();
    assert_eq!(coffee.confidence, MatchConfidence::Medium);
    assert_eq!(coffee.days_apart, 2);

    assert_eq!(result.unmatched_bank.len(), 1);
    assert_eq!(
        result.unmatched_bank[0].payee.as_deref(),
        Some("MONTHLY SERVICE FEE")
    );
    assert_eq!(result.unmatched_ledger.len(), 1);
    assert_eq!(result.unmatched_ledger[0].id, "rent");
    assert!((result.summary.match_rate - 0.75).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_reconcile_after_matching() {
    // Ledger balance is missing the 5.00 bank fee
    let ledger = MockLedger::new()
        .with_account("checking", "Checking", 1_242_660)
        .with_category("inflow", "Inflow: Ready to Assign", "Internal Master Category")
        .with_transactions(march_ledger());
    let config = ReconcileConfig::default();

    let outcome = Reconciler::new(&ledger, &config)
        .reconcile(&ReconcileRequest {
            budget_id: "budget".to_string(),
            account_id: "checking".to_string(),
            target_balance: 1_237_660,
            reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            create_adjustment: true,
            adjustment_memo: Some("Monthly service fee".to_string()),
            dry_run: false,
        })
        .await
        .unwrap();

    assert_eq!(outcome.transactions_reconciled, 4);
    assert_eq!(outcome.adjustment_needed, -5_000);
    assert!(outcome.adjustment_created);
    assert!(outcome.is_balanced());
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    // Outflow adjustment carries no category
    let created = ledger.created();
    assert_eq!(created.len(), 1);
    assert!(created[0].category_id.is_none());
    assert_eq!(created[0].memo.as_deref(), Some("Monthly service fee"));

    assert!(ledger
        .transactions()
        .iter()
        .all(|t| t.cleared == ClearedStatus::Reconciled));
}

#[tokio::test]
async fn test_second_reconcile_is_a_no_op() {
    let ledger = MockLedger::new()
        .with_account("checking", "Checking", 1_242_660)
        .with_transactions(march_ledger());
    let config = ReconcileConfig::default();
    let request = ReconcileRequest {
        budget_id: "budget".to_string(),
        account_id: "checking".to_string(),
        target_balance: 1_242_660,
        reconciliation_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        create_adjustment: true,
        adjustment_memo: None,
        dry_run: false,
    };

    let reconciler = Reconciler::new(&ledger, &config);
    let first = reconciler.reconcile(&request).await.unwrap();
    assert_eq!(first.transactions_reconciled, 4);

    let second = reconciler.reconcile(&request).await.unwrap();
    assert_eq!(second.transactions_reconciled, 0);
    assert_eq!(second.adjustment_needed, 0);
    assert_eq!(ledger.bulk_update_calls(), 1);
    assert!(ledger.created().is_empty());
}
