//! Reconcile command

use anyhow::{Context, Result};
use tally_core::{
    format_milliunits, tools, LedgerBackend, ReconcileParams, ReconciliationOutcome, TallyConfig,
};

/// Arguments for one reconcile run
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub budget_id: String,
    pub account_id: String,
    /// Statement balance in currency units
    pub target: f64,
    pub date: String,
    pub create_adjustment: bool,
    pub memo: Option<String>,
    pub dry_run: bool,
}

pub async fn run_reconcile<L: LedgerBackend>(
    ledger: &L,
    config: &TallyConfig,
    options: ReconcileOptions,
) -> Result<ReconciliationOutcome> {
    let params = ReconcileParams {
        budget_id: options.budget_id,
        account_id: options.account_id.clone(),
        target_balance: options.target,
        reconciliation_date: options.date,
        create_adjustment: options.create_adjustment,
        adjustment_memo: options.memo,
        dry_run: options.dry_run,
    };

    tools::reconcile_account_with_adjustment(ledger, &config.reconcile, params)
        .await
        .with_context(|| format!("Failed to reconcile account {}", options.account_id))
}

pub async fn cmd_reconcile<L: LedgerBackend>(
    ledger: &L,
    config: &TallyConfig,
    options: ReconcileOptions,
    json: bool,
) -> Result<()> {
    let outcome = run_reconcile(ledger, config, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(&outcome);
    Ok(())
}

fn signed(milli: i64) -> String {
    if milli > 0 {
        format!("+{}", format_milliunits(milli))
    } else {
        format_milliunits(milli)
    }
}

fn print_outcome(outcome: &ReconciliationOutcome) {
    println!(
        "🧾 Reconciling {} as of {}{}",
        outcome.account_name,
        outcome.reconciliation_date,
        if outcome.dry_run { " (dry run)" } else { "" }
    );
    println!(
        "   Transactions {}: {}",
        if outcome.dry_run {
            "to reconcile"
        } else {
            "reconciled"
        },
        outcome.transactions_reconciled
    );
    println!(
        "   Starting balance:  {:>12}",
        format_milliunits(outcome.starting_balance)
    );
    println!(
        "   Statement balance: {:>12}",
        format_milliunits(outcome.target_balance)
    );

    if outcome.adjustment_needed != 0 {
        let status = match (&outcome.adjustment_transaction_id, outcome.dry_run) {
            (Some(id), _) => format!("created ({})", id),
            (None, true) => "not created (dry run)".to_string(),
            (None, false) => "not created".to_string(),
        };
        println!(
            "   Adjustment:        {:>12}  {}",
            signed(outcome.adjustment_needed),
            status
        );
    }
    println!(
        "   Final balance:     {:>12}",
        format_milliunits(outcome.actual_balance)
    );

    if !outcome.warnings.is_empty() {
        println!();
        for warning in &outcome.warnings {
            println!("⚠️  {}", warning);
        }
    }

    println!();
    if outcome.is_balanced() {
        println!("✅ Account balances with the statement");
    } else {
        println!(
            "⚠️  Out of balance by {}",
            signed(outcome.target_balance - outcome.actual_balance)
        );
    }
}
