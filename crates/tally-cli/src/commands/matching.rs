//! Statement matching command

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{format_milliunits, to_milliunits, tools, LedgerBackend, MatchResult, TallyConfig};

use super::{read_statement, truncate};

/// Match a statement file against an account, returning the raw result
pub async fn run_match<L: LedgerBackend>(
    ledger: &L,
    config: &TallyConfig,
    budget_id: &str,
    account_id: &str,
    file: &Path,
    tolerance: Option<u32>,
) -> Result<MatchResult> {
    let statement = read_statement(file)?;

    tools::match_statement(
        ledger,
        &config.matching,
        budget_id,
        account_id,
        &statement,
        tolerance,
    )
    .await
    .context("Failed to match statement")
}

pub async fn cmd_match<L: LedgerBackend>(
    ledger: &L,
    config: &TallyConfig,
    budget_id: &str,
    account_id: &str,
    file: &Path,
    tolerance: Option<u32>,
    json: bool,
) -> Result<()> {
    let result = run_match(ledger, config, budget_id, account_id, file, tolerance).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &MatchResult) {
    let summary = &result.summary;
    println!(
        "🔍 Matched {} of {} statement lines ({:.0}%)",
        summary.matched,
        summary.total_bank,
        summary.match_rate * 100.0
    );
    println!(
        "   exact {} · high {} · medium {} · low {}",
        summary.by_confidence.exact,
        summary.by_confidence.high,
        summary.by_confidence.medium,
        summary.by_confidence.low
    );

    if !result.matched.is_empty() {
        println!();
        println!("Matched:");
        for m in &result.matched {
            println!(
                "  {}  {:>10}  {:<28} → {:<28} [{}]",
                m.bank_transaction.date,
                format_milliunits(to_milliunits(m.bank_transaction.amount)),
                truncate(m.bank_transaction.payee.as_deref().unwrap_or("-"), 28),
                truncate(m.ledger_transaction.payee_name.as_deref().unwrap_or("-"), 28),
                m.confidence
            );
            println!("      {}", m.reasons.join(", "));
        }
    }

    if !result.unmatched_bank.is_empty() {
        println!();
        println!("⚠️  Statement lines not in the ledger:");
        for tx in &result.unmatched_bank {
            println!(
                "  {}  {:>10}  {}",
                tx.date,
                format_milliunits(to_milliunits(tx.amount)),
                tx.payee.as_deref().unwrap_or("-")
            );
        }
    }

    if !result.unmatched_ledger.is_empty() {
        println!();
        println!("Ledger transactions not on the statement:");
        for tx in &result.unmatched_ledger {
            println!(
                "  {}  {:>10}  {:<28} ({})",
                tx.date,
                format_milliunits(tx.amount),
                truncate(tx.payee_name.as_deref().unwrap_or("-"), 28),
                tx.cleared
            );
        }
    }
}
